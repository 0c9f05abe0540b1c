//! Resilience tests for keygate
//!
//! These tests verify behavior under failure conditions like:
//! - A storage backend that rejects every call
//! - A backend failing between reservation and promotion
//! - Misconfigured token settings
//! - Another party revoking and re-reserving an identity mid-operation

use argon2::Params;
use async_trait::async_trait;
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use keygate::auth::{
    AccessGrantService, Argon2Verifier, CredentialRecord, GrantConfig, TokenIssuer, TokenStore,
};
use keygate::storage::{CredentialStore, IdentityState, MemoryStore, StorageError};
use keygate::AccessError;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Store wrapper that can be switched into a failing mode
struct FlakyStore {
    inner: MemoryStore,
    failing: AtomicBool,
    writes: AtomicUsize,
    /// After the next `get_grant`, revoke the grant and let someone else reserve the name
    hijack_after_read: AtomicBool,
}

impl FlakyStore {
    fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            failing: AtomicBool::new(false),
            writes: AtomicUsize::new(0),
            hijack_after_read: AtomicBool::new(false),
        }
    }

    fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn guard(&self) -> Result<(), StorageError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StorageError::Database("connection reset".to_string()));
        }
        Ok(())
    }

    fn write(&self) -> Result<(), StorageError> {
        self.guard()?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for FlakyStore {
    async fn check_available(&self, identity: &str) -> Result<(), StorageError> {
        self.guard()?;
        self.inner.check_available(identity).await
    }

    async fn reserve_if_available(&self, identity: &str) -> Result<(), StorageError> {
        self.write()?;
        self.inner.reserve_if_available(identity).await
    }

    async fn cancel_pending(&self, identity: &str) -> Result<(), StorageError> {
        self.write()?;
        self.inner.cancel_pending(identity).await
    }

    async fn put_grant(&self, record: &CredentialRecord) -> Result<(), StorageError> {
        self.write()?;
        self.inner.put_grant(record).await
    }

    async fn create_grant(&self, record: &CredentialRecord) -> Result<(), StorageError> {
        self.write()?;
        self.inner.create_grant(record).await
    }

    async fn replace_grant(
        &self,
        current: &CredentialRecord,
        replacement: &CredentialRecord,
    ) -> Result<(), StorageError> {
        self.write()?;
        self.inner.replace_grant(current, replacement).await
    }

    async fn get_grant(&self, identity: &str) -> Result<CredentialRecord, StorageError> {
        self.guard()?;
        let record = self.inner.get_grant(identity).await?;

        if self.hijack_after_read.swap(false, Ordering::SeqCst) {
            self.inner.revoke_grant(identity).await?;
            self.inner.reserve_if_available(identity).await?;
        }

        Ok(record)
    }

    async fn revoke_grant(&self, identity: &str) -> Result<(), StorageError> {
        self.write()?;
        self.inner.revoke_grant(identity).await
    }

    async fn identity_state(&self, identity: &str) -> Result<IdentityState, StorageError> {
        self.guard()?;
        self.inner.identity_state(identity).await
    }
}

fn setup() -> (AccessGrantService, Arc<FlakyStore>) {
    let store = Arc::new(FlakyStore::new());
    let service = AccessGrantService::new(
        store.clone(),
        Arc::new(Argon2Verifier::with_params(
            Params::new(8, 1, 1, Some(32)).unwrap(),
        )),
        Arc::new(TokenIssuer::hmac(b"resilience-test-secret")),
    );
    (service, store)
}

fn cfg() -> GrantConfig {
    GrantConfig::new(Duration::from_secs(3600), TokenStore::HeaderBearer)
}

/// A failing backend surfaces as a storage error and no token is delivered
#[tokio::test]
async fn test_storage_failure_surfaces_without_token() {
    let (service, store) = setup();
    store.set_failing(true);

    let mut response = HeaderMap::new();
    let result = service.register("a@x.com", "pw", &cfg(), &mut response).await;

    assert!(matches!(result, Err(AccessError::Storage(_))));
    assert!(response.get(AUTHORIZATION).is_none());

    assert!(matches!(
        service.check_available("a@x.com").await,
        Err(AccessError::Storage(_))
    ));
    assert!(matches!(service.reserve("a@x.com").await, Err(AccessError::Storage(_))));
}

/// An outage between reservation and promotion leaves the reservation in place
#[tokio::test]
async fn test_outage_between_reserve_and_register() {
    let (service, store) = setup();
    service.reserve("b@x.com").await.unwrap();

    store.set_failing(true);
    let mut response = HeaderMap::new();
    assert!(service
        .register("b@x.com", "pw", &cfg(), &mut response)
        .await
        .is_err());

    store.set_failing(false);
    assert_eq!(
        service.identity_state("b@x.com").await.unwrap(),
        IdentityState::Pending
    );

    // Recovery: the same registration completes once the backend is back
    service
        .register("b@x.com", "pw", &cfg(), &mut response)
        .await
        .unwrap();
    assert_eq!(
        service.identity_state("b@x.com").await.unwrap(),
        IdentityState::Active
    );
}

/// Misconfigured token settings fail before the store is touched
#[tokio::test]
async fn test_config_error_has_no_side_effects() {
    let (service, store) = setup();
    let bad = GrantConfig::new(Duration::ZERO, TokenStore::HeaderBearer);

    let mut response = HeaderMap::new();
    let result = service.register("c@x.com", "pw", &bad, &mut response).await;

    assert!(matches!(result, Err(AccessError::Config(_))));
    assert!(response.is_empty());
    assert_eq!(store.writes.load(Ordering::SeqCst), 0);
    assert!(service.check_available("c@x.com").await.is_ok());
}

/// A failed rotation keeps the old secret usable
#[tokio::test]
async fn test_failed_rotation_keeps_old_secret() {
    let (service, store) = setup();
    let mut response = HeaderMap::new();
    service
        .register("d@x.com", "old", &cfg(), &mut response)
        .await
        .unwrap();

    assert!(matches!(
        service.rotate_secret("d@x.com", "wrong", "new").await,
        Err(AccessError::Unauthorized(_))
    ));

    store.set_failing(true);
    assert!(service.rotate_secret("d@x.com", "old", "new").await.is_err());
    store.set_failing(false);

    let mut response = HeaderMap::new();
    service
        .login("d@x.com", "old", &cfg(), &mut response)
        .await
        .unwrap();
    assert!(matches!(
        service.login("d@x.com", "new", &cfg(), &mut response).await,
        Err(AccessError::Unauthorized(_))
    ));
}

/// A revoke landing between secret verification and the write is not undone
#[tokio::test]
async fn test_rotation_racing_revoke_does_not_resurrect_grant() {
    let (service, store) = setup();
    let mut response = HeaderMap::new();
    service
        .register("a@x.com", "old", &cfg(), &mut response)
        .await
        .unwrap();

    store.hijack_after_read.store(true, Ordering::SeqCst);
    let result = service.rotate_secret("a@x.com", "old", "new").await;

    assert!(matches!(result, Err(AccessError::NotFound(_))));
    assert_eq!(
        service.identity_state("a@x.com").await.unwrap(),
        IdentityState::Pending
    );

    let mut response = HeaderMap::new();
    assert!(matches!(
        service.login("a@x.com", "new", &cfg(), &mut response).await,
        Err(AccessError::NotFound(_))
    ));
}
