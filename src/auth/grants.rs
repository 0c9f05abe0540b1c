//! Access grant lifecycle
//!
//! Identity states:
//! - `Unregistered` -> `Pending` via [`AccessGrantService::reserve`]
//! - `Pending`/`Unregistered` -> `Active` via [`AccessGrantService::register`]
//! - `Pending` -> `Unregistered` via [`AccessGrantService::cancel_pending`]
//! - `Active` -> `Unregistered` via [`AccessGrantService::revoke_grant`]
//! - `Active` -> `Active` via login, register-on-existing or secret rotation,
//!   each gated on the current secret

use crate::auth::credentials::{CredentialRecord, IdentityVerifier};
use crate::auth::tokens::{GrantConfig, IssuedToken, TokenIssuer};
use crate::error::{AccessError, Result};
use crate::storage::{CredentialStore, IdentityState, StorageError};
use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// An active grant together with the token just issued for it
#[derive(Debug, Clone, Serialize)]
pub struct AccessGrant {
    pub identity: String,
    #[serde(skip)]
    pub record: CredentialRecord,
    #[serde(skip)]
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl AccessGrant {
    fn new(record: CredentialRecord, issued: &IssuedToken) -> Self {
        Self {
            identity: record.identity.clone(),
            record,
            token: issued.as_str().to_string(),
            expires_at: issued.expires_at(),
        }
    }
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(AccessError::Validation(format!("{} must not be empty", field)));
    }
    Ok(())
}

/// Orchestrates registration, login and revocation
pub struct AccessGrantService {
    store: Arc<dyn CredentialStore>,
    verifier: Arc<dyn IdentityVerifier>,
    issuer: Arc<TokenIssuer>,
}

impl AccessGrantService {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        verifier: Arc<dyn IdentityVerifier>,
        issuer: Arc<TokenIssuer>,
    ) -> Self {
        Self {
            store,
            verifier,
            issuer,
        }
    }

    pub fn issuer(&self) -> Arc<TokenIssuer> {
        self.issuer.clone()
    }

    /// Create an active grant, or re-authenticate an existing one
    ///
    /// Registering an identity that is already active succeeds only with the
    /// current secret, refreshes the token and leaves the record as it was.
    pub async fn register(
        &self,
        identity: &str,
        secret: &str,
        cfg: &GrantConfig,
        response: &mut HeaderMap,
    ) -> Result<AccessGrant> {
        require("identity", identity)?;
        require("secret", secret)?;
        cfg.validate()?;

        match self.store.get_grant(identity).await {
            Ok(_) => return self.refresh(identity, secret, cfg, response).await,
            Err(StorageError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }

        let record = self.verifier.derive(identity, secret)?;
        let issued = self.issuer.mint(identity, cfg)?;

        match self.store.create_grant(&record).await {
            Ok(()) => {}
            Err(StorageError::Conflict(_)) => {
                // A concurrent registration created the grant first
                debug!(identity = %identity, "Grant created concurrently, re-authenticating");
                return self.refresh(identity, secret, cfg, response).await;
            }
            Err(e) => return Err(e.into()),
        }

        issued.deliver(response);
        info!(identity = %identity, "Created access grant");

        Ok(AccessGrant::new(record, &issued))
    }

    /// Issue a fresh token for an existing grant
    pub async fn login(
        &self,
        identity: &str,
        secret: &str,
        cfg: &GrantConfig,
        response: &mut HeaderMap,
    ) -> Result<AccessGrant> {
        require("identity", identity)?;
        require("secret", secret)?;
        cfg.validate()?;

        self.refresh(identity, secret, cfg, response).await
    }

    /// Replace the stored record after proving the current secret
    ///
    /// The write only lands if the verified record is still the active one.
    pub async fn rotate_secret(
        &self,
        identity: &str,
        current_secret: &str,
        new_secret: &str,
    ) -> Result<()> {
        require("identity", identity)?;
        require("current secret", current_secret)?;
        require("new secret", new_secret)?;

        let current = self.update_grant(identity, current_secret).await?;

        let replacement = self.verifier.derive(identity, new_secret)?;
        self.store.replace_grant(&current, &replacement).await?;

        info!(identity = %identity, "Rotated access grant secret");
        Ok(())
    }

    /// Load the active record and check `secret` against it
    ///
    /// Never modifies the record.
    pub(crate) async fn update_grant(&self, identity: &str, secret: &str) -> Result<CredentialRecord> {
        let record = self.store.get_grant(identity).await?;

        if !self.verifier.verify(&record, secret) {
            warn!(identity = %identity, "Unauthorized attempt to update grant");
            return Err(AccessError::Unauthorized(format!(
                "unauthorized attempt to update grant for {}",
                identity
            )));
        }

        Ok(record)
    }

    async fn refresh(
        &self,
        identity: &str,
        secret: &str,
        cfg: &GrantConfig,
        response: &mut HeaderMap,
    ) -> Result<AccessGrant> {
        let record = self.update_grant(identity, secret).await?;
        let issued = self.issuer.mint(identity, cfg)?;
        issued.deliver(response);

        debug!(identity = %identity, "Refreshed access token");
        Ok(AccessGrant::new(record, &issued))
    }

    pub async fn check_available(&self, identity: &str) -> Result<()> {
        require("identity", identity)?;
        Ok(self.store.check_available(identity).await?)
    }

    /// Reserve an identity as pending to block duplicate registrations
    pub async fn reserve(&self, identity: &str) -> Result<()> {
        require("identity", identity)?;
        self.store.reserve_if_available(identity).await?;
        info!(identity = %identity, "Reserved pending identity");
        Ok(())
    }

    pub async fn cancel_pending(&self, identity: &str) -> Result<()> {
        require("identity", identity)?;
        Ok(self.store.cancel_pending(identity).await?)
    }

    pub async fn revoke_grant(&self, identity: &str) -> Result<()> {
        require("identity", identity)?;
        self.store.revoke_grant(identity).await?;
        info!(identity = %identity, "Revoked access grant");
        Ok(())
    }

    pub async fn identity_state(&self, identity: &str) -> Result<IdentityState> {
        require("identity", identity)?;
        Ok(self.store.identity_state(identity).await?)
    }
}
