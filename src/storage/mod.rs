//! Storage backends for keygate
//!
//! - Memory: Process-local store, one map keyed by identity
//! - Postgres: Durable store, one table keyed by identity
//!
//! Both backends keep pending and active identities under a single key space so
//! an identity can never be pending and active at the same time.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

use crate::auth::CredentialRecord;
pub use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

/// Storage errors
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Registration state of an identity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityState {
    Unregistered,
    Pending,
    Active,
}

impl fmt::Display for IdentityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityState::Unregistered => write!(f, "unregistered"),
            IdentityState::Pending => write!(f, "pending"),
            IdentityState::Active => write!(f, "active"),
        }
    }
}

/// Trait for pending reservations and active credential records
///
/// Every method is a single atomic step against the backend.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Fails with `Conflict` if the identity is pending or active
    async fn check_available(&self, identity: &str) -> Result<(), StorageError>;

    /// Reserve an identity as pending, only if it is neither pending nor active
    async fn reserve_if_available(&self, identity: &str) -> Result<(), StorageError>;

    /// Remove a pending reservation (no-op if absent or active)
    async fn cancel_pending(&self, identity: &str) -> Result<(), StorageError>;

    /// Upsert an active record, clearing any pending reservation
    async fn put_grant(&self, record: &CredentialRecord) -> Result<(), StorageError>;

    /// Insert an active record unless one already exists, clearing any pending reservation
    async fn create_grant(&self, record: &CredentialRecord) -> Result<(), StorageError>;

    /// Swap `current` for `replacement`, only while `current` is still the active record
    ///
    /// `NotFound` if the identity is not active, `Conflict` if its record changed.
    async fn replace_grant(
        &self,
        current: &CredentialRecord,
        replacement: &CredentialRecord,
    ) -> Result<(), StorageError>;

    /// Get the active record for an identity
    async fn get_grant(&self, identity: &str) -> Result<CredentialRecord, StorageError>;

    /// Remove an active record (no-op if absent or pending)
    async fn revoke_grant(&self, identity: &str) -> Result<(), StorageError>;

    async fn identity_state(&self, identity: &str) -> Result<IdentityState, StorageError>;
}
