//! Error taxonomy for access-grant operations

use crate::auth::{CredentialError, TokenError};
use crate::storage::StorageError;
use thiserror::Error;

/// Errors returned by [`crate::auth::AccessGrantService`] and the token issuer
#[derive(Debug, Error)]
pub enum AccessError {
    /// Empty identity or secret
    #[error("validation error: {0}")]
    Validation(String),

    /// Identity already pending or active
    #[error("conflict: {0}")]
    Conflict(String),

    /// Secret does not match the stored credential record
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Caller is authenticated but not the owner of the target grant
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// No active grant for the identity
    #[error("not found: {0}")]
    NotFound(String),

    /// Reserved claim collision, bad lifetime, or unknown transport
    #[error("config error: {0}")]
    Config(String),

    #[error("storage error: {0}")]
    Storage(StorageError),

    #[error("token error: {0}")]
    Token(TokenError),

    #[error("credential error: {0}")]
    Credential(#[from] CredentialError),
}

impl From<StorageError> for AccessError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::Conflict(msg) => AccessError::Conflict(msg),
            StorageError::NotFound(msg) => AccessError::NotFound(msg),
            other => AccessError::Storage(other),
        }
    }
}

impl From<TokenError> for AccessError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::ReservedClaim(_)
            | TokenError::UnknownTransport(_)
            | TokenError::InvalidLifetime => AccessError::Config(e.to_string()),
            other => AccessError::Token(other),
        }
    }
}

/// Result type for access-grant operations
pub type Result<T> = std::result::Result<T, AccessError>;
