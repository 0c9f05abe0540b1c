//! Credential records and secret verification

use argon2::{Algorithm, Argon2, Params, Version};
use base64::{engine::general_purpose::STANDARD, Engine};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use subtle::ConstantTimeEq;
use thiserror::Error;

const SALT_LEN: usize = 16;
const HASH_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("failed to derive secret hash: {0}")]
    Derivation(String),
}

/// Stored proof of a secret for one identity
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub identity: String,
    /// Base64 hash of the secret
    pub secret_hash: String,
    /// Base64 salt used for the hash
    pub secret_salt: String,
}

impl fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("identity", &self.identity)
            .field("secret_hash", &"[REDACTED]")
            .field("secret_salt", &self.secret_salt)
            .finish()
    }
}

/// Derives and checks credential records
pub trait IdentityVerifier: Send + Sync {
    /// Build a fresh record (new salt) for `secret`
    fn derive(&self, identity: &str, secret: &str) -> Result<CredentialRecord, CredentialError>;

    /// Whether `secret` matches the record. Malformed records never match.
    fn verify(&self, record: &CredentialRecord, secret: &str) -> bool;
}

/// Argon2id secret hashing
pub struct Argon2Verifier {
    argon2: Argon2<'static>,
}

impl Argon2Verifier {
    pub fn new() -> Self {
        Self {
            argon2: Argon2::default(),
        }
    }

    /// Use explicit cost parameters (e.g. cheaper ones in tests)
    pub fn with_params(params: Params) -> Self {
        Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        }
    }

    fn hash(&self, secret: &str, salt: &[u8]) -> Result<[u8; HASH_LEN], CredentialError> {
        let mut out = [0u8; HASH_LEN];
        self.argon2
            .hash_password_into(secret.as_bytes(), salt, &mut out)
            .map_err(|e| CredentialError::Derivation(e.to_string()))?;
        Ok(out)
    }
}

impl Default for Argon2Verifier {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityVerifier for Argon2Verifier {
    fn derive(&self, identity: &str, secret: &str) -> Result<CredentialRecord, CredentialError> {
        let mut salt = [0u8; SALT_LEN];
        rand::rng().fill(&mut salt);

        let hash = self.hash(secret, &salt)?;

        Ok(CredentialRecord {
            identity: identity.to_string(),
            secret_hash: STANDARD.encode(hash),
            secret_salt: STANDARD.encode(salt),
        })
    }

    fn verify(&self, record: &CredentialRecord, secret: &str) -> bool {
        let (Ok(salt), Ok(expected)) = (
            STANDARD.decode(&record.secret_salt),
            STANDARD.decode(&record.secret_hash),
        ) else {
            return false;
        };

        match self.hash(secret, &salt) {
            Ok(actual) => actual.as_slice().ct_eq(expected.as_slice()).into(),
            Err(_) => false,
        }
    }
}
