//! keygate - credential-backed API access grants
//!
//! Registers and authenticates API clients against stored credential records,
//! issues signed tokens over a bearer header or an HTTP-only cookie, and gates
//! protected routes on token validity, a session check, or a trusted origin.

pub mod auth;
pub mod error;
pub mod server;
pub mod storage;

pub use auth::{AccessGrant, AccessGrantService, GrantConfig, TokenIssuer, TokenStore};
pub use error::AccessError;
pub use server::{AuthorizationGate, KeygateServer, ServerConfig};
pub use storage::{CredentialStore, IdentityState, MemoryStore, PostgresStore};
