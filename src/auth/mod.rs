//! Authentication and authorization
//!
//! - Credentials: derive and verify stored secret hashes
//! - Tokens: signed claim sets carried as a bearer header or an HTTP-only cookie
//! - Grants: the registration / login / revocation state machine

mod credentials;
mod grants;
mod tokens;

pub use credentials::{Argon2Verifier, CredentialError, CredentialRecord, IdentityVerifier};
pub use grants::{AccessGrant, AccessGrantService};
pub use tokens::{
    extract_token, Claims, GrantConfig, HmacCodec, IssuedToken, TokenCodec, TokenError,
    TokenIssuer, TokenStore, ACCESS_COOKIE, EXPIRATION_CLAIM, SUBJECT_CLAIM,
};
