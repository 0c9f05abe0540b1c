//! Token claims, signing and transport
//!
//! Tokens are compact HS256 JWS strings: `header.payload.signature`, each part
//! base64url without padding. Every claim set carries:
//! - `exp`: expiry as unix seconds
//! - `access`: the identity the token was issued for
//!
//! A token travels over exactly one transport, chosen per call:
//! - `HeaderBearer`: `Authorization: Bearer <token>`
//! - `Cookie`: HTTP-only cookie named [`ACCESS_COOKIE`]

use axum::http::header::{AUTHORIZATION, COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::Sha256;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Cookie name used by the cookie transport
pub const ACCESS_COOKIE: &str = "_apiAccessToken";

/// Reserved claim names
pub const EXPIRATION_CLAIM: &str = "exp";
pub const SUBJECT_CLAIM: &str = "access";
const RESERVED_CLAIMS: [&str; 2] = [EXPIRATION_CLAIM, SUBJECT_CLAIM];

const SIGNING_ALG: &str = "HS256";
const BEARER_PREFIX: &str = "Bearer ";
const COOKIE_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("invalid token format")]
    InvalidFormat,

    #[error("invalid token signature")]
    InvalidSignature,

    #[error("token expired")]
    Expired,

    #[error("token decode error: {0}")]
    DecodeError(String),

    #[error("token encode error: {0}")]
    Encode(String),

    #[error("token missing: {0}")]
    Missing(String),

    #[error("custom claim [{0}] collides with a reserved claim, please rename it")]
    ReservedClaim(String),

    #[error("unrecognized token store: {0}")]
    UnknownTransport(String),

    #[error("token lifetime must be a positive whole number of seconds")]
    InvalidLifetime,
}

/// Transport a token is delivered and read over
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenStore {
    HeaderBearer,
    Cookie,
}

impl FromStr for TokenStore {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "header" | "bearer" | "header-bearer" => Ok(TokenStore::HeaderBearer),
            "cookie" => Ok(TokenStore::Cookie),
            _ => Err(TokenError::UnknownTransport(s.to_string())),
        }
    }
}

impl fmt::Display for TokenStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenStore::HeaderBearer => write!(f, "header"),
            TokenStore::Cookie => write!(f, "cookie"),
        }
    }
}

/// Claim set embedded in a token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Expiry, unix seconds
    pub exp: i64,
    /// Identity the token was issued for
    pub access: String,
    #[serde(flatten)]
    pub custom: Map<String, Value>,
}

impl Claims {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.exp <= now.timestamp()
    }
}

/// Per-call settings for token creation
#[derive(Debug, Clone)]
pub struct GrantConfig {
    /// How long an issued token stays valid
    pub lifetime: Duration,
    pub token_store: TokenStore,
    /// Merged into every issued claim set
    pub custom_claims: Map<String, Value>,
    /// Sets the `Secure` attribute on the access cookie
    pub secure_cookie: bool,
}

impl GrantConfig {
    pub fn new(lifetime: Duration, token_store: TokenStore) -> Self {
        Self {
            lifetime,
            token_store,
            custom_claims: Map::new(),
            secure_cookie: false,
        }
    }

    /// Add a custom claim, rejecting reserved names
    pub fn with_claim(
        mut self,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<Self, TokenError> {
        let key = key.into();
        if RESERVED_CLAIMS.contains(&key.as_str()) {
            return Err(TokenError::ReservedClaim(key));
        }
        self.custom_claims.insert(key, value.into());
        Ok(self)
    }

    pub fn secure_cookie(mut self, secure: bool) -> Self {
        self.secure_cookie = secure;
        self
    }

    /// Check lifetime and custom claims
    ///
    /// `exp` has whole-second resolution, so the lifetime must too.
    pub fn validate(&self) -> Result<(), TokenError> {
        if self.lifetime.as_secs() == 0 || self.lifetime.subsec_nanos() != 0 {
            return Err(TokenError::InvalidLifetime);
        }

        if let Some(key) = self
            .custom_claims
            .keys()
            .find(|k| RESERVED_CLAIMS.contains(&k.as_str()))
        {
            return Err(TokenError::ReservedClaim(key.clone()));
        }

        Ok(())
    }
}

impl Default for GrantConfig {
    fn default() -> Self {
        Self::new(Duration::from_secs(60 * 60), TokenStore::HeaderBearer)
    }
}

/// Signs and checks claim sets
pub trait TokenCodec: Send + Sync {
    fn sign(&self, claims: &Claims) -> Result<String, TokenError>;

    /// Check signature and expiry, returning the claims
    fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, TokenError>;

    /// Decode claims without checking the signature
    fn decode_claims(&self, token: &str) -> Result<Claims, TokenError>;
}

#[derive(Debug, Serialize, Deserialize)]
struct JwsHeader {
    alg: String,
    typ: String,
}

/// HS256 codec keyed by a shared secret
#[derive(Clone)]
pub struct HmacCodec {
    key: Vec<u8>,
}

impl HmacCodec {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            key: secret.to_vec(),
        }
    }

    fn mac(&self, signing_input: &str) -> HmacSha256 {
        let mut mac = HmacSha256::new_from_slice(&self.key).expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        mac
    }
}

impl fmt::Debug for HmacCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HmacCodec([REDACTED])")
    }
}

fn split_token(token: &str) -> Result<(&str, &str, &str), TokenError> {
    let mut parts = token.split('.');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(header), Some(payload), Some(signature), None) => Ok((header, payload, signature)),
        _ => Err(TokenError::InvalidFormat),
    }
}

fn decode_part<T: serde::de::DeserializeOwned>(part: &str) -> Result<T, TokenError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(part)
        .map_err(|e| TokenError::DecodeError(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| TokenError::DecodeError(e.to_string()))
}

impl TokenCodec for HmacCodec {
    fn sign(&self, claims: &Claims) -> Result<String, TokenError> {
        let header = JwsHeader {
            alg: SIGNING_ALG.to_string(),
            typ: "JWT".to_string(),
        };
        let header_json = serde_json::to_vec(&header).map_err(|e| TokenError::Encode(e.to_string()))?;
        let claims_json = serde_json::to_vec(claims).map_err(|e| TokenError::Encode(e.to_string()))?;

        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(header_json),
            URL_SAFE_NO_PAD.encode(claims_json)
        );
        let signature = self.mac(&signing_input).finalize().into_bytes();

        Ok(format!("{}.{}", signing_input, URL_SAFE_NO_PAD.encode(signature)))
    }

    fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, TokenError> {
        let (header_b64, payload_b64, signature_b64) = split_token(token)?;

        let header: JwsHeader = decode_part(header_b64)?;
        if header.alg != SIGNING_ALG {
            return Err(TokenError::InvalidFormat);
        }

        let signature = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|e| TokenError::DecodeError(e.to_string()))?;

        // verify_slice compares in constant time
        self.mac(&format!("{}.{}", header_b64, payload_b64))
            .verify_slice(&signature)
            .map_err(|_| TokenError::InvalidSignature)?;

        let claims: Claims = decode_part(payload_b64)?;
        if claims.is_expired_at(now) {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }

    fn decode_claims(&self, token: &str) -> Result<Claims, TokenError> {
        let (_, payload_b64, _) = split_token(token)?;
        decode_part(payload_b64)
    }
}

/// A signed token ready to be written to a response
#[derive(Debug, Clone)]
pub struct IssuedToken {
    token: String,
    claims: Claims,
    expires_at: DateTime<Utc>,
    header: (HeaderName, HeaderValue),
}

impl IssuedToken {
    pub fn as_str(&self) -> &str {
        &self.token
    }

    pub fn claims(&self) -> &Claims {
        &self.claims
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Write the token to response headers using the transport it was minted for
    pub fn deliver(&self, response: &mut HeaderMap) {
        let (name, value) = &self.header;
        response.append(name.clone(), value.clone());
    }
}

impl fmt::Display for IssuedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.token)
    }
}

fn transport_header(
    token: &str,
    expires_at: DateTime<Utc>,
    cfg: &GrantConfig,
) -> Result<(HeaderName, HeaderValue), TokenError> {
    let (name, value) = match cfg.token_store {
        TokenStore::HeaderBearer => (AUTHORIZATION, format!("{}{}", BEARER_PREFIX, token)),
        TokenStore::Cookie => {
            let mut cookie = format!(
                "{}={}; Path=/; Expires={}; HttpOnly",
                ACCESS_COOKIE,
                token,
                expires_at.format(COOKIE_DATE_FORMAT)
            );
            if cfg.secure_cookie {
                cookie.push_str("; Secure");
            }
            (SET_COOKIE, cookie)
        }
    };

    let value = HeaderValue::from_str(&value).map_err(|e| TokenError::Encode(e.to_string()))?;
    Ok((name, value))
}

/// Read the raw token from request headers using the given transport
pub fn extract_token(headers: &HeaderMap, store: TokenStore) -> Result<String, TokenError> {
    match store {
        TokenStore::HeaderBearer => {
            let value = headers
                .get(AUTHORIZATION)
                .ok_or_else(|| TokenError::Missing("authorization header".to_string()))?
                .to_str()
                .map_err(|_| TokenError::InvalidFormat)?;
            Ok(value.strip_prefix(BEARER_PREFIX).unwrap_or(value).to_string())
        }
        TokenStore::Cookie => headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| *name == ACCESS_COOKIE)
            .map(|(_, value)| value.to_string())
            .ok_or_else(|| TokenError::Missing(format!("{} cookie", ACCESS_COOKIE))),
    }
}

/// Mints tokens for identities and checks tokens carried by requests
#[derive(Clone)]
pub struct TokenIssuer {
    codec: Arc<dyn TokenCodec>,
}

impl TokenIssuer {
    pub fn new(codec: Arc<dyn TokenCodec>) -> Self {
        Self { codec }
    }

    /// Issuer backed by [`HmacCodec`]
    pub fn hmac(secret: &[u8]) -> Self {
        Self::new(Arc::new(HmacCodec::new(secret)))
    }

    pub fn mint(&self, identity: &str, cfg: &GrantConfig) -> Result<IssuedToken, TokenError> {
        self.mint_at(identity, cfg, Utc::now())
    }

    /// Build and sign a claim set expiring `cfg.lifetime` after `now`
    ///
    /// Nothing is written anywhere; a configuration error leaves no trace.
    pub fn mint_at(
        &self,
        identity: &str,
        cfg: &GrantConfig,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, TokenError> {
        cfg.validate()?;

        let lifetime =
            chrono::Duration::from_std(cfg.lifetime).map_err(|_| TokenError::InvalidLifetime)?;
        let exp = now
            .checked_add_signed(lifetime)
            .ok_or(TokenError::InvalidLifetime)?
            .timestamp();

        let claims = Claims {
            exp,
            access: identity.to_string(),
            custom: cfg.custom_claims.clone(),
        };
        // Same instant as the signed claim, sub-second part dropped
        let expires_at = claims.expires_at().ok_or(TokenError::InvalidLifetime)?;

        let token = self.codec.sign(&claims)?;
        let header = transport_header(&token, expires_at, cfg)?;

        debug!(identity = %identity, transport = %cfg.token_store, "Minted access token");

        Ok(IssuedToken {
            token,
            claims,
            expires_at,
            header,
        })
    }

    /// Mint a token and write it to the response headers
    pub fn issue(
        &self,
        identity: &str,
        cfg: &GrantConfig,
        response: &mut HeaderMap,
    ) -> Result<IssuedToken, TokenError> {
        let issued = self.mint(identity, cfg)?;
        issued.deliver(response);
        Ok(issued)
    }

    /// Claims of a valid token carried by the request, if any
    pub fn granted_claims(
        &self,
        headers: &HeaderMap,
        store: TokenStore,
        now: DateTime<Utc>,
    ) -> Option<Claims> {
        let token = match extract_token(headers, store) {
            Ok(token) => token,
            Err(e) => {
                debug!(transport = %store, error = %e, "Failed to get token to check API access grant");
                return None;
            }
        };

        match self.codec.verify(&token, now) {
            Ok(claims) => Some(claims),
            Err(e) => {
                debug!(transport = %store, error = %e, "Access token rejected");
                None
            }
        }
    }

    pub fn verify(&self, headers: &HeaderMap, store: TokenStore) -> bool {
        self.verify_at(headers, store, Utc::now())
    }

    pub fn verify_at(&self, headers: &HeaderMap, store: TokenStore, now: DateTime<Utc>) -> bool {
        self.granted_claims(headers, store, now).is_some()
    }

    /// Valid token whose subject is exactly `identity`
    pub fn verify_owner(&self, headers: &HeaderMap, store: TokenStore, identity: &str) -> bool {
        self.verify_owner_at(headers, store, identity, Utc::now())
    }

    pub fn verify_owner_at(
        &self,
        headers: &HeaderMap,
        store: TokenStore,
        identity: &str,
        now: DateTime<Utc>,
    ) -> bool {
        self.granted_claims(headers, store, now)
            .is_some_and(|claims| claims.access == identity)
    }

    pub fn decode_claims(&self, token: &str) -> Result<Claims, TokenError> {
        self.codec.decode_claims(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const TEST_SECRET: &[u8] = b"test-secret-key-for-signing";

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn hour() -> GrantConfig {
        GrantConfig::new(Duration::from_secs(3600), TokenStore::HeaderBearer)
    }

    fn bearer_request(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, format!("Bearer {}", token).parse().unwrap());
        headers
    }

    fn cookie_request(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            format!("theme=dark; {}={}", ACCESS_COOKIE, token).parse().unwrap(),
        );
        headers
    }

    #[test]
    fn test_mint_sets_reserved_and_custom_claims() {
        let issuer = TokenIssuer::hmac(TEST_SECRET);
        let cfg = hour().with_claim("role", "reader").unwrap();

        let issued = issuer.mint_at("a@x.com", &cfg, now()).unwrap();
        let claims = issuer.decode_claims(issued.as_str()).unwrap();

        assert_eq!(claims.access, "a@x.com");
        assert_eq!(claims.exp, now().timestamp() + 3600);
        assert_eq!(claims.custom.get("role"), Some(&Value::from("reader")));
        assert_eq!(issued.expires_at(), now() + chrono::Duration::hours(1));
    }

    #[test]
    fn test_token_valid_until_lifetime_elapses() {
        let issuer = TokenIssuer::hmac(TEST_SECRET);
        let issued = issuer.mint_at("a@x.com", &hour(), now()).unwrap();
        let req = bearer_request(issued.as_str());

        assert!(issuer.verify_at(&req, TokenStore::HeaderBearer, now()));
        assert!(issuer.verify_at(
            &req,
            TokenStore::HeaderBearer,
            now() + chrono::Duration::seconds(3599)
        ));
        assert!(!issuer.verify_at(
            &req,
            TokenStore::HeaderBearer,
            now() + chrono::Duration::seconds(3601)
        ));
    }

    #[test]
    fn test_reserved_claim_rejected_at_config_time() {
        assert!(matches!(
            hour().with_claim("exp", 123),
            Err(TokenError::ReservedClaim(_))
        ));
        assert!(matches!(
            hour().with_claim("access", "x"),
            Err(TokenError::ReservedClaim(_))
        ));
    }

    #[test]
    fn test_reserved_claim_rejected_at_issue_without_writing() {
        let issuer = TokenIssuer::hmac(TEST_SECRET);

        for (key, value) in [("exp", Value::from(123)), ("access", Value::from("x"))] {
            for store in [TokenStore::HeaderBearer, TokenStore::Cookie] {
                let mut cfg = GrantConfig::new(Duration::from_secs(3600), store);
                cfg.custom_claims.insert(key.to_string(), value.clone());

                let mut response = HeaderMap::new();
                let result = issuer.issue("a@x.com", &cfg, &mut response);

                assert!(matches!(result, Err(TokenError::ReservedClaim(_))));
                assert!(response.is_empty());
            }
        }
    }

    #[test]
    fn test_zero_lifetime_rejected() {
        let issuer = TokenIssuer::hmac(TEST_SECRET);
        let cfg = GrantConfig::new(Duration::ZERO, TokenStore::HeaderBearer);
        assert!(matches!(
            issuer.mint_at("a@x.com", &cfg, now()),
            Err(TokenError::InvalidLifetime)
        ));
    }

    #[test]
    fn test_fractional_lifetime_rejected() {
        let issuer = TokenIssuer::hmac(TEST_SECRET);
        for lifetime in [Duration::from_millis(500), Duration::from_millis(1500)] {
            let cfg = GrantConfig::new(lifetime, TokenStore::HeaderBearer);
            let mut response = HeaderMap::new();
            assert!(matches!(
                issuer.issue("a@x.com", &cfg, &mut response),
                Err(TokenError::InvalidLifetime)
            ));
            assert!(response.is_empty());
        }
    }

    #[test]
    fn test_expiry_agrees_with_signed_claim() {
        let issuer = TokenIssuer::hmac(TEST_SECRET);
        let cfg = GrantConfig::new(Duration::from_secs(1), TokenStore::Cookie);
        let issued_at = now() + chrono::Duration::milliseconds(700);

        let issued = issuer.mint_at("a@x.com", &cfg, issued_at).unwrap();
        assert_eq!(issued.expires_at().timestamp(), issued.claims().exp);
        assert_eq!(issued.expires_at().timestamp_subsec_nanos(), 0);
        assert!(issued.claims().exp > issued_at.timestamp());

        let mut response = HeaderMap::new();
        issued.deliver(&mut response);
        let cookie = response.get(SET_COOKIE).unwrap().to_str().unwrap();
        assert!(cookie.contains("Expires=Sun, 01 Mar 2026 12:00:01 GMT"));

        let req = cookie_request(issued.as_str());
        assert!(issuer.verify_at(&req, TokenStore::Cookie, issued_at));
        assert!(!issuer.verify_at(&req, TokenStore::Cookie, now() + chrono::Duration::seconds(1)));
    }

    #[test]
    fn test_header_transport_writes_bearer() {
        let issuer = TokenIssuer::hmac(TEST_SECRET);
        let mut response = HeaderMap::new();
        let issued = issuer.issue("a@x.com", &hour(), &mut response).unwrap();

        let value = response.get(AUTHORIZATION).unwrap().to_str().unwrap();
        assert_eq!(value, format!("Bearer {}", issued.as_str()));
        assert!(response.get(SET_COOKIE).is_none());
    }

    #[test]
    fn test_cookie_transport_attributes() {
        let issuer = TokenIssuer::hmac(TEST_SECRET);
        let cfg = GrantConfig::new(Duration::from_secs(3600), TokenStore::Cookie);

        let issued = issuer.mint_at("a@x.com", &cfg, now()).unwrap();
        let mut response = HeaderMap::new();
        issued.deliver(&mut response);

        let cookie = response.get(SET_COOKIE).unwrap().to_str().unwrap();
        assert!(cookie.starts_with(&format!("{}={};", ACCESS_COOKIE, issued.as_str())));
        assert!(cookie.contains("Path=/"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Expires=Sun, 01 Mar 2026 13:00:00 GMT"));
        assert!(!cookie.contains("Secure"));
        assert!(response.get(AUTHORIZATION).is_none());

        let secure = issuer
            .mint_at("a@x.com", &cfg.clone().secure_cookie(true), now())
            .unwrap();
        let mut response = HeaderMap::new();
        secure.deliver(&mut response);
        assert!(response.get(SET_COOKIE).unwrap().to_str().unwrap().ends_with("; Secure"));
    }

    #[test]
    fn test_cookie_transport_roundtrip() {
        let issuer = TokenIssuer::hmac(TEST_SECRET);
        let cfg = GrantConfig::new(Duration::from_secs(3600), TokenStore::Cookie);
        let issued = issuer.mint_at("a@x.com", &cfg, now()).unwrap();

        let req = cookie_request(issued.as_str());
        assert!(issuer.verify_at(&req, TokenStore::Cookie, now()));
        // Reading with the other transport finds nothing
        assert!(!issuer.verify_at(&req, TokenStore::HeaderBearer, now()));
    }

    #[test]
    fn test_missing_token_is_not_granted() {
        let issuer = TokenIssuer::hmac(TEST_SECRET);
        let headers = HeaderMap::new();
        assert!(!issuer.verify_at(&headers, TokenStore::HeaderBearer, now()));
        assert!(!issuer.verify_at(&headers, TokenStore::Cookie, now()));
    }

    #[test]
    fn test_bearer_prefix_optional() {
        let issuer = TokenIssuer::hmac(TEST_SECRET);
        let issued = issuer.mint_at("a@x.com", &hour(), now()).unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, issued.as_str().parse().unwrap());
        assert!(issuer.verify_at(&headers, TokenStore::HeaderBearer, now()));
    }

    #[test]
    fn test_wrong_key_and_tampering_rejected() {
        let issuer = TokenIssuer::hmac(TEST_SECRET);
        let other = TokenIssuer::hmac(b"wrong-secret");
        let issued = issuer.mint_at("a@x.com", &hour(), now()).unwrap();

        assert!(!other.verify_at(&bearer_request(issued.as_str()), TokenStore::HeaderBearer, now()));

        // Swap in a payload for another identity, keep the signature
        let forged = other.mint_at("root@x.com", &hour(), now()).unwrap();
        let (h, _, s) = split_token(issued.as_str()).unwrap();
        let (_, p, _) = split_token(forged.as_str()).unwrap();
        let tampered = format!("{}.{}.{}", h, p, s);
        assert!(!issuer.verify_at(&bearer_request(&tampered), TokenStore::HeaderBearer, now()));
    }

    #[test]
    fn test_unsigned_algorithm_rejected() {
        let codec = HmacCodec::new(TEST_SECRET);
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(br#"{"exp":9999999999,"access":"a@x.com"}"#);
        let token = format!("{}.{}.", header, payload);

        assert!(matches!(codec.verify(&token, now()), Err(TokenError::InvalidFormat)));
    }

    #[test]
    fn test_verify_owner_exact_match() {
        let issuer = TokenIssuer::hmac(TEST_SECRET);
        let issued = issuer.mint_at("a@x.com", &hour(), now()).unwrap();
        let req = bearer_request(issued.as_str());

        assert!(issuer.verify_owner_at(&req, TokenStore::HeaderBearer, "a@x.com", now()));
        assert!(!issuer.verify_owner_at(&req, TokenStore::HeaderBearer, "A@x.com", now()));
        assert!(!issuer.verify_owner_at(&req, TokenStore::HeaderBearer, "b@x.com", now()));

        // Owner check still requires a live token
        let later = now() + chrono::Duration::hours(2);
        assert!(!issuer.verify_owner_at(&req, TokenStore::HeaderBearer, "a@x.com", later));
    }

    #[test]
    fn test_token_store_parse() {
        assert_eq!("header".parse::<TokenStore>().unwrap(), TokenStore::HeaderBearer);
        assert_eq!("Bearer".parse::<TokenStore>().unwrap(), TokenStore::HeaderBearer);
        assert_eq!("cookie".parse::<TokenStore>().unwrap(), TokenStore::Cookie);
        assert!(matches!(
            "query".parse::<TokenStore>(),
            Err(TokenError::UnknownTransport(_))
        ));
    }
}
