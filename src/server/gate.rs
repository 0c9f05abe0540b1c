//! Authorization gate middleware
//!
//! A request is admitted if any of these hold:
//! - it carries a valid bearer token
//! - the session collaborator accepts it
//! - its remote address, port stripped, equals the trusted address
//!
//! Operator routes ([`require_operator`]) drop the first option: a bearer token
//! only speaks for its own identity.

use crate::auth::{TokenIssuer, TokenStore};
use axum::extract::{ConnectInfo, Request, State};
use axum::http::header::{AUTHORIZATION, COOKIE, HOST, USER_AGENT};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tracing::{debug, warn};

/// Body of the response sent to rejected requests
pub const UNAUTHORIZED_MESSAGE: &str = "Please login first...";

/// Independent session check (e.g. an admin login cookie)
pub trait SessionCheck: Send + Sync {
    fn is_valid(&self, headers: &HeaderMap) -> bool;
}

/// Session check that never accepts
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSessions;

impl SessionCheck for NoSessions {
    fn is_valid(&self, _headers: &HeaderMap) -> bool {
        false
    }
}

impl<F> SessionCheck for F
where
    F: Fn(&HeaderMap) -> bool + Send + Sync,
{
    fn is_valid(&self, headers: &HeaderMap) -> bool {
        self(headers)
    }
}

/// Strip a trailing `:port` from a remote address
///
/// `"127.0.0.1:9000"` -> `"127.0.0.1"`, `"[::1]:9000"` -> `"::1"`.
/// A bare IP, v4 or v6, is returned as is.
pub fn trim_port(addr: &str) -> String {
    if let Ok(ip) = addr.parse::<IpAddr>() {
        return ip.to_string();
    }
    if let Ok(socket) = addr.parse::<SocketAddr>() {
        return socket.ip().to_string();
    }
    match addr.split_once(':') {
        Some((host, _)) => host.to_string(),
        None => addr.to_string(),
    }
}

/// Decides whether a request may reach a protected route
#[derive(Clone)]
pub struct AuthorizationGate {
    issuer: Arc<TokenIssuer>,
    sessions: Arc<dyn SessionCheck>,
    trusted_addr: Option<String>,
}

impl AuthorizationGate {
    pub fn new(issuer: Arc<TokenIssuer>) -> Self {
        Self {
            issuer,
            sessions: Arc::new(NoSessions),
            trusted_addr: None,
        }
    }

    pub fn with_sessions(mut self, sessions: Arc<dyn SessionCheck>) -> Self {
        self.sessions = sessions;
        self
    }

    /// Admit requests whose remote address, port stripped, equals `addr`
    pub fn with_trusted_addr(mut self, addr: impl Into<String>) -> Self {
        self.trusted_addr = Some(addr.into());
        self
    }

    pub fn issuer(&self) -> &Arc<TokenIssuer> {
        &self.issuer
    }

    fn is_trusted(&self, remote_addr: Option<&str>) -> bool {
        match (&self.trusted_addr, remote_addr) {
            (Some(trusted), Some(remote)) => trim_port(remote) == *trusted,
            _ => false,
        }
    }

    pub fn admits(&self, headers: &HeaderMap, remote_addr: Option<&str>) -> bool {
        if self.issuer.verify(headers, TokenStore::HeaderBearer) {
            debug!("Admitted by access token");
            return true;
        }

        self.admits_operator(headers, remote_addr)
    }

    /// Session or trusted origin only
    pub fn admits_operator(&self, headers: &HeaderMap, remote_addr: Option<&str>) -> bool {
        if self.sessions.is_valid(headers) {
            debug!("Admitted by session");
            return true;
        }

        if self.is_trusted(remote_addr) {
            debug!(remote_addr = ?remote_addr, "Admitted by trusted origin");
            return true;
        }

        false
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &axum::http::HeaderName) -> &'a str {
    headers.get(name).and_then(|v| v.to_str().ok()).unwrap_or("-")
}

/// Log a fixed set of request fields for a rejected request
///
/// Token and cookie values are never logged, only their presence.
fn log_rejection(req: &Request, remote_addr: Option<&str>) {
    let headers = req.headers();
    warn!(
        method = %req.method(),
        uri = %req.uri(),
        version = ?req.version(),
        remote_addr = remote_addr.unwrap_or("-"),
        host = header_str(headers, &HOST),
        user_agent = header_str(headers, &USER_AGENT),
        has_authorization = headers.contains_key(AUTHORIZATION),
        has_cookie = headers.contains_key(COOKIE),
        "Rejected unauthorized request"
    );
}

fn remote_addr(req: &Request) -> Option<String> {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
}

fn reject(req: &Request, remote_addr: Option<&str>) -> Response {
    log_rejection(req, remote_addr);
    (StatusCode::UNAUTHORIZED, UNAUTHORIZED_MESSAGE).into_response()
}

/// Middleware for `axum::middleware::from_fn_with_state`
pub async fn require_grant(
    State(gate): State<AuthorizationGate>,
    req: Request,
    next: Next,
) -> Response {
    let remote_addr = remote_addr(&req);

    if gate.admits(req.headers(), remote_addr.as_deref()) {
        return next.run(req).await;
    }

    reject(&req, remote_addr.as_deref())
}

/// Like [`require_grant`], but a bearer token alone is not enough
pub async fn require_operator(
    State(gate): State<AuthorizationGate>,
    req: Request,
    next: Next,
) -> Response {
    let remote_addr = remote_addr(&req);

    if gate.admits_operator(req.headers(), remote_addr.as_deref()) {
        return next.run(req).await;
    }

    reject(&req, remote_addr.as_deref())
}
