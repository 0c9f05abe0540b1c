//! HTTP API for access grants

use crate::auth::{AccessGrant, AccessGrantService, GrantConfig};
use crate::error::AccessError;
use crate::server::gate::{require_grant, require_operator, AuthorizationGate};

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    middleware::from_fn_with_state,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::error;

/// Shared state for API handlers
#[derive(Clone)]
pub struct ApiState {
    pub service: Arc<AccessGrantService>,
    pub grant_config: GrantConfig,
}

#[derive(Debug, Deserialize)]
pub struct IdentityRequest {
    pub identity: String,
}

#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    pub identity: String,
    pub secret: String,
}

#[derive(Debug, Deserialize)]
pub struct RotateRequest {
    pub identity: String,
    pub current_secret: String,
    pub new_secret: String,
}

#[derive(Debug, Serialize)]
struct WhoAmI {
    identity: Option<String>,
}

impl IntoResponse for AccessError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            AccessError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION"),
            AccessError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            AccessError::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            AccessError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            AccessError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            AccessError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CONFIG"),
            AccessError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE"),
            AccessError::Token(_) => (StatusCode::INTERNAL_SERVER_ERROR, "TOKEN"),
            AccessError::Credential(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CREDENTIAL"),
        };

        let message = if status.is_server_error() {
            error!(error = %self, "Access grant operation failed");
            "internal error".to_string()
        } else {
            self.to_string()
        };

        let body = json!({ "error": { "code": code, "message": message } });
        (status, Json(body)).into_response()
    }
}

/// Create the API router
///
/// Protected routes sit behind [`require_grant`]. Cancelling someone's pending
/// reservation is operator-only ([`require_operator`]).
pub fn create_router(state: ApiState, gate: AuthorizationGate) -> Router {
    let operator = Router::new()
        .route("/api/access/pending/{identity}", delete(cancel_pending_handler))
        .route_layer(from_fn_with_state(gate.clone(), require_operator));

    let protected = Router::new()
        .route("/api/access/grants/{identity}", delete(revoke_handler))
        .route("/api/access/rotate", post(rotate_handler))
        .route("/api/access/whoami", get(whoami_handler))
        .route_layer(from_fn_with_state(gate, require_grant));

    Router::new()
        .route("/health", get(health_handler))
        .route("/api/access/check", post(check_handler))
        .route("/api/access/pending", post(reserve_handler))
        .route("/api/access/register", post(register_handler))
        .route("/api/access/login", post(login_handler))
        .merge(protected)
        .merge(operator)
        .with_state(state)
}

async fn health_handler() -> &'static str {
    "ok"
}

async fn check_handler(
    State(state): State<ApiState>,
    Json(req): Json<IdentityRequest>,
) -> Result<StatusCode, AccessError> {
    state.service.check_available(&req.identity).await?;
    Ok(StatusCode::OK)
}

async fn reserve_handler(
    State(state): State<ApiState>,
    Json(req): Json<IdentityRequest>,
) -> Result<StatusCode, AccessError> {
    state.service.reserve(&req.identity).await?;
    Ok(StatusCode::CREATED)
}

async fn cancel_pending_handler(
    State(state): State<ApiState>,
    Path(identity): Path<String>,
) -> Result<StatusCode, AccessError> {
    state.service.cancel_pending(&identity).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn register_handler(
    State(state): State<ApiState>,
    Json(req): Json<CredentialsRequest>,
) -> Result<(HeaderMap, Json<AccessGrant>), AccessError> {
    let mut headers = HeaderMap::new();
    let grant = state
        .service
        .register(&req.identity, &req.secret, &state.grant_config, &mut headers)
        .await?;
    Ok((headers, Json(grant)))
}

async fn login_handler(
    State(state): State<ApiState>,
    Json(req): Json<CredentialsRequest>,
) -> Result<(HeaderMap, Json<AccessGrant>), AccessError> {
    let mut headers = HeaderMap::new();
    let grant = state
        .service
        .login(&req.identity, &req.secret, &state.grant_config, &mut headers)
        .await?;
    Ok((headers, Json(grant)))
}

async fn rotate_handler(
    State(state): State<ApiState>,
    Json(req): Json<RotateRequest>,
) -> Result<StatusCode, AccessError> {
    state
        .service
        .rotate_secret(&req.identity, &req.current_secret, &req.new_secret)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Only the grant's owner may revoke it
async fn revoke_handler(
    State(state): State<ApiState>,
    Path(identity): Path<String>,
    headers: HeaderMap,
) -> Result<StatusCode, AccessError> {
    let issuer = state.service.issuer();
    if !issuer.verify_owner(&headers, state.grant_config.token_store, &identity) {
        return Err(AccessError::Forbidden(format!(
            "token does not belong to {}",
            identity
        )));
    }

    state.service.revoke_grant(&identity).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn whoami_handler(State(state): State<ApiState>, headers: HeaderMap) -> Json<WhoAmI> {
    let identity = state
        .service
        .issuer()
        .granted_claims(&headers, state.grant_config.token_store, chrono::Utc::now())
        .map(|claims| claims.access);
    Json(WhoAmI { identity })
}
