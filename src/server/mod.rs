//! keygate HTTP server
//!
//! Serves the access-grant API with protected routes behind the authorization gate.

pub mod api;
pub mod gate;

pub use api::{create_router, ApiState};
pub use gate::{
    require_grant, require_operator, trim_port, AuthorizationGate, NoSessions, SessionCheck,
};

use crate::auth::{AccessGrantService, GrantConfig};
use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

/// Server configuration
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,
    /// Requests from this address (port stripped) pass the gate without a token
    pub trusted_addr: Option<String>,
    /// Defaults for every token the server issues
    pub grant_config: GrantConfig,
}

/// The keygate HTTP server
pub struct KeygateServer {
    config: ServerConfig,
    service: Arc<AccessGrantService>,
    sessions: Arc<dyn SessionCheck>,
}

impl KeygateServer {
    pub fn new(config: ServerConfig, service: Arc<AccessGrantService>) -> Self {
        Self {
            config,
            service,
            sessions: Arc::new(NoSessions),
        }
    }

    pub fn with_sessions(mut self, sessions: Arc<dyn SessionCheck>) -> Self {
        self.sessions = sessions;
        self
    }

    pub fn router(&self) -> axum::Router {
        let mut gate =
            AuthorizationGate::new(self.service.issuer()).with_sessions(self.sessions.clone());
        if let Some(addr) = &self.config.trusted_addr {
            gate = gate.with_trusted_addr(addr.clone());
        }

        let state = ApiState {
            service: self.service.clone(),
            grant_config: self.config.grant_config.clone(),
        };

        create_router(state, gate)
    }

    /// Run the server
    pub async fn run(&self) -> Result<()> {
        let app = self.router();

        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;
        info!(
            addr = %self.config.bind_addr,
            trusted_addr = ?self.config.trusted_addr,
            transport = %self.config.grant_config.token_store,
            "keygate server listening"
        );

        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await?;

        Ok(())
    }
}
