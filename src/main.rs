//! keygate CLI entry point

mod cli;

use crate::cli::{Cli, Commands};
use anyhow::{Context, Result};
use clap::Parser;
use keygate::auth::{AccessGrantService, Argon2Verifier, GrantConfig, TokenIssuer, TokenStore};
use keygate::server::{trim_port, KeygateServer, ServerConfig};
use keygate::storage::{CredentialStore, IdentityState, MemoryStore, PostgresStore};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            bind,
            secret,
            trusted_addr,
            token_lifetime,
            token_store,
            secure_cookie,
        } => {
            let opts = ServeOptions {
                bind,
                secret,
                trusted_addr,
                token_lifetime,
                token_store,
                secure_cookie,
            };
            serve(cli.database_url, opts).await
        }
        Commands::Check { identity } => check(&connect(cli.database_url).await?, &identity).await,
        Commands::Revoke { identity } => {
            let store = connect(cli.database_url).await?;
            store.revoke_grant(&identity).await?;
            println!("Revoked grant for {}", identity);
            Ok(())
        }
        Commands::CancelPending { identity } => {
            let store = connect(cli.database_url).await?;
            store.cancel_pending(&identity).await?;
            println!("Cleared pending reservation for {}", identity);
            Ok(())
        }
        Commands::Init => {
            let _store = connect(cli.database_url).await?;
            println!("Database schema initialized successfully");
            Ok(())
        }
        Commands::Status => status(&connect(cli.database_url).await?).await,
    }
}

struct ServeOptions {
    bind: String,
    secret: String,
    trusted_addr: Option<String>,
    token_lifetime: u64,
    token_store: TokenStore,
    secure_cookie: bool,
}

async fn connect(database_url: Option<String>) -> Result<PostgresStore> {
    let url = database_url.context("DATABASE_URL not set")?;
    PostgresStore::connect(&url)
        .await
        .context("Failed to connect to database")
}

async fn serve(database_url: Option<String>, opts: ServeOptions) -> Result<()> {
    let bind_addr: SocketAddr = opts.bind.parse().context("Invalid bind address")?;

    let store: Arc<dyn CredentialStore> = match database_url {
        Some(url) => Arc::new(
            PostgresStore::connect(&url)
                .await
                .context("Failed to connect to database")?,
        ),
        None => {
            warn!("DATABASE_URL not set, grants are kept in memory only");
            Arc::new(MemoryStore::new())
        }
    };

    let grant_config = GrantConfig::new(Duration::from_secs(opts.token_lifetime), opts.token_store)
        .secure_cookie(opts.secure_cookie);
    grant_config.validate().context("Invalid token configuration")?;

    let issuer = Arc::new(TokenIssuer::hmac(opts.secret.as_bytes()));
    let service = Arc::new(AccessGrantService::new(
        store,
        Arc::new(Argon2Verifier::new()),
        issuer,
    ));

    let trusted_addr = opts
        .trusted_addr
        .unwrap_or_else(|| trim_port(&bind_addr.to_string()));

    let config = ServerConfig {
        bind_addr,
        trusted_addr: Some(trusted_addr),
        grant_config,
    };

    let server = KeygateServer::new(config, service);

    info!("Starting keygate server...");

    tokio::select! {
        result = server.run() => {
            result?;
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received, stopping server");
        }
    }

    info!("keygate server stopped");
    Ok(())
}

async fn check(store: &PostgresStore, identity: &str) -> Result<()> {
    match store.identity_state(identity).await? {
        IdentityState::Unregistered => println!("{} is available", identity),
        state => println!("{} is {}", identity, state),
    }
    Ok(())
}

async fn status(store: &PostgresStore) -> Result<()> {
    let (pending, active) = store.counts().await?;

    println!("keygate Status");
    println!("==============");
    println!("Database: Connected");
    println!("Pending:  {}", pending);
    println!("Active:   {}", active);

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
