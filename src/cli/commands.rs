//! CLI command definitions

use clap::{Parser, Subcommand};
use keygate::TokenStore;

#[derive(Parser)]
#[command(name = "keygate")]
#[command(about = "API access grants and authorization gate", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Database URL (the server falls back to an in-memory store without it)
    #[arg(long, env = "DATABASE_URL", global = true)]
    pub database_url: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the keygate server
    Serve {
        /// Address to bind to
        #[arg(short, long, default_value = "127.0.0.1:8080", env = "KEYGATE_BIND")]
        bind: String,

        /// Token signing secret
        #[arg(long, env = "KEYGATE_SECRET")]
        secret: String,

        /// Requests from this address skip the token check (defaults to the bind host)
        #[arg(long, env = "KEYGATE_TRUSTED_ADDR")]
        trusted_addr: Option<String>,

        /// Token lifetime in seconds
        #[arg(long, default_value_t = 3600, env = "KEYGATE_TOKEN_LIFETIME")]
        token_lifetime: u64,

        /// Token transport: header or cookie
        #[arg(long, default_value = "header", value_parser = parse_token_store, env = "KEYGATE_TOKEN_STORE")]
        token_store: TokenStore,

        /// Set the Secure flag on the access cookie
        #[arg(long, env = "KEYGATE_SECURE_COOKIE")]
        secure_cookie: bool,
    },

    /// Check whether an identity is free to register
    Check {
        identity: String,
    },

    /// Revoke an active grant
    ///
    /// Examples:
    ///   keygate revoke a@example.com
    Revoke {
        identity: String,
    },

    /// Remove a pending reservation (e.g. an abandoned signup)
    CancelPending {
        identity: String,
    },

    /// Initialize the database schema
    Init,

    /// Show store status
    Status,
}

fn parse_token_store(s: &str) -> Result<TokenStore, String> {
    s.parse::<TokenStore>().map_err(|e| e.to_string())
}
