//! PostgreSQL storage backend

use crate::auth::CredentialRecord;
use crate::storage::{CredentialStore, IdentityState, StorageError};
use async_trait::async_trait;
use deadpool_postgres::{Config, Pool, Runtime};
use tokio_postgres::NoTls;
use tracing::{debug, info};

/// PostgreSQL store for pending reservations and active grants
///
/// Pending and active identities live in one table keyed by identity, so the
/// primary key enforces that an identity is in at most one set. Every trait
/// method is a single statement.
pub struct PostgresStore {
    pool: Pool,
}

impl PostgresStore {
    /// Connect and ensure the schema exists
    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let cfg = Config {
            url: Some(database_url.to_string()),
            ..Config::default()
        };

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| StorageError::Database(e.to_string()))?;

        let store = Self { pool };
        store.ensure_schema().await?;

        Ok(store)
    }

    async fn client(&self) -> Result<deadpool_postgres::Object, StorageError> {
        self.pool
            .get()
            .await
            .map_err(|e| StorageError::Database(e.to_string()))
    }

    /// Ensure database schema exists
    async fn ensure_schema(&self) -> Result<(), StorageError> {
        let client = self.client().await?;

        client
            .batch_execute(
                r#"
                CREATE TABLE IF NOT EXISTS keygate_identities (
                    identity TEXT PRIMARY KEY,
                    state TEXT NOT NULL CHECK (state IN ('pending', 'active')),
                    secret_hash TEXT,
                    secret_salt TEXT,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    CHECK (state = 'pending' OR (secret_hash IS NOT NULL AND secret_salt IS NOT NULL))
                );

                CREATE INDEX IF NOT EXISTS keygate_identities_state_idx ON keygate_identities(state);
                "#,
            )
            .await
            .map_err(|e| StorageError::Database(e.to_string()))?;

        info!("Database schema initialized");
        Ok(())
    }

    /// Counts of (pending, active) identities
    pub async fn counts(&self) -> Result<(i64, i64), StorageError> {
        let client = self.client().await?;

        let row = client
            .query_one(
                "SELECT COUNT(*) FILTER (WHERE state = 'pending'),
                        COUNT(*) FILTER (WHERE state = 'active')
                 FROM keygate_identities",
                &[],
            )
            .await
            .map_err(|e| StorageError::Database(e.to_string()))?;

        Ok((row.get(0), row.get(1)))
    }
}

fn parse_state(identity: &str, state: &str) -> Result<IdentityState, StorageError> {
    match state {
        "pending" => Ok(IdentityState::Pending),
        "active" => Ok(IdentityState::Active),
        other => Err(StorageError::Serialization(format!(
            "unknown state '{}' for {}",
            other, identity
        ))),
    }
}

#[async_trait]
impl CredentialStore for PostgresStore {
    async fn check_available(&self, identity: &str) -> Result<(), StorageError> {
        match self.identity_state(identity).await? {
            IdentityState::Unregistered => Ok(()),
            state => Err(StorageError::Conflict(format!("{} is already {}", identity, state))),
        }
    }

    async fn reserve_if_available(&self, identity: &str) -> Result<(), StorageError> {
        let client = self.client().await?;

        let inserted = client
            .execute(
                "INSERT INTO keygate_identities (identity, state) VALUES ($1, 'pending')
                 ON CONFLICT (identity) DO NOTHING",
                &[&identity],
            )
            .await
            .map_err(|e| StorageError::Database(e.to_string()))?;

        if inserted == 0 {
            return Err(StorageError::Conflict(format!("{} is already in use", identity)));
        }

        debug!(identity = %identity, "Reserved pending identity");
        Ok(())
    }

    async fn cancel_pending(&self, identity: &str) -> Result<(), StorageError> {
        let client = self.client().await?;

        client
            .execute(
                "DELETE FROM keygate_identities WHERE identity = $1 AND state = 'pending'",
                &[&identity],
            )
            .await
            .map_err(|e| StorageError::Database(e.to_string()))?;

        Ok(())
    }

    async fn put_grant(&self, record: &CredentialRecord) -> Result<(), StorageError> {
        let client = self.client().await?;

        client
            .execute(
                "INSERT INTO keygate_identities (identity, state, secret_hash, secret_salt)
                 VALUES ($1, 'active', $2, $3)
                 ON CONFLICT (identity) DO UPDATE
                 SET state = 'active',
                     secret_hash = EXCLUDED.secret_hash,
                     secret_salt = EXCLUDED.secret_salt,
                     updated_at = NOW()",
                &[&record.identity, &record.secret_hash, &record.secret_salt],
            )
            .await
            .map_err(|e| StorageError::Database(e.to_string()))?;

        debug!(identity = %record.identity, "Stored active grant");
        Ok(())
    }

    async fn create_grant(&self, record: &CredentialRecord) -> Result<(), StorageError> {
        let client = self.client().await?;

        // Promotes a pending row but never overwrites an active one
        let written = client
            .execute(
                "INSERT INTO keygate_identities (identity, state, secret_hash, secret_salt)
                 VALUES ($1, 'active', $2, $3)
                 ON CONFLICT (identity) DO UPDATE
                 SET state = 'active',
                     secret_hash = EXCLUDED.secret_hash,
                     secret_salt = EXCLUDED.secret_salt,
                     updated_at = NOW()
                 WHERE keygate_identities.state = 'pending'",
                &[&record.identity, &record.secret_hash, &record.secret_salt],
            )
            .await
            .map_err(|e| StorageError::Database(e.to_string()))?;

        if written == 0 {
            return Err(StorageError::Conflict(format!(
                "{} is already active",
                record.identity
            )));
        }

        debug!(identity = %record.identity, "Created active grant");
        Ok(())
    }

    async fn replace_grant(
        &self,
        current: &CredentialRecord,
        replacement: &CredentialRecord,
    ) -> Result<(), StorageError> {
        let client = self.client().await?;

        let written = client
            .execute(
                "UPDATE keygate_identities
                 SET secret_hash = $2, secret_salt = $3, updated_at = NOW()
                 WHERE identity = $1 AND state = 'active' AND secret_hash = $4",
                &[
                    &current.identity,
                    &replacement.secret_hash,
                    &replacement.secret_salt,
                    &current.secret_hash,
                ],
            )
            .await
            .map_err(|e| StorageError::Database(e.to_string()))?;

        if written == 0 {
            // Only classifies the failure; nothing was written
            return match self.identity_state(&current.identity).await? {
                IdentityState::Active => Err(StorageError::Conflict(format!(
                    "grant for {} changed concurrently",
                    current.identity
                ))),
                _ => Err(StorageError::NotFound(format!(
                    "no active grant for {}",
                    current.identity
                ))),
            };
        }

        debug!(identity = %current.identity, "Replaced active grant");
        Ok(())
    }

    async fn get_grant(&self, identity: &str) -> Result<CredentialRecord, StorageError> {
        let client = self.client().await?;

        let row = client
            .query_opt(
                "SELECT secret_hash, secret_salt FROM keygate_identities
                 WHERE identity = $1 AND state = 'active'",
                &[&identity],
            )
            .await
            .map_err(|e| StorageError::Database(e.to_string()))?
            .ok_or_else(|| StorageError::NotFound(format!("no active grant for {}", identity)))?;

        Ok(CredentialRecord {
            identity: identity.to_string(),
            secret_hash: row.get(0),
            secret_salt: row.get(1),
        })
    }

    async fn revoke_grant(&self, identity: &str) -> Result<(), StorageError> {
        let client = self.client().await?;

        let removed = client
            .execute(
                "DELETE FROM keygate_identities WHERE identity = $1 AND state = 'active'",
                &[&identity],
            )
            .await
            .map_err(|e| StorageError::Database(e.to_string()))?;

        if removed > 0 {
            debug!(identity = %identity, "Revoked active grant");
        }
        Ok(())
    }

    async fn identity_state(&self, identity: &str) -> Result<IdentityState, StorageError> {
        let client = self.client().await?;

        let row = client
            .query_opt(
                "SELECT state FROM keygate_identities WHERE identity = $1",
                &[&identity],
            )
            .await
            .map_err(|e| StorageError::Database(e.to_string()))?;

        match row {
            Some(row) => parse_state(identity, row.get(0)),
            None => Ok(IdentityState::Unregistered),
        }
    }
}
