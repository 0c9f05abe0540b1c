//! In-memory credential store

use crate::auth::CredentialRecord;
use crate::storage::{CredentialStore, IdentityState, StorageError};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry as MapEntry;
use dashmap::DashMap;
use tracing::debug;

#[derive(Debug, Clone)]
enum Entry {
    Pending,
    Active(CredentialRecord),
}

/// Process-local store
///
/// Pending and active identities share one map, and every mutation goes through
/// the map's per-key entry lock, so each trait method is atomic per identity.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, Entry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Number of pending reservations
    pub fn pending_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e.value(), Entry::Pending))
            .count()
    }

    /// Number of active grants
    pub fn active_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e.value(), Entry::Active(_)))
            .count()
    }
}

fn conflict(identity: &str, entry: &Entry) -> StorageError {
    match entry {
        Entry::Pending => StorageError::Conflict(format!("{} is already pending", identity)),
        Entry::Active(_) => StorageError::Conflict(format!("{} is already active", identity)),
    }
}

fn not_active(identity: &str) -> StorageError {
    StorageError::NotFound(format!("no active grant for {}", identity))
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn check_available(&self, identity: &str) -> Result<(), StorageError> {
        match self.entries.get(identity) {
            Some(entry) => Err(conflict(identity, entry.value())),
            None => Ok(()),
        }
    }

    async fn reserve_if_available(&self, identity: &str) -> Result<(), StorageError> {
        match self.entries.entry(identity.to_string()) {
            MapEntry::Occupied(o) => Err(conflict(identity, o.get())),
            MapEntry::Vacant(v) => {
                v.insert(Entry::Pending);
                debug!(identity = %identity, "Reserved pending identity");
                Ok(())
            }
        }
    }

    async fn cancel_pending(&self, identity: &str) -> Result<(), StorageError> {
        if self
            .entries
            .remove_if(identity, |_, e| matches!(e, Entry::Pending))
            .is_some()
        {
            debug!(identity = %identity, "Cancelled pending identity");
        }
        Ok(())
    }

    async fn put_grant(&self, record: &CredentialRecord) -> Result<(), StorageError> {
        self.entries
            .insert(record.identity.clone(), Entry::Active(record.clone()));
        Ok(())
    }

    async fn create_grant(&self, record: &CredentialRecord) -> Result<(), StorageError> {
        match self.entries.entry(record.identity.clone()) {
            MapEntry::Occupied(mut o) => {
                if let Entry::Active(_) = o.get() {
                    return Err(conflict(&record.identity, o.get()));
                }
                o.insert(Entry::Active(record.clone()));
            }
            MapEntry::Vacant(v) => {
                v.insert(Entry::Active(record.clone()));
            }
        }
        debug!(identity = %record.identity, "Created active grant");
        Ok(())
    }

    async fn replace_grant(
        &self,
        current: &CredentialRecord,
        replacement: &CredentialRecord,
    ) -> Result<(), StorageError> {
        match self.entries.entry(current.identity.clone()) {
            MapEntry::Occupied(mut o) => {
                let unchanged = match o.get() {
                    Entry::Active(stored) => stored.secret_hash == current.secret_hash,
                    Entry::Pending => return Err(not_active(&current.identity)),
                };
                if !unchanged {
                    return Err(StorageError::Conflict(format!(
                        "grant for {} changed concurrently",
                        current.identity
                    )));
                }
                o.insert(Entry::Active(replacement.clone()));
                debug!(identity = %current.identity, "Replaced active grant");
                Ok(())
            }
            MapEntry::Vacant(_) => Err(not_active(&current.identity)),
        }
    }

    async fn get_grant(&self, identity: &str) -> Result<CredentialRecord, StorageError> {
        match self.entries.get(identity).as_deref() {
            Some(Entry::Active(record)) => Ok(record.clone()),
            _ => Err(not_active(identity)),
        }
    }

    async fn revoke_grant(&self, identity: &str) -> Result<(), StorageError> {
        if self
            .entries
            .remove_if(identity, |_, e| matches!(e, Entry::Active(_)))
            .is_some()
        {
            debug!(identity = %identity, "Revoked active grant");
        }
        Ok(())
    }

    async fn identity_state(&self, identity: &str) -> Result<IdentityState, StorageError> {
        Ok(match self.entries.get(identity).as_deref() {
            None => IdentityState::Unregistered,
            Some(Entry::Pending) => IdentityState::Pending,
            Some(Entry::Active(_)) => IdentityState::Active,
        })
    }
}
