//! Cached external calendar reads.
//!
//! Each entry stores the last synced event set together with the query
//! window it was fetched for and the provider sync cursor, if one was
//! issued. The window is part of the entry so the sync engine can tell
//! whether a stored cursor still applies.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

use quorum_core::{CalendarEvent, ProviderKind, QueryWindow};

use crate::error::{StoreError, StoreResult};

/// Identifies one user's cached view of one meeting on one provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SyncKey {
    pub provider: ProviderKind,
    pub user_id: i64,
    pub meeting_id: i64,
}

/// A cached sync result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCacheEntry {
    pub events: Vec<CalendarEvent>,
    pub window: QueryWindow,

    /// Provider delta cursor, valid only for `window`.
    pub cursor: Option<String>,
}

/// Storage of cached sync results.
pub trait SyncCacheStore: Send + Sync {
    fn get(&self, key: SyncKey) -> StoreResult<Option<SyncCacheEntry>>;

    fn save(&self, key: SyncKey, entry: SyncCacheEntry) -> StoreResult<()>;

    fn delete(&self, key: SyncKey) -> StoreResult<()>;

    /// Drops every entry a user holds on a provider. Used on unlink.
    fn delete_for_user(&self, provider: ProviderKind, user_id: i64) -> StoreResult<()>;
}

/// In-memory sync cache.
#[derive(Debug, Default)]
pub struct MemorySyncCacheStore {
    rows: Mutex<HashMap<SyncKey, SyncCacheEntry>>,
}

impl MemorySyncCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StoreResult<std::sync::MutexGuard<'_, HashMap<SyncKey, SyncCacheEntry>>> {
        self.rows
            .lock()
            .map_err(|_| StoreError::backend("sync cache lock poisoned"))
    }
}

impl SyncCacheStore for MemorySyncCacheStore {
    fn get(&self, key: SyncKey) -> StoreResult<Option<SyncCacheEntry>> {
        Ok(self.lock()?.get(&key).cloned())
    }

    fn save(&self, key: SyncKey, entry: SyncCacheEntry) -> StoreResult<()> {
        self.lock()?.insert(key, entry);
        Ok(())
    }

    fn delete(&self, key: SyncKey) -> StoreResult<()> {
        self.lock()?.remove(&key);
        Ok(())
    }

    fn delete_for_user(&self, provider: ProviderKind, user_id: i64) -> StoreResult<()> {
        self.lock()?
            .retain(|key, _| !(key.provider == provider && key.user_id == user_id));
        Ok(())
    }
}
