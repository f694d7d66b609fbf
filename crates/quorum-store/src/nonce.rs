//! Short-lived server-side nonces.
//!
//! Keys flow-scoped secrets, such as a PKCE verifier, between the
//! authorization redirect and the callback. Entries are one-shot: `take`
//! removes the value, so a replayed callback finds nothing.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::error::{StoreError, StoreResult};

/// Storage of one-shot expiring nonce values.
pub trait NonceCache: Send + Sync {
    fn put(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()>;

    /// Removes and returns the value if it exists and has not expired.
    fn take(&self, key: &str) -> StoreResult<Option<String>>;
}

/// In-memory nonce cache.
#[derive(Debug, Default)]
pub struct MemoryNonceCache {
    rows: Mutex<HashMap<String, (String, Instant)>>,
}

impl MemoryNonceCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl NonceCache for MemoryNonceCache {
    fn put(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        let mut rows = self
            .rows
            .lock()
            .map_err(|_| StoreError::backend("nonce cache lock poisoned"))?;
        // Opportunistic sweep keeps abandoned flows from accumulating.
        let now = Instant::now();
        rows.retain(|_, (_, deadline)| *deadline > now);
        rows.insert(key.to_string(), (value.to_string(), now + ttl));
        Ok(())
    }

    fn take(&self, key: &str) -> StoreResult<Option<String>> {
        let mut rows = self
            .rows
            .lock()
            .map_err(|_| StoreError::backend("nonce cache lock poisoned"))?;
        match rows.remove(key) {
            Some((value, deadline)) if deadline > Instant::now() => Ok(Some(value)),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_is_one_shot() {
        let cache = MemoryNonceCache::new();
        cache
            .put("nonce-1", "verifier", Duration::from_secs(60))
            .unwrap();
        assert_eq!(cache.take("nonce-1").unwrap().as_deref(), Some("verifier"));
        assert_eq!(cache.take("nonce-1").unwrap(), None);
    }

    #[test]
    fn expired_entries_are_gone() {
        let cache = MemoryNonceCache::new();
        cache.put("nonce-1", "verifier", Duration::ZERO).unwrap();
        assert_eq!(cache.take("nonce-1").unwrap(), None);
    }

    #[test]
    fn unknown_key_is_none() {
        let cache = MemoryNonceCache::new();
        assert_eq!(cache.take("missing").unwrap(), None);
    }
}
