//! Provider credential storage.
//!
//! One credential per (provider, user). The provider subject is unique per
//! provider: two users can never hold the same external account.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use quorum_core::ProviderKind;

use crate::error::{StoreError, StoreResult};

/// A stored provider credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub provider: ProviderKind,
    pub user_id: i64,

    /// Stable account identifier issued by the provider.
    pub subject: String,

    pub access_token: String,

    /// Unix timestamp after which the access token is stale.
    pub expires_at: i64,

    pub refresh_token: String,

    /// Whether the user granted calendar scopes, not just identity.
    pub linked_calendar: bool,
}

/// Storage of provider credentials.
pub trait CredentialStore: Send + Sync {
    fn get(&self, provider: ProviderKind, user_id: i64) -> StoreResult<Option<Credential>>;

    /// Looks up the credential holding a provider subject, regardless of user.
    fn find_by_subject(
        &self,
        provider: ProviderKind,
        subject: &str,
    ) -> StoreResult<Option<Credential>>;

    /// Inserts a new credential.
    ///
    /// Fails with [`StoreError::DuplicateSubject`] if the subject is already
    /// held by another user on the same provider.
    fn insert(&self, credential: Credential) -> StoreResult<()>;

    /// Replaces the token fields after a refresh or re-grant. A `None`
    /// refresh token keeps the stored one.
    fn update_tokens(
        &self,
        provider: ProviderKind,
        user_id: i64,
        access_token: &str,
        expires_at: i64,
        refresh_token: Option<&str>,
    ) -> StoreResult<()>;

    fn set_linked_calendar(
        &self,
        provider: ProviderKind,
        user_id: i64,
        linked: bool,
    ) -> StoreResult<()>;

    fn delete(&self, provider: ProviderKind, user_id: i64) -> StoreResult<()>;
}

/// In-memory credential store.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    rows: Mutex<HashMap<(ProviderKind, i64), Credential>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StoreResult<std::sync::MutexGuard<'_, HashMap<(ProviderKind, i64), Credential>>> {
        self.rows
            .lock()
            .map_err(|_| StoreError::backend("credential store lock poisoned"))
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self, provider: ProviderKind, user_id: i64) -> StoreResult<Option<Credential>> {
        Ok(self.lock()?.get(&(provider, user_id)).cloned())
    }

    fn find_by_subject(
        &self,
        provider: ProviderKind,
        subject: &str,
    ) -> StoreResult<Option<Credential>> {
        Ok(self
            .lock()?
            .values()
            .find(|c| c.provider == provider && c.subject == subject)
            .cloned())
    }

    fn insert(&self, credential: Credential) -> StoreResult<()> {
        let mut rows = self.lock()?;
        let taken = rows.values().any(|c| {
            c.provider == credential.provider
                && c.subject == credential.subject
                && c.user_id != credential.user_id
        });
        if taken {
            return Err(StoreError::DuplicateSubject);
        }
        rows.insert((credential.provider, credential.user_id), credential);
        Ok(())
    }

    fn update_tokens(
        &self,
        provider: ProviderKind,
        user_id: i64,
        access_token: &str,
        expires_at: i64,
        refresh_token: Option<&str>,
    ) -> StoreResult<()> {
        let mut rows = self.lock()?;
        let row = rows
            .get_mut(&(provider, user_id))
            .ok_or(StoreError::NotFound)?;
        row.access_token = access_token.to_string();
        row.expires_at = expires_at;
        if let Some(refresh) = refresh_token {
            row.refresh_token = refresh.to_string();
        }
        Ok(())
    }

    fn set_linked_calendar(
        &self,
        provider: ProviderKind,
        user_id: i64,
        linked: bool,
    ) -> StoreResult<()> {
        let mut rows = self.lock()?;
        let row = rows
            .get_mut(&(provider, user_id))
            .ok_or(StoreError::NotFound)?;
        row.linked_calendar = linked;
        Ok(())
    }

    fn delete(&self, provider: ProviderKind, user_id: i64) -> StoreResult<()> {
        let mut rows = self.lock()?;
        rows.remove(&(provider, user_id)).ok_or(StoreError::NotFound)?;
        Ok(())
    }
}
