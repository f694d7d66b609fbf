//! Read access to meetings and users.
//!
//! The sync and identity layers only need a handful of lookups against
//! the application's main tables. These traits keep that surface narrow
//! instead of handing out the whole persistence layer.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicI64, Ordering};

use quorum_core::{Meeting, User};

use crate::error::{StoreError, StoreResult};

/// Read access to meetings.
pub trait MeetingDirectory: Send + Sync {
    fn get(&self, meeting_id: i64) -> StoreResult<Option<Meeting>>;
}

/// Fields for creating a user during provider signup.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
}

/// Lookup and signup access to users.
pub trait UserDirectory: Send + Sync {
    fn get(&self, user_id: i64) -> StoreResult<Option<User>>;

    fn find_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    fn create(&self, user: NewUser) -> StoreResult<User>;

    /// Removes a user. Compensation path for a signup whose credential
    /// insert failed.
    fn delete(&self, user_id: i64) -> StoreResult<()>;
}

/// In-memory meeting directory.
#[derive(Debug, Default)]
pub struct MemoryMeetingDirectory {
    rows: Mutex<HashMap<i64, Meeting>>,
}

impl MemoryMeetingDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a meeting. Test and fixture entry point.
    pub fn put(&self, meeting: Meeting) {
        if let Ok(mut rows) = self.rows.lock() {
            rows.insert(meeting.id, meeting);
        }
    }
}

impl MeetingDirectory for MemoryMeetingDirectory {
    fn get(&self, meeting_id: i64) -> StoreResult<Option<Meeting>> {
        let rows = self
            .rows
            .lock()
            .map_err(|_| StoreError::backend("meeting directory lock poisoned"))?;
        Ok(rows.get(&meeting_id).cloned())
    }
}

/// In-memory user directory.
#[derive(Debug, Default)]
pub struct MemoryUserDirectory {
    rows: Mutex<HashMap<i64, User>>,
    next_id: AtomicI64,
}

impl MemoryUserDirectory {
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(HashMap::new()),
            next_id: AtomicI64::new(1),
        }
    }

    pub fn put(&self, user: User) {
        // Keep generated ids ahead of fixture ids.
        self.next_id.fetch_max(user.id + 1, Ordering::SeqCst);
        if let Ok(mut rows) = self.rows.lock() {
            rows.insert(user.id, user);
        }
    }

    fn lock(&self) -> StoreResult<std::sync::MutexGuard<'_, HashMap<i64, User>>> {
        self.rows
            .lock()
            .map_err(|_| StoreError::backend("user directory lock poisoned"))
    }
}

impl UserDirectory for MemoryUserDirectory {
    fn get(&self, user_id: i64) -> StoreResult<Option<User>> {
        Ok(self.lock()?.get(&user_id).cloned())
    }

    fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self
            .lock()?
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    fn create(&self, user: NewUser) -> StoreResult<User> {
        let mut rows = self.lock()?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let user = User {
            id,
            name: user.name,
            email: user.email,
        };
        rows.insert(id, user.clone());
        Ok(user)
    }

    fn delete(&self, user_id: i64) -> StoreResult<()> {
        self.lock()?.remove(&user_id).ok_or(StoreError::NotFound)?;
        Ok(())
    }
}
