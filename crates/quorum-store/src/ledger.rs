//! Ledger of external calendar events this system created.
//!
//! One row per (provider, meeting, respondent). The conditional writes
//! only commit while the meeting is still scheduled and the respondent is
//! still on it, so a concurrent unschedule or respondent removal can never
//! leave a ledger row pointing at an event the
//! cleanup pass already missed. Callers that create an external event and
//! then fail the conditional write must delete the event themselves.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use quorum_core::ProviderKind;

use crate::directory::MeetingDirectory;
use crate::error::{StoreError, StoreResult};

/// A created external event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub provider: ProviderKind,
    pub meeting_id: i64,
    pub respondent_id: i64,

    /// Owner of the calendar the event was written to.
    pub user_id: i64,

    /// Provider-assigned event identifier.
    pub event_id: String,
}

/// Storage of created-event rows.
pub trait EventLedger: Send + Sync {
    fn get(
        &self,
        provider: ProviderKind,
        meeting_id: i64,
        respondent_id: i64,
    ) -> StoreResult<Option<LedgerEntry>>;

    /// Inserts the row if the meeting is still scheduled and the
    /// respondent is still on it. Returns whether the row was written.
    fn insert_if_scheduled(&self, entry: LedgerEntry) -> StoreResult<bool>;

    /// Replaces the row's event id if the meeting is still scheduled, the
    /// respondent is still on it, and the row exists. Returns whether the
    /// row was written.
    fn update_if_scheduled(&self, entry: LedgerEntry) -> StoreResult<bool>;

    /// Deletes the row only if it still points at `event_id`. Returns
    /// whether a row was deleted.
    fn delete_matching(
        &self,
        provider: ProviderKind,
        meeting_id: i64,
        respondent_id: i64,
        event_id: &str,
    ) -> StoreResult<bool>;

    /// Removes and returns every row a user holds on a provider.
    fn delete_for_user(
        &self,
        provider: ProviderKind,
        user_id: i64,
    ) -> StoreResult<Vec<LedgerEntry>>;
}

/// In-memory ledger.
///
/// The scheduled-and-respondent check happens under the same lock as the
/// write, so the conditional semantics hold against concurrent callers.
pub struct MemoryEventLedger {
    meetings: Arc<dyn MeetingDirectory>,
    rows: Mutex<HashMap<(ProviderKind, i64, i64), LedgerEntry>>,
}

impl MemoryEventLedger {
    pub fn new(meetings: Arc<dyn MeetingDirectory>) -> Self {
        Self {
            meetings,
            rows: Mutex::new(HashMap::new()),
        }
    }

    fn lock(
        &self,
    ) -> StoreResult<std::sync::MutexGuard<'_, HashMap<(ProviderKind, i64, i64), LedgerEntry>>>
    {
        self.rows
            .lock()
            .map_err(|_| StoreError::backend("event ledger lock poisoned"))
    }

    /// A conditional write commits only while the meeting is still
    /// scheduled and the respondent is still on it.
    fn accepts_write(&self, meeting_id: i64, respondent_id: i64) -> StoreResult<bool> {
        Ok(self.meetings.get(meeting_id)?.is_some_and(|m| {
            m.is_scheduled() && m.respondents.iter().any(|r| r.id == respondent_id)
        }))
    }
}

impl EventLedger for MemoryEventLedger {
    fn get(
        &self,
        provider: ProviderKind,
        meeting_id: i64,
        respondent_id: i64,
    ) -> StoreResult<Option<LedgerEntry>> {
        Ok(self
            .lock()?
            .get(&(provider, meeting_id, respondent_id))
            .cloned())
    }

    fn insert_if_scheduled(&self, entry: LedgerEntry) -> StoreResult<bool> {
        let mut rows = self.lock()?;
        if !self.accepts_write(entry.meeting_id, entry.respondent_id)? {
            return Ok(false);
        }
        rows.insert(
            (entry.provider, entry.meeting_id, entry.respondent_id),
            entry,
        );
        Ok(true)
    }

    fn update_if_scheduled(&self, entry: LedgerEntry) -> StoreResult<bool> {
        let mut rows = self.lock()?;
        if !self.accepts_write(entry.meeting_id, entry.respondent_id)? {
            return Ok(false);
        }
        let key = (entry.provider, entry.meeting_id, entry.respondent_id);
        if !rows.contains_key(&key) {
            return Ok(false);
        }
        rows.insert(key, entry);
        Ok(true)
    }

    fn delete_matching(
        &self,
        provider: ProviderKind,
        meeting_id: i64,
        respondent_id: i64,
        event_id: &str,
    ) -> StoreResult<bool> {
        let mut rows = self.lock()?;
        let key = (provider, meeting_id, respondent_id);
        match rows.get(&key) {
            Some(row) if row.event_id == event_id => {
                rows.remove(&key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn delete_for_user(
        &self,
        provider: ProviderKind,
        user_id: i64,
    ) -> StoreResult<Vec<LedgerEntry>> {
        let mut rows = self.lock()?;
        let keys: Vec<_> = rows
            .iter()
            .filter(|(_, row)| row.provider == provider && row.user_id == user_id)
            .map(|(key, _)| *key)
            .collect();
        let mut removed = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(row) = rows.remove(&key) {
                removed.push(row);
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::MemoryMeetingDirectory;
    use chrono::{NaiveDate, TimeZone, Utc};
    use quorum_core::{Meeting, Respondent, ScheduledSlot};

    fn meeting(id: i64, scheduled: bool) -> Meeting {
        Meeting {
            id,
            name: "Planning".to_string(),
            description: String::new(),
            public_url: format!("https://quorum.example/m/{id}"),
            timezone: "Europe/Paris".to_string(),
            from_date: NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
            to_date: NaiveDate::from_ymd_opt(2024, 6, 7).unwrap(),
            no_earlier_hour: 9,
            no_later_hour: 18,
            scheduled: scheduled.then(|| ScheduledSlot {
                start: Utc.with_ymd_and_hms(2024, 6, 4, 9, 0, 0).unwrap(),
                end: Utc.with_ymd_and_hms(2024, 6, 4, 10, 0, 0).unwrap(),
            }),
            respondents: vec![Respondent {
                id: 31,
                user_id: Some(4),
            }],
        }
    }

    fn ledger_with(meetings: Vec<Meeting>) -> MemoryEventLedger {
        let directory = MemoryMeetingDirectory::new();
        for m in meetings {
            directory.put(m);
        }
        MemoryEventLedger::new(Arc::new(directory))
    }

    fn entry(meeting_id: i64, event_id: &str) -> LedgerEntry {
        LedgerEntry {
            provider: ProviderKind::Google,
            meeting_id,
            respondent_id: 31,
            user_id: 4,
            event_id: event_id.to_string(),
        }
    }

    #[test]
    fn insert_commits_only_while_scheduled() {
        let ledger = ledger_with(vec![meeting(1, true), meeting(2, false)]);
        assert!(ledger.insert_if_scheduled(entry(1, "ev-1")).unwrap());
        assert!(!ledger.insert_if_scheduled(entry(2, "ev-2")).unwrap());
        assert!(ledger.get(ProviderKind::Google, 1, 31).unwrap().is_some());
        assert!(ledger.get(ProviderKind::Google, 2, 31).unwrap().is_none());
    }

    #[test]
    fn writes_are_refused_once_the_respondent_is_gone() {
        let mut dropped = meeting(3, true);
        dropped.respondents.clear();
        let ledger = ledger_with(vec![meeting(1, true), dropped]);
        ledger.insert_if_scheduled(entry(1, "ev-1")).unwrap();

        assert!(!ledger.insert_if_scheduled(entry(3, "ev-3")).unwrap());
        assert!(ledger.get(ProviderKind::Google, 3, 31).unwrap().is_none());

        let mut stranger = entry(1, "ev-9");
        stranger.respondent_id = 99;
        assert!(!ledger.insert_if_scheduled(stranger.clone()).unwrap());
        assert!(!ledger.update_if_scheduled(stranger).unwrap());
    }

    #[test]
    fn update_requires_existing_row() {
        let ledger = ledger_with(vec![meeting(1, true)]);
        assert!(!ledger.update_if_scheduled(entry(1, "ev-1")).unwrap());
        assert!(ledger.insert_if_scheduled(entry(1, "ev-1")).unwrap());
        assert!(ledger.update_if_scheduled(entry(1, "ev-2")).unwrap());
        let row = ledger.get(ProviderKind::Google, 1, 31).unwrap().unwrap();
        assert_eq!(row.event_id, "ev-2");
    }

    #[test]
    fn delete_matching_checks_event_id() {
        let ledger = ledger_with(vec![meeting(1, true)]);
        ledger.insert_if_scheduled(entry(1, "ev-1")).unwrap();
        assert!(!ledger
            .delete_matching(ProviderKind::Google, 1, 31, "ev-other")
            .unwrap());
        assert!(ledger
            .delete_matching(ProviderKind::Google, 1, 31, "ev-1")
            .unwrap());
        assert!(ledger.get(ProviderKind::Google, 1, 31).unwrap().is_none());
    }

    #[test]
    fn delete_for_user_returns_removed_rows() {
        let ledger = ledger_with(vec![meeting(1, true), meeting(2, true)]);
        ledger.insert_if_scheduled(entry(1, "ev-1")).unwrap();
        ledger.insert_if_scheduled(entry(2, "ev-2")).unwrap();
        let removed = ledger.delete_for_user(ProviderKind::Google, 4).unwrap();
        assert_eq!(removed.len(), 2);
        assert!(ledger.get(ProviderKind::Google, 1, 31).unwrap().is_none());
    }
}
