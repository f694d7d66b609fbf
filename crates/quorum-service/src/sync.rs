//! Delta-aware event sync against provider calendars.
//!
//! A stored cursor is only trusted when the cached entry's query window
//! equals the window computed for the meeting right now; any edit to the
//! meeting's dates, hours, or timezone changes the window and forces a
//! full resync. A cursor the provider rejects does the same.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use quorum_core::{
    CalendarEvent, EventChange, Meeting, ProviderKind, QueryWindow, WindowError, sort_by_start,
};
use quorum_providers::{EventPage, ProviderAdapter, ProviderError, ProviderErrorCode};
use quorum_store::{EventLedger, StoreError, SyncCacheEntry, SyncCacheStore, SyncKey};

/// Upper bound on pages per listing, against a provider that never
/// stops returning next-page references.
const MAX_PAGES: usize = 25;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Window(#[from] WindowError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("storage error")]
    Store(#[source] StoreError),
}

impl From<StoreError> for SyncError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

/// Reads a user's external events for a meeting, incrementally when the
/// provider cursor still applies.
pub struct SyncEngine {
    cache: Arc<dyn SyncCacheStore>,
    ledger: Arc<dyn EventLedger>,
}

impl SyncEngine {
    pub fn new(cache: Arc<dyn SyncCacheStore>, ledger: Arc<dyn EventLedger>) -> Self {
        Self { cache, ledger }
    }

    /// Returns the user's current events inside the meeting's query
    /// window, freshly reconciled with the provider.
    ///
    /// The event this system itself created for the user's respondent,
    /// if any, must not count as a conflict; it is filtered from the
    /// result but kept in the cache.
    pub async fn meeting_events(
        &self,
        adapter: &dyn ProviderAdapter,
        access_token: &str,
        user_id: i64,
        meeting: &Meeting,
    ) -> Result<Vec<CalendarEvent>, SyncError> {
        let window = QueryWindow::for_meeting(meeting)?;
        let own_event_id = self.own_event_id(adapter.kind(), user_id, meeting)?;
        let key = SyncKey {
            provider: adapter.kind(),
            user_id,
            meeting_id: meeting.id,
        };

        // A cached entry for a different window is useless: its events
        // cover the wrong range and its cursor was issued for it.
        let cached = self.cache.get(key)?.filter(|entry| entry.window == window);
        let cursor = cached.as_ref().and_then(|entry| entry.cursor.clone());

        let (changes, new_cursor, incremental) = match cursor.as_deref() {
            Some(token) => match self.collect(adapter, access_token, &window, Some(token)).await {
                Ok((changes, next)) => (changes, next, true),
                Err(err) if err.code() == ProviderErrorCode::CursorExpired => {
                    debug!(
                        provider = %adapter.kind(),
                        meeting_id = meeting.id,
                        "cursor rejected, running full sync"
                    );
                    let (changes, next) =
                        self.collect(adapter, access_token, &window, None).await?;
                    (changes, next, false)
                }
                Err(err) => return Err(err.into()),
            },
            None => {
                let (changes, next) = self.collect(adapter, access_token, &window, None).await?;
                (changes, next, false)
            }
        };

        // A quiet incremental sync leaves the entry untouched, cursor
        // included, so repeated polls never rewrite storage.
        if incremental && changes.is_empty() {
            if let Some(entry) = &cached {
                return Ok(filter_own(entry.events.clone(), own_event_id.as_deref()));
            }
        }

        let mut merged: BTreeMap<String, CalendarEvent> = if incremental {
            cached
                .map(|entry| {
                    entry
                        .events
                        .into_iter()
                        .map(|event| (event.id.clone(), event))
                        .collect()
                })
                .unwrap_or_default()
        } else {
            BTreeMap::new()
        };
        // Removals win over re-listings of the same id later in the
        // batch; a cancelled event must not resurface.
        let removed: BTreeSet<&str> = changes
            .iter()
            .filter_map(|change| match change {
                EventChange::Removed(id) => Some(id.as_str()),
                EventChange::Upsert(_) => None,
            })
            .collect();
        for change in &changes {
            if let EventChange::Upsert(event) = change {
                if !removed.contains(event.id.as_str()) {
                    merged.insert(event.id.clone(), event.clone());
                }
            }
        }
        for id in removed {
            merged.remove(id);
        }

        let mut events: Vec<CalendarEvent> = merged.into_values().collect();
        sort_by_start(&mut events);

        self.cache.save(
            key,
            SyncCacheEntry {
                events: events.clone(),
                window,
                cursor: new_cursor.or(cursor),
            },
        )?;

        Ok(filter_own(events, own_event_id.as_deref()))
    }

    /// Looks up the mirrored event this system created for the user's
    /// respondent on this meeting, if any.
    fn own_event_id(
        &self,
        provider: ProviderKind,
        user_id: i64,
        meeting: &Meeting,
    ) -> Result<Option<String>, SyncError> {
        let Some(respondent) = meeting
            .respondents
            .iter()
            .find(|r| r.user_id == Some(user_id))
        else {
            return Ok(None);
        };
        Ok(self
            .ledger
            .get(provider, meeting.id, respondent.id)?
            .map(|row| row.event_id))
    }

    async fn collect(
        &self,
        adapter: &dyn ProviderAdapter,
        access_token: &str,
        window: &QueryWindow,
        cursor: Option<&str>,
    ) -> Result<(Vec<EventChange>, Option<String>), ProviderError> {
        let mut changes = Vec::new();
        let mut page: Option<String> = None;
        for _ in 0..MAX_PAGES {
            let result: EventPage = adapter
                .list_events(access_token, window, cursor, page.as_deref())
                .await?;
            changes.extend(result.changes);
            match result.next_page {
                Some(next) => page = Some(next),
                None => return Ok((changes, result.cursor)),
            }
        }
        Err(ProviderError::internal("event listing exceeded page limit"))
    }
}

fn filter_own(events: Vec<CalendarEvent>, own_event_id: Option<&str>) -> Vec<CalendarEvent> {
    match own_event_id {
        Some(own) => events.into_iter().filter(|e| e.id != own).collect(),
        None => events,
    }
}
