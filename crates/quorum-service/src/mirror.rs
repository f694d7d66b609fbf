//! Mirrors a scheduled meeting into respondents' external calendars.
//!
//! Every external write is paired with a conditional ledger write, so
//! the ledger never claims an event that does not exist and a concurrent
//! unschedule never strands one. When the ledger refuses a row, the
//! freshly created external event is deleted again.

use std::sync::Arc;

use thiserror::Error;
use tracing::warn;

use quorum_core::{EventPayload, Meeting, ScheduledSlot};
use quorum_providers::{ProviderAdapter, ProviderError, ProviderErrorCode};
use quorum_store::{EventLedger, LedgerEntry, StoreError};

#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("meeting is not scheduled")]
    NotScheduled,

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("storage error")]
    Store(#[source] StoreError),
}

impl From<StoreError> for MirrorError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

pub struct CalendarMirror {
    ledger: Arc<dyn EventLedger>,
}

impl CalendarMirror {
    pub fn new(ledger: Arc<dyn EventLedger>) -> Self {
        Self { ledger }
    }

    /// Creates or refreshes the external event mirroring `meeting` for
    /// one respondent. Idempotent: reuses the ledgered event when it
    /// still exists, recreates it when the provider lost it.
    pub async fn upsert(
        &self,
        adapter: &dyn ProviderAdapter,
        access_token: &str,
        meeting: &Meeting,
        respondent_id: i64,
        user_id: i64,
    ) -> Result<(), MirrorError> {
        let slot = meeting.scheduled.ok_or(MirrorError::NotScheduled)?;
        let payload = payload_for(meeting, slot);
        let provider = adapter.kind();

        match self.ledger.get(provider, meeting.id, respondent_id)? {
            Some(row) => {
                match adapter.update_event(access_token, &row.event_id, &payload).await {
                    Ok(()) => Ok(()),
                    // The user deleted the event out from under us.
                    Err(err) if err.code() == ProviderErrorCode::NotFound => {
                        let event_id = adapter.create_event(access_token, &payload).await?;
                        let entry = LedgerEntry {
                            provider,
                            meeting_id: meeting.id,
                            respondent_id,
                            user_id,
                            event_id: event_id.clone(),
                        };
                        if !self.ledger.update_if_scheduled(entry)? {
                            self.roll_back(adapter, access_token, &event_id).await;
                        }
                        Ok(())
                    }
                    Err(err) => Err(err.into()),
                }
            }
            None => {
                let event_id = adapter.create_event(access_token, &payload).await?;
                let entry = LedgerEntry {
                    provider,
                    meeting_id: meeting.id,
                    respondent_id,
                    user_id,
                    event_id: event_id.clone(),
                };
                if !self.ledger.insert_if_scheduled(entry)? {
                    self.roll_back(adapter, access_token, &event_id).await;
                }
                Ok(())
            }
        }
    }

    /// Deletes the mirrored event and retires its ledger row. An event
    /// already gone from the provider is fine.
    pub async fn remove(
        &self,
        adapter: &dyn ProviderAdapter,
        access_token: &str,
        meeting_id: i64,
        respondent_id: i64,
    ) -> Result<(), MirrorError> {
        let provider = adapter.kind();
        let Some(row) = self.ledger.get(provider, meeting_id, respondent_id)? else {
            return Ok(());
        };
        match adapter.delete_event(access_token, &row.event_id).await {
            Ok(()) => {}
            Err(err) if err.code() == ProviderErrorCode::NotFound => {}
            Err(err) => return Err(err.into()),
        }
        // Only retire the row we actually deleted; a concurrent upsert
        // may have replaced the event id.
        self.ledger
            .delete_matching(provider, meeting_id, respondent_id, &row.event_id)?;
        Ok(())
    }

    /// Best-effort deletion of an event whose ledger write was refused.
    async fn roll_back(&self, adapter: &dyn ProviderAdapter, access_token: &str, event_id: &str) {
        warn!(
            provider = %adapter.kind(),
            event_id,
            "meeting unscheduled during mirror write, deleting event"
        );
        if let Err(err) = adapter.delete_event(access_token, event_id).await {
            warn!(provider = %adapter.kind(), event_id, error = %err, "rollback delete failed");
        }
    }
}

fn payload_for(meeting: &Meeting, slot: ScheduledSlot) -> EventPayload {
    let description = if meeting.description.is_empty() {
        meeting.public_url.clone()
    } else {
        format!("{}\n\n{}", meeting.description, meeting.public_url)
    };
    EventPayload {
        summary: meeting.name.clone(),
        description,
        start: slot.start,
        end: slot.end,
    }
}
