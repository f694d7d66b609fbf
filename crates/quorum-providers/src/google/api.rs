//! Google Calendar API response shapes.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use quorum_core::{CalendarEvent, EventChange, EventPayload};

use crate::adapter::EventPage;
use crate::error::{ProviderError, ProviderResult};

#[derive(Debug, Deserialize)]
pub(super) struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EventsResponse {
    #[serde(default)]
    items: Vec<RawEvent>,
    #[serde(default, rename = "nextPageToken")]
    next_page_token: Option<String>,
    #[serde(default, rename = "nextSyncToken")]
    next_sync_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    id: String,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    start: Option<RawTime>,
    #[serde(default)]
    end: Option<RawTime>,
}

#[derive(Debug, Deserialize)]
struct RawTime {
    #[serde(default, rename = "dateTime")]
    date_time: Option<String>,
    /// All-day events carry a date instead of a timestamp.
    #[serde(default)]
    date: Option<String>,
}

impl RawTime {
    fn to_utc(&self) -> Option<DateTime<Utc>> {
        if let Some(ref stamp) = self.date_time {
            return DateTime::parse_from_rfc3339(stamp)
                .ok()
                .map(|dt| dt.with_timezone(&Utc));
        }
        let date: NaiveDate = self.date.as_deref()?.parse().ok()?;
        Some(date.and_hms_opt(0, 0, 0)?.and_utc())
    }
}

/// Parses a primary-calendar events listing into an event page.
///
/// Cancelled items become removals, which is how incremental listings
/// report deleted events.
pub(super) fn parse_events_page(body: &str) -> ProviderResult<EventPage> {
    let response: EventsResponse = serde_json::from_str(body).map_err(|e| {
        ProviderError::invalid_response("invalid events response")
            .with_provider(super::PROVIDER)
            .with_source(e)
    })?;

    let mut changes = Vec::with_capacity(response.items.len());
    for item in response.items {
        if item.status.as_deref() == Some("cancelled") {
            changes.push(EventChange::Removed(item.id));
            continue;
        }
        let times = item
            .start
            .as_ref()
            .and_then(RawTime::to_utc)
            .zip(item.end.as_ref().and_then(RawTime::to_utc));
        match times {
            Some((start, end)) => changes.push(EventChange::Upsert(CalendarEvent::new(
                item.id,
                item.summary.unwrap_or_default(),
                start,
                end,
            ))),
            None => warn!(event_id = %item.id, "skipping event without usable times"),
        }
    }

    Ok(EventPage {
        changes,
        next_page: response.next_page_token,
        cursor: response.next_sync_token,
    })
}

#[derive(Debug, Deserialize)]
struct CreatedEvent {
    id: String,
}

pub(super) fn parse_created_event_id(body: &str) -> ProviderResult<String> {
    let created: CreatedEvent = serde_json::from_str(body).map_err(|e| {
        ProviderError::invalid_response("invalid created-event response")
            .with_provider(super::PROVIDER)
            .with_source(e)
    })?;
    Ok(created.id)
}

/// Renders the request body for event creates and updates.
pub(super) fn event_body(payload: &EventPayload) -> serde_json::Value {
    json!({
        "summary": payload.summary,
        "description": payload.description,
        "start": {
            "dateTime": payload.start.to_rfc3339(),
            "timeZone": "UTC",
        },
        "end": {
            "dateTime": payload.end.to_rfc3339(),
            "timeZone": "UTC",
        },
    })
}
