//! Microsoft Graph API response shapes.

use chrono::{DateTime, NaiveDateTime, Utc};
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
struct DeltaResponse {
    #[serde(default)]
    value: Vec<RawEvent>,
    #[serde(default, rename = "@odata.nextLink")]
    next_link: Option<String>,
    #[serde(default, rename = "@odata.deltaLink")]
    delta_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    id: String,
    #[serde(default)]
    subject: Option<String>,
    #[serde(default)]
    start: Option<RawTime>,
    #[serde(default)]
    end: Option<RawTime>,
    /// Present on deleted items in delta listings.
    #[serde(default, rename = "@removed")]
    removed: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RawTime {
    #[serde(rename = "dateTime")]
    date_time: String,
}

impl RawTime {
    /// Graph timestamps come back in UTC (forced by the Prefer header)
    /// but without a trailing `Z` and with seven fractional digits.
    fn to_utc(&self) -> Option<DateTime<Utc>> {
        let trimmed = self.date_time.trim_end_matches('Z');
        NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| naive.and_utc())
    }
}

/// Parses one page of a `calendarView/delta` listing.
pub(super) fn parse_delta_page(body: &str) -> ProviderResult<EventPage> {
    let response: DeltaResponse = serde_json::from_str(body).map_err(|e| {
        ProviderError::invalid_response("invalid delta response")
            .with_provider(super::PROVIDER)
            .with_source(e)
    })?;

    let mut changes = Vec::with_capacity(response.value.len());
    for item in response.value {
        if item.removed.is_some() {
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
                item.subject.unwrap_or_default(),
                start,
                end,
            ))),
            None => warn!(event_id = %item.id, "skipping event without usable times"),
        }
    }

    Ok(EventPage {
        changes,
        next_page: response.next_link,
        cursor: response.delta_link,
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
        "subject": payload.summary,
        "body": {
            "contentType": "text",
            "content": payload.description,
        },
        "start": {
            "dateTime": payload.start.format("%Y-%m-%dT%H:%M:%S").to_string(),
            "timeZone": "UTC",
        },
        "end": {
            "dateTime": payload.end.format("%Y-%m-%dT%H:%M:%S").to_string(),
            "timeZone": "UTC",
        },
    })
}
