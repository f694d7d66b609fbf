//! Canonical calendar event types.
//!
//! Every provider adapter maps its upstream representation (local time plus
//! IANA zone, absolute UTC, cancellation markers, paginated deltas) into
//! these shapes. Nothing above the adapter layer sees provider-specific
//! event JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A calendar event in canonical form: all timestamps UTC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    /// The provider-issued event identifier.
    pub id: String,
    /// Event title.
    pub summary: String,
    /// Start time, UTC.
    pub start: DateTime<Utc>,
    /// End time, UTC.
    pub end: DateTime<Utc>,
}

impl CalendarEvent {
    /// Creates a new canonical event.
    pub fn new(
        id: impl Into<String>,
        summary: impl Into<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            summary: summary.into(),
            start,
            end,
        }
    }
}

/// A single change reported by a sync page.
///
/// Deltas arrive as a stream of upserts and removals keyed by event id;
/// a full sync is just a stream of upserts against an empty map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventChange {
    /// The event was created or modified upstream.
    Upsert(CalendarEvent),
    /// The event was deleted or cancelled upstream.
    Removed(String),
}

impl EventChange {
    /// Returns the event id this change applies to.
    pub fn event_id(&self) -> &str {
        match self {
            Self::Upsert(event) => &event.id,
            Self::Removed(id) => id,
        }
    }
}

/// The body of an event mutation (create or update).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventPayload {
    /// Event title (the meeting name).
    pub summary: String,
    /// Event body: the meeting description followed by its public URL.
    pub description: String,
    /// Start time, UTC.
    pub start: DateTime<Utc>,
    /// End time, UTC.
    pub end: DateTime<Utc>,
}

/// Sorts events by start time ascending (ties broken by id for stability).
pub fn sort_by_start(events: &mut [CalendarEvent]) {
    events.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.id.cmp(&b.id)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, hour, 0, 0).unwrap()
    }

    #[test]
    fn change_exposes_event_id() {
        let upsert = EventChange::Upsert(CalendarEvent::new("a", "Standup", at(9), at(10)));
        let removed = EventChange::Removed("b".to_string());
        assert_eq!(upsert.event_id(), "a");
        assert_eq!(removed.event_id(), "b");
    }

    #[test]
    fn sort_orders_by_start_then_id() {
        let mut events = vec![
            CalendarEvent::new("z", "Later", at(11), at(12)),
            CalendarEvent::new("b", "Early", at(9), at(10)),
            CalendarEvent::new("a", "Early too", at(9), at(10)),
        ];
        sort_by_start(&mut events);
        let ids: Vec<_> = events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["a", "b", "z"]);
    }

    #[test]
    fn event_serde_round_trip() {
        let event = CalendarEvent::new("evt-1", "Planning", at(13), at(14));
        let json = serde_json::to_string(&event).unwrap();
        let back: CalendarEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
