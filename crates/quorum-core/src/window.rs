//! Query windows for provider calendar reads.
//!
//! A [`QueryWindow`] is the absolute UTC time range handed to a provider's
//! list/delta endpoint. Sync cursors are only valid relative to the window
//! they were issued for, so window equality is what decides whether a stored
//! cursor can be trusted: any change to a meeting's date range, hour bounds,
//! or timezone produces a different window and forces a full resync.

use chrono::{DateTime, Days, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::meeting::Meeting;

/// Errors computing a query window from a meeting.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WindowError {
    /// The meeting's timezone is not a recognized IANA name.
    #[error("unknown timezone: {0}")]
    UnknownTimezone(String),

    /// Hour bounds are out of range or inverted.
    #[error("invalid hour bounds: {no_earlier}..{no_later}")]
    InvalidHourBounds { no_earlier: u32, no_later: u32 },

    /// The date range is empty (from after to).
    #[error("empty date range: {from}..{to}")]
    EmptyDateRange { from: NaiveDate, to: NaiveDate },

    /// A local bound does not exist in the meeting's timezone (DST gap).
    #[error("local time does not exist in timezone {0}")]
    NonexistentLocalTime(String),
}

/// An absolute UTC time range for provider queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl QueryWindow {
    /// Creates a window from explicit UTC bounds.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Computes the window for a meeting.
    ///
    /// A scheduled meeting uses its scheduled slot. An unscheduled meeting
    /// uses its tentative date range bounded by the daily hour limits,
    /// interpreted in the meeting's timezone and converted to UTC.
    pub fn for_meeting(meeting: &Meeting) -> Result<Self, WindowError> {
        if let Some(slot) = meeting.scheduled {
            return Ok(Self::new(slot.start, slot.end));
        }

        if meeting.from_date > meeting.to_date {
            return Err(WindowError::EmptyDateRange {
                from: meeting.from_date,
                to: meeting.to_date,
            });
        }
        if meeting.no_earlier_hour >= meeting.no_later_hour || meeting.no_later_hour > 24 {
            return Err(WindowError::InvalidHourBounds {
                no_earlier: meeting.no_earlier_hour,
                no_later: meeting.no_later_hour,
            });
        }

        let tz: Tz = meeting
            .timezone
            .parse()
            .map_err(|_| WindowError::UnknownTimezone(meeting.timezone.clone()))?;

        let bounds_err = WindowError::InvalidHourBounds {
            no_earlier: meeting.no_earlier_hour,
            no_later: meeting.no_later_hour,
        };
        let start_local = meeting
            .from_date
            .and_hms_opt(meeting.no_earlier_hour, 0, 0)
            .ok_or_else(|| bounds_err.clone())?;

        // Hour 24 means end-of-day: midnight on the following date.
        let end_local = if meeting.no_later_hour == 24 {
            meeting
                .to_date
                .checked_add_days(Days::new(1))
                .ok_or(WindowError::EmptyDateRange {
                    from: meeting.from_date,
                    to: meeting.to_date,
                })?
                .and_hms_opt(0, 0, 0)
                .ok_or_else(|| bounds_err.clone())?
        } else {
            meeting
                .to_date
                .and_hms_opt(meeting.no_later_hour, 0, 0)
                .ok_or(bounds_err)?
        };

        // A DST spring-forward gap can swallow a bound; take the earliest
        // valid interpretation on ambiguity and reject nonexistent times.
        let start = tz
            .from_local_datetime(&start_local)
            .earliest()
            .ok_or_else(|| WindowError::NonexistentLocalTime(meeting.timezone.clone()))?
            .with_timezone(&Utc);
        let end = tz
            .from_local_datetime(&end_local)
            .earliest()
            .ok_or_else(|| WindowError::NonexistentLocalTime(meeting.timezone.clone()))?
            .with_timezone(&Utc);

        Ok(Self::new(start, end))
    }

    /// Returns true if the instant falls inside the window.
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant < self.end
    }
}
