//! Read models for meetings, respondents, and users.
//!
//! The CRUD side of the application owns these entities; this subsystem only
//! consumes them through narrow read accessors, so the types here carry just
//! the fields the calendar-link logic needs.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// The slot a meeting was scheduled into, UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledSlot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// A respondent of a meeting. Guest respondents have no user id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Respondent {
    pub id: i64,
    pub user_id: Option<i64>,
}

/// A meeting as seen by the calendar-link subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meeting {
    pub id: i64,
    pub name: String,
    pub description: String,
    /// Public URL of the meeting's availability page.
    pub public_url: String,
    /// IANA timezone the tentative dates and hour bounds are expressed in.
    pub timezone: String,
    /// First tentative date, inclusive.
    pub from_date: NaiveDate,
    /// Last tentative date, inclusive.
    pub to_date: NaiveDate,
    /// Earliest hour of day considered, 0-23.
    pub no_earlier_hour: u32,
    /// Latest hour of day considered, 1-24.
    pub no_later_hour: u32,
    /// Set once the meeting has been scheduled into a concrete slot.
    pub scheduled: Option<ScheduledSlot>,
    pub respondents: Vec<Respondent>,
}

impl Meeting {
    /// Returns the respondent with the given id, if still present.
    pub fn respondent(&self, respondent_id: i64) -> Option<&Respondent> {
        self.respondents.iter().find(|r| r.id == respondent_id)
    }

    /// Returns true if the meeting is currently scheduled.
    pub fn is_scheduled(&self) -> bool {
        self.scheduled.is_some()
    }
}

/// A local user account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
}
