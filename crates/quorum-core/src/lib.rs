//! Core types: provider kinds, canonical events, query windows, OAuth state

pub mod event;
pub mod meeting;
pub mod provider;
pub mod state;
pub mod tracing;
pub mod window;

pub use event::{CalendarEvent, EventChange, EventPayload, sort_by_start};
pub use meeting::{Meeting, Respondent, ScheduledSlot, User};
pub use provider::ProviderKind;
pub use state::{AuthReason, AuthState, StateError};
pub use tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
pub use window::{QueryWindow, WindowError};
