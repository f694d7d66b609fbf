//! Calendar sync and identity flows.
//!
//! This crate ties the provider adapters to storage: the delta-aware
//! [`SyncEngine`], the created-event [`CalendarMirror`], schedule
//! [`Fanout`] across providers and respondents, and the [`OAuthService`]
//! that runs signup, login, and account-link flows.

pub mod error;
pub mod fanout;
pub mod mirror;
pub mod oauth;
pub mod seal;
pub mod sync;

#[cfg(test)]
pub(crate) mod testfake;

pub use error::FlowError;
pub use fanout::{DetachedTasks, Fanout, FanoutReport};
pub use mirror::{CalendarMirror, MirrorError};
pub use oauth::{CallbackOutcome, OAuthService, PendingCredential, Resolution};
pub use seal::{SealError, SealedCredential, Sealer};
pub use sync::{SyncEngine, SyncError};
