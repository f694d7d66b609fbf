//! Pushes a meeting's scheduled slot out to every linked respondent.
//!
//! Each (provider, respondent) pair is mirrored independently: one
//! expired account or flaky provider never blocks the others. Failures
//! are logged and counted, not propagated.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use futures_util::future::join_all;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use quorum_core::Meeting;
use quorum_providers::ProviderAdapter;
use quorum_store::CredentialStore;

use crate::mirror::{CalendarMirror, MirrorError};
use crate::oauth::OAuthService;

/// Tally of one fanout run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FanoutReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
}

struct Unit {
    adapter: Arc<dyn ProviderAdapter>,
    respondent_id: i64,
    user_id: i64,
}

pub struct Fanout {
    oauth: Arc<OAuthService>,
    mirror: Arc<CalendarMirror>,
    credentials: Arc<dyn CredentialStore>,
}

impl Fanout {
    pub fn new(
        oauth: Arc<OAuthService>,
        mirror: Arc<CalendarMirror>,
        credentials: Arc<dyn CredentialStore>,
    ) -> Self {
        Self {
            oauth,
            mirror,
            credentials,
        }
    }

    /// Mirrors the meeting's scheduled slot into every linked
    /// respondent's calendar.
    pub async fn propagate(&self, meeting: &Meeting) -> FanoutReport {
        if meeting.scheduled.is_none() {
            debug!(meeting_id = meeting.id, "meeting not scheduled, nothing to propagate");
            return FanoutReport::default();
        }
        let (units, mut report) = self.units(meeting);
        report.attempted += units.len();

        let outcomes = join_all(units.iter().map(|unit| async {
            let token = match self.token_for(unit, meeting.id).await {
                Some(token) => token,
                None => return false,
            };
            match self
                .mirror
                .upsert(
                    unit.adapter.as_ref(),
                    &token,
                    meeting,
                    unit.respondent_id,
                    unit.user_id,
                )
                .await
            {
                Ok(()) => true,
                Err(err) => {
                    warn!(
                        provider = %unit.adapter.kind(),
                        meeting_id = meeting.id,
                        respondent_id = unit.respondent_id,
                        error = %err,
                        "failed to mirror scheduled slot"
                    );
                    self.drop_if_revoked(unit, &err);
                    false
                }
            }
        }))
        .await;

        tally(&mut report, &outcomes);
        info!(
            meeting_id = meeting.id,
            succeeded = report.succeeded,
            failed = report.failed,
            "propagated scheduled slot"
        );
        report
    }

    /// Removes the mirrored events after a meeting is unscheduled or
    /// deleted.
    pub async fn retract(&self, meeting: &Meeting) -> FanoutReport {
        let (units, mut report) = self.units(meeting);
        report.attempted += units.len();

        let outcomes = join_all(units.iter().map(|unit| async {
            let token = match self.token_for(unit, meeting.id).await {
                Some(token) => token,
                None => return false,
            };
            match self
                .mirror
                .remove(unit.adapter.as_ref(), &token, meeting.id, unit.respondent_id)
                .await
            {
                Ok(()) => true,
                Err(err) => {
                    warn!(
                        provider = %unit.adapter.kind(),
                        meeting_id = meeting.id,
                        respondent_id = unit.respondent_id,
                        error = %err,
                        "failed to retract mirrored event"
                    );
                    self.drop_if_revoked(unit, &err);
                    false
                }
            }
        }))
        .await;

        tally(&mut report, &outcomes);
        info!(
            meeting_id = meeting.id,
            succeeded = report.succeeded,
            failed = report.failed,
            "retracted mirrored events"
        );
        report
    }

    /// A revoked grant surfacing on a calendar call dooms every later
    /// call too; drop the credential so the next fanout skips the user.
    fn drop_if_revoked(&self, unit: &Unit, err: &MirrorError) {
        let MirrorError::Provider(provider_err) = err else {
            return;
        };
        if !provider_err.is_credential_revoked() {
            return;
        }
        let kind = unit.adapter.kind();
        warn!(provider = %kind, user_id = unit.user_id, "credential revoked, unlinking");
        if let Err(err) = self.oauth.unlink(kind, unit.user_id) {
            warn!(provider = %kind, user_id = unit.user_id, error = %err, "unlink failed");
        }
    }

    async fn token_for(&self, unit: &Unit, meeting_id: i64) -> Option<String> {
        match self
            .oauth
            .access_token(unit.adapter.kind(), unit.user_id)
            .await
        {
            Ok(token) => Some(token),
            Err(err) => {
                warn!(
                    provider = %unit.adapter.kind(),
                    meeting_id,
                    user_id = unit.user_id,
                    error = %err,
                    "no usable access token for respondent"
                );
                None
            }
        }
    }

    /// One unit per (provider, respondent) pair whose account holds a
    /// calendar-linked credential. Guests and identity-only accounts
    /// are skipped silently.
    fn units(&self, meeting: &Meeting) -> (Vec<Unit>, FanoutReport) {
        let mut units = Vec::new();
        let mut report = FanoutReport::default();
        for adapter in self.oauth.adapters() {
            let kind = adapter.kind();
            for respondent in &meeting.respondents {
                let Some(user_id) = respondent.user_id else {
                    continue;
                };
                match self.credentials.get(kind, user_id) {
                    Ok(Some(credential)) if credential.linked_calendar => units.push(Unit {
                        adapter: adapter.clone(),
                        respondent_id: respondent.id,
                        user_id,
                    }),
                    Ok(_) => {}
                    Err(err) => {
                        warn!(provider = %kind, user_id, error = %err, "credential lookup failed");
                        report.attempted += 1;
                        report.failed += 1;
                    }
                }
            }
        }
        (units, report)
    }
}

fn tally(report: &mut FanoutReport, outcomes: &[bool]) {
    for ok in outcomes {
        if *ok {
            report.succeeded += 1;
        } else {
            report.failed += 1;
        }
    }
}

/// Fire-and-forget fanout runs, tracked so shutdown can wait for them.
#[derive(Default)]
pub struct DetachedTasks {
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl DetachedTasks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
        handles.retain(|handle| !handle.is_finished());
        handles.push(tokio::spawn(future));
    }

    /// Waits for every outstanding task. Called on shutdown so mirrored
    /// calendars are not left half-updated.
    pub async fn drain(&self) {
        let handles: Vec<JoinHandle<()>> = {
            let mut guard = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
            guard.drain(..).collect()
        };
        for handle in handles {
            if let Err(err) = handle.await {
                warn!(error = %err, "detached task failed");
            }
        }
    }
}
