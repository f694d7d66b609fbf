//! OAuth identity flows: signup, login, link, and token upkeep.
//!
//! The callback handler resolves an exchanged grant against the stored
//! credentials and users:
//!
//! - provider subject already linked: log that user in
//! - email matches an existing account: defer behind an explicit
//!   confirmation, tokens sealed into an opaque blob
//! - nothing matches: provision a new account
//! - grant unusable for offline access: send the browser back with a
//!   forced consent prompt
//!
//! Access tokens are refreshed on demand; a revoked grant drops the
//! credential and everything derived from it.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use quorum_core::{AuthReason, AuthState, ProviderKind, User};
use quorum_providers::{ProviderAdapter, TokenGrant};
use quorum_store::{
    Credential, CredentialStore, EventLedger, NewUser, StoreError, SyncCacheStore, UserDirectory,
};

use crate::error::FlowError;
use crate::seal::{SealedCredential, Sealer};

/// Tokens expiring within this margin are refreshed before use.
const REFRESH_MARGIN_SECS: i64 = 60;

/// A grant awaiting explicit link confirmation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingCredential {
    pub provider: ProviderKind,
    pub subject: String,
    pub access_token: String,
    pub expires_at: i64,
    pub refresh_token: String,
    pub linked_calendar: bool,
}

/// How a callback resolved.
#[derive(Debug)]
pub enum Resolution {
    /// The provider subject was already linked; the holder is logged in.
    LoggedIn { user: User },
    /// A fresh account was provisioned from the grant's claims.
    SignedUp { user: User },
    /// The grant's email matches an existing account; linking waits for
    /// that account's explicit confirmation.
    ConfirmLink {
        user: User,
        pending: SealedCredential,
    },
    /// A link flow completed for the requesting user.
    Linked { user: User },
    /// The grant cannot be stored (no refresh token); the browser must
    /// repeat the flow with consent forced.
    ReconsentRequired { url: String },
}

/// A resolved callback plus the request context carried by the state.
#[derive(Debug)]
pub struct CallbackOutcome {
    pub resolution: Resolution,
    pub post_redirect: String,
    pub client_nonce: Option<String>,
}

pub struct OAuthService {
    adapters: Vec<Arc<dyn ProviderAdapter>>,
    credentials: Arc<dyn CredentialStore>,
    users: Arc<dyn UserDirectory>,
    cache: Arc<dyn SyncCacheStore>,
    ledger: Arc<dyn EventLedger>,
    sealer: Sealer,
}

impl OAuthService {
    pub fn new(
        adapters: Vec<Arc<dyn ProviderAdapter>>,
        credentials: Arc<dyn CredentialStore>,
        users: Arc<dyn UserDirectory>,
        cache: Arc<dyn SyncCacheStore>,
        ledger: Arc<dyn EventLedger>,
        sealer: Sealer,
    ) -> Self {
        Self {
            adapters,
            credentials,
            users,
            cache,
            ledger,
            sealer,
        }
    }

    pub fn adapters(&self) -> &[Arc<dyn ProviderAdapter>] {
        &self.adapters
    }

    fn adapter(&self, kind: ProviderKind) -> Result<&Arc<dyn ProviderAdapter>, FlowError> {
        self.adapters
            .iter()
            .find(|a| a.kind() == kind)
            .ok_or(FlowError::ProviderNotConfigured(kind))
    }

    /// Builds the authorization URL that starts a flow.
    pub fn authorization_url(
        &self,
        kind: ProviderKind,
        mut state: AuthState,
        force_consent: bool,
    ) -> Result<String, FlowError> {
        let adapter = self.adapter(kind)?;
        let params = adapter.auth_params(force_consent)?;
        state.server_nonce = params.server_nonce.clone();
        Ok(params.into_url(&state.encode()))
    }

    /// Resolves a provider callback.
    pub async fn handle_callback(
        &self,
        kind: ProviderKind,
        code: &str,
        raw_state: &str,
    ) -> Result<CallbackOutcome, FlowError> {
        let state = AuthState::decode(raw_state)?;
        let adapter = self.adapter(kind)?.clone();

        let grant = adapter
            .exchange_code(code, state.server_nonce.as_deref())
            .await?;
        if grant.claims.subject.is_empty() {
            return Err(FlowError::MissingRequiredClaims);
        }

        let resolution = match state.reason {
            AuthReason::Link => self.resolve_link(adapter.as_ref(), kind, &state, &grant)?,
            AuthReason::Login | AuthReason::Signup => {
                self.resolve_identity(adapter.as_ref(), kind, &state, &grant)?
            }
        };

        Ok(CallbackOutcome {
            resolution,
            post_redirect: state.post_redirect,
            client_nonce: state.client_nonce,
        })
    }

    fn resolve_link(
        &self,
        adapter: &dyn ProviderAdapter,
        kind: ProviderKind,
        state: &AuthState,
        grant: &TokenGrant,
    ) -> Result<Resolution, FlowError> {
        let user_id = state.link_user.ok_or(FlowError::NotFound)?;
        let user = self.users.get(user_id)?.ok_or(FlowError::NotFound)?;

        // A link is explicitly about calendar access; a grant without it
        // means the user unticked the scope.
        if !grant.has_scope_lenient(adapter.calendar_scope()) {
            return Err(FlowError::NotAllScopesGranted);
        }
        let Some(refresh_token) = grant.refresh_token.clone() else {
            return Ok(Resolution::ReconsentRequired {
                url: self.reconsent_url(adapter, state)?,
            });
        };

        if let Some(existing) = self
            .credentials
            .find_by_subject(kind, &grant.claims.subject)?
        {
            if existing.user_id != user.id {
                return Err(FlowError::AccountAlreadyLinked);
            }
        }

        self.credentials.insert(Credential {
            provider: kind,
            user_id: user.id,
            subject: grant.claims.subject.clone(),
            access_token: grant.access_token.clone(),
            expires_at: grant.expires_at,
            refresh_token,
            linked_calendar: true,
        })?;

        info!(provider = %kind, user_id = user.id, "calendar account linked");
        Ok(Resolution::Linked { user })
    }

    fn resolve_identity(
        &self,
        adapter: &dyn ProviderAdapter,
        kind: ProviderKind,
        state: &AuthState,
        grant: &TokenGrant,
    ) -> Result<Resolution, FlowError> {
        let linked_calendar = grant.has_scope_lenient(adapter.calendar_scope());
        let subject = grant.claims.subject.clone();

        // Known subject: a plain login, with a token top-up.
        if let Some(existing) = self.credentials.find_by_subject(kind, &subject)? {
            self.credentials.update_tokens(
                kind,
                existing.user_id,
                &grant.access_token,
                grant.expires_at,
                grant.refresh_token.as_deref(),
            )?;
            if linked_calendar && !existing.linked_calendar {
                self.credentials
                    .set_linked_calendar(kind, existing.user_id, true)?;
            }
            let user = self
                .users
                .get(existing.user_id)?
                .ok_or(FlowError::NotFound)?;
            return Ok(Resolution::LoggedIn { user });
        }

        // A new credential needs offline access to be worth storing.
        let Some(refresh_token) = grant.refresh_token.clone() else {
            return Ok(Resolution::ReconsentRequired {
                url: self.reconsent_url(adapter, state)?,
            });
        };
        let email = grant
            .claims
            .email
            .clone()
            .ok_or(FlowError::MissingRequiredClaims)?;

        // Same email, different provider account: an existing session
        // could be hijacked by a forged provider account, so the link
        // only happens after the account holder confirms.
        if let Some(user) = self.users.find_by_email(&email)? {
            let pending = PendingCredential {
                provider: kind,
                subject,
                access_token: grant.access_token.clone(),
                expires_at: grant.expires_at,
                refresh_token,
                linked_calendar,
            };
            let sealed = self.sealer.seal(&pending)?;
            return Ok(Resolution::ConfirmLink {
                user,
                pending: sealed,
            });
        }

        // Nothing matches: provision an account. The provider claims are
        // the only source of a display name.
        let name = grant
            .claims
            .name
            .clone()
            .ok_or(FlowError::MissingRequiredClaims)?;
        let user = self.users.create(NewUser { name, email })?;
        let inserted = self.credentials.insert(Credential {
            provider: kind,
            user_id: user.id,
            subject,
            access_token: grant.access_token.clone(),
            expires_at: grant.expires_at,
            refresh_token,
            linked_calendar,
        });
        if let Err(err) = inserted {
            // Undo the half-finished signup; the subject won the race
            // somewhere else.
            if let Err(cleanup) = self.users.delete(user.id) {
                warn!(user_id = user.id, error = %cleanup, "failed to undo signup");
            }
            return Err(err.into());
        }

        info!(provider = %kind, user_id = user.id, "account provisioned from provider signup");
        Ok(Resolution::SignedUp { user })
    }

    fn reconsent_url(
        &self,
        adapter: &dyn ProviderAdapter,
        state: &AuthState,
    ) -> Result<String, FlowError> {
        let params = adapter.auth_params(true)?;
        let mut state = state.clone();
        state.server_nonce = params.server_nonce.clone();
        Ok(params.into_url(&state.encode()))
    }

    /// Completes a deferred link after the account holder confirmed it.
    pub fn confirm_link(
        &self,
        user_id: i64,
        sealed: &SealedCredential,
    ) -> Result<User, FlowError> {
        let pending: PendingCredential = self.sealer.open(sealed)?;
        let user = self.users.get(user_id)?.ok_or(FlowError::NotFound)?;

        if let Some(existing) = self
            .credentials
            .find_by_subject(pending.provider, &pending.subject)?
        {
            if existing.user_id != user.id {
                return Err(FlowError::AccountAlreadyLinked);
            }
        }

        self.credentials.insert(Credential {
            provider: pending.provider,
            user_id: user.id,
            subject: pending.subject,
            access_token: pending.access_token,
            expires_at: pending.expires_at,
            refresh_token: pending.refresh_token,
            linked_calendar: pending.linked_calendar,
        })?;
        info!(provider = %pending.provider, user_id = user.id, "confirmed provider link");
        Ok(user)
    }

    /// Returns a usable access token for the user, refreshing if the
    /// stored one is stale. A revoked grant purges the credential and
    /// everything derived from it.
    pub async fn access_token(
        &self,
        kind: ProviderKind,
        user_id: i64,
    ) -> Result<String, FlowError> {
        let adapter = self.adapter(kind)?.clone();
        let credential = self
            .credentials
            .get(kind, user_id)?
            .ok_or(FlowError::NotFound)?;

        let now = Utc::now().timestamp();
        if credential.expires_at > now + REFRESH_MARGIN_SECS {
            return Ok(credential.access_token);
        }

        match adapter.refresh_tokens(&credential.refresh_token).await {
            Ok(fresh) => {
                self.credentials.update_tokens(
                    kind,
                    user_id,
                    &fresh.access_token,
                    fresh.expires_at,
                    fresh.refresh_token.as_deref(),
                )?;
                Ok(fresh.access_token)
            }
            Err(err) if err.is_credential_revoked() => {
                warn!(provider = %kind, user_id, "refresh grant revoked, dropping credential");
                self.purge(kind, user_id)?;
                Err(err.into())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Detaches a provider account: credential, cached syncs, and
    /// created-event rows all go.
    pub fn unlink(&self, kind: ProviderKind, user_id: i64) -> Result<(), FlowError> {
        self.purge(kind, user_id)
    }

    fn purge(&self, kind: ProviderKind, user_id: i64) -> Result<(), FlowError> {
        match self.credentials.delete(kind, user_id) {
            Ok(()) | Err(StoreError::NotFound) => {}
            Err(err) => return Err(err.into()),
        }
        self.cache.delete_for_user(kind, user_id)?;
        self.ledger.delete_for_user(kind, user_id)?;
        Ok(())
    }
}
