//! ProviderAdapter trait definition.
//!
//! Adapters own the wire-level differences between providers: endpoint
//! shapes, token request bodies, delta paging. Callers see one trait and
//! never branch on the provider kind.

use std::future::Future;
use std::pin::Pin;

use quorum_core::{EventChange, EventPayload, ProviderKind, QueryWindow};

use crate::claims::IdClaims;
use crate::error::ProviderResult;

/// A boxed future for async trait methods, keeping the trait object-safe.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Everything needed to send the browser to a provider's consent page.
#[derive(Debug, Clone)]
pub struct AuthParams {
    /// The provider's authorization endpoint.
    pub endpoint: String,
    /// Query parameters, unencoded. The state parameter is appended by
    /// the caller.
    pub query: Vec<(&'static str, String)>,
    /// Server-side nonce minted for this flow, if the adapter stored
    /// flow state (such as a PKCE verifier) that the callback must
    /// recover.
    pub server_nonce: Option<String>,
}

impl AuthParams {
    /// Renders the full authorization URL with an extra `state` value.
    pub fn into_url(self, state: &str) -> String {
        let mut url = self.endpoint;
        let mut sep = '?';
        for (key, value) in &self.query {
            url.push(sep);
            url.push_str(key);
            url.push('=');
            url.push_str(&urlencoding::encode(value));
            sep = '&';
        }
        url.push(sep);
        url.push_str("state=");
        url.push_str(&urlencoding::encode(state));
        url
    }
}

/// Result of exchanging an authorization code.
#[derive(Debug, Clone)]
pub struct TokenGrant {
    pub access_token: String,
    /// Unix timestamp after which the access token is stale.
    pub expires_at: i64,
    /// Absent when the provider did not issue offline access.
    pub refresh_token: Option<String>,
    /// Space-separated scopes actually granted.
    pub scope: String,
    /// Identity claims decoded from the grant's ID token.
    pub claims: IdClaims,
}

impl TokenGrant {
    /// Returns true if `scope` was granted. Matching is token-wise, not
    /// substring.
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scope.split_whitespace().any(|s| s == scope)
    }

    /// Like [`has_scope`], but also accepts a granted scope whose trailing
    /// path segment matches. Providers are inconsistent about returning
    /// resource-qualified scope names.
    ///
    /// [`has_scope`]: TokenGrant::has_scope
    pub fn has_scope_lenient(&self, scope: &str) -> bool {
        let tail = scope.rsplit('/').next().unwrap_or(scope);
        self.scope
            .split_whitespace()
            .any(|s| s == scope || s.rsplit('/').next() == Some(tail))
    }
}

/// Result of a refresh-token grant.
#[derive(Debug, Clone)]
pub struct RefreshedTokens {
    pub access_token: String,
    pub expires_at: i64,
    /// Some providers rotate the refresh token on use.
    pub refresh_token: Option<String>,
}

/// One page of event changes from a provider listing.
#[derive(Debug, Clone, Default)]
pub struct EventPage {
    pub changes: Vec<EventChange>,
    /// Follow-up page reference, present while the listing is incomplete.
    pub next_page: Option<String>,
    /// Delta cursor for the next sync, present only on the final page.
    pub cursor: Option<String>,
}

/// The core abstraction for external calendar providers.
///
/// Implementations are `Send + Sync` and hold their HTTP client and
/// configuration internally. Methods take the access token explicitly;
/// adapters are stateless with respect to users.
pub trait ProviderAdapter: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Scopes this adapter requests, identity scopes included.
    fn scopes(&self) -> &[&'static str];

    /// The scope that unlocks calendar access. A grant without it is an
    /// identity-only login.
    fn calendar_scope(&self) -> &'static str;

    /// Builds the authorization parameters for a new flow.
    ///
    /// `force_consent` asks the provider to re-prompt even for an
    /// already-consented app, which is how a lost refresh token or a
    /// missing scope gets re-granted.
    fn auth_params(&self, force_consent: bool) -> ProviderResult<AuthParams>;

    /// Exchanges an authorization code for tokens and identity claims.
    ///
    /// `server_nonce` is the nonce from [`AuthParams::server_nonce`],
    /// round-tripped through the state parameter.
    fn exchange_code<'a>(
        &'a self,
        code: &'a str,
        server_nonce: Option<&'a str>,
    ) -> BoxFuture<'a, ProviderResult<TokenGrant>>;

    /// Obtains a fresh access token from a refresh token.
    fn refresh_tokens<'a>(
        &'a self,
        refresh_token: &'a str,
    ) -> BoxFuture<'a, ProviderResult<RefreshedTokens>>;

    /// Lists one page of events on the primary calendar.
    ///
    /// With a `cursor`, performs an incremental (delta) read and reports
    /// changes since that cursor; the window is then ignored by the
    /// provider. Without one, reads the full window. A rejected cursor
    /// fails with [`ProviderErrorCode::CursorExpired`].
    ///
    /// [`ProviderErrorCode::CursorExpired`]: crate::error::ProviderErrorCode::CursorExpired
    fn list_events<'a>(
        &'a self,
        access_token: &'a str,
        window: &'a QueryWindow,
        cursor: Option<&'a str>,
        page: Option<&'a str>,
    ) -> BoxFuture<'a, ProviderResult<EventPage>>;

    /// Creates an event on the primary calendar, returning its id.
    fn create_event<'a>(
        &'a self,
        access_token: &'a str,
        payload: &'a EventPayload,
    ) -> BoxFuture<'a, ProviderResult<String>>;

    /// Rewrites an existing event.
    fn update_event<'a>(
        &'a self,
        access_token: &'a str,
        event_id: &'a str,
        payload: &'a EventPayload,
    ) -> BoxFuture<'a, ProviderResult<()>>;

    /// Deletes an event. Fails with `NotFound` if it is already gone.
    fn delete_event<'a>(
        &'a self,
        access_token: &'a str,
        event_id: &'a str,
    ) -> BoxFuture<'a, ProviderResult<()>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::IdClaims;

    #[test]
    fn auth_params_url_encodes_values() {
        let params = AuthParams {
            endpoint: "https://auth.example.com/authorize".to_string(),
            query: vec![
                ("client_id", "my-client".to_string()),
                ("scope", "openid email profile".to_string()),
            ],
            server_nonce: None,
        };
        let url = params.into_url(r#"{"reason":"login"}"#);
        assert!(url.starts_with("https://auth.example.com/authorize?client_id=my-client"));
        assert!(url.contains("scope=openid%20email%20profile"));
        assert!(url.contains("state=%7B%22reason%22%3A%22login%22%7D"));
    }

    #[test]
    fn has_scope_matches_whole_tokens() {
        let grant = TokenGrant {
            access_token: "at".to_string(),
            expires_at: 0,
            refresh_token: None,
            scope: "openid https://www.googleapis.com/auth/calendar.events".to_string(),
            claims: IdClaims {
                subject: "sub".to_string(),
                email: None,
                name: None,
            },
        };
        assert!(grant.has_scope("openid"));
        assert!(grant.has_scope("https://www.googleapis.com/auth/calendar.events"));
        assert!(!grant.has_scope("openid https"));
        assert!(!grant.has_scope("email"));
    }

    #[test]
    fn lenient_matching_accepts_unqualified_scopes() {
        let grant = TokenGrant {
            access_token: "at".to_string(),
            expires_at: 0,
            refresh_token: None,
            scope: "openid Calendars.ReadWrite".to_string(),
            claims: IdClaims {
                subject: "sub".to_string(),
                email: None,
                name: None,
            },
        };
        assert!(grant.has_scope_lenient("https://graph.microsoft.com/Calendars.ReadWrite"));
        assert!(!grant.has_scope_lenient("https://graph.microsoft.com/Mail.Read"));
    }
}
