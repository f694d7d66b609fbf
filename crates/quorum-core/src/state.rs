//! OAuth authorization state carried through the redirect round-trip.
//!
//! The state parameter is an opaque JSON document the callback handler
//! decodes to recover why the flow was started and what to do afterwards.
//! Nonces ride along so the callback can reject replayed or forged states.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why an authorization flow was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthReason {
    /// A visitor with no account wants to sign up via the provider.
    Signup,
    /// An existing user wants to log in via the provider.
    Login,
    /// A logged-in user wants to link an additional provider account.
    Link,
}

/// Decoded contents of the OAuth state parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthState {
    pub reason: AuthReason,

    /// Where to send the browser once the callback completes.
    pub post_redirect: String,

    /// The user performing a link flow, absent for signup and login.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_user: Option<i64>,

    /// Nonce minted by the frontend, echoed back for CSRF checks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_nonce: Option<String>,

    /// Nonce minted server-side, keys server state such as a PKCE verifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_nonce: Option<String>,
}

/// Error decoding a state parameter.
#[derive(Debug, Error)]
#[error("malformed authorization state")]
pub struct StateError(#[source] pub serde_json::Error);

impl AuthState {
    pub fn new(reason: AuthReason, post_redirect: impl Into<String>) -> Self {
        Self {
            reason,
            post_redirect: post_redirect.into(),
            link_user: None,
            client_nonce: None,
            server_nonce: None,
        }
    }

    pub fn with_link_user(mut self, user_id: i64) -> Self {
        self.link_user = Some(user_id);
        self
    }

    pub fn with_client_nonce(mut self, nonce: impl Into<String>) -> Self {
        self.client_nonce = Some(nonce.into());
        self
    }

    pub fn with_server_nonce(mut self, nonce: impl Into<String>) -> Self {
        self.server_nonce = Some(nonce.into());
        self
    }

    /// Serializes the state for inclusion in an authorization URL.
    pub fn encode(&self) -> String {
        // The struct contains only JSON-representable fields.
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Parses a state parameter received on the callback.
    pub fn decode(raw: &str) -> Result<Self, StateError> {
        serde_json::from_str(raw).map_err(StateError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json() {
        let state = AuthState::new(AuthReason::Link, "/meetings/42")
            .with_link_user(7)
            .with_server_nonce("abc123");
        let decoded = AuthState::decode(&state.encode()).unwrap();
        assert_eq!(decoded, state);
    }

    #[test]
    fn optional_fields_are_omitted() {
        let encoded = AuthState::new(AuthReason::Login, "/").encode();
        assert!(!encoded.contains("link_user"));
        assert!(!encoded.contains("client_nonce"));
    }

    #[test]
    fn decode_tolerates_missing_optionals() {
        let decoded =
            AuthState::decode(r#"{"reason":"signup","post_redirect":"/welcome"}"#).unwrap();
        assert_eq!(decoded.reason, AuthReason::Signup);
        assert_eq!(decoded.link_user, None);
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(AuthState::decode("not json").is_err());
        assert!(AuthState::decode(r#"{"reason":"steal"}"#).is_err());
    }
}
