//! Google Calendar adapter.
//!
//! Authorization Code flow with a confidential client secret and
//! `access_type=offline` for refresh tokens. Event reads go against the
//! primary calendar with `syncToken` incremental listing.

mod api;

use chrono::{SecondsFormat, Utc};
use tracing::debug;

use quorum_core::{EventPayload, ProviderKind, QueryWindow};

use crate::adapter::{AuthParams, BoxFuture, EventPage, ProviderAdapter, RefreshedTokens, TokenGrant};
use crate::claims::decode_id_token;
use crate::config::GoogleSettings;
use crate::error::{ProviderError, ProviderResult};
use crate::http;

const PROVIDER: &str = "google";
const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const EVENTS_URL: &str = "https://www.googleapis.com/calendar/v3/calendars/primary/events";

const SCOPES: &[&str] = &[
    "openid",
    "email",
    "profile",
    "https://www.googleapis.com/auth/calendar.events",
];

/// Default access token lifetime when the grant omits `expires_in`.
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

pub struct GoogleAdapter {
    settings: GoogleSettings,
    client: reqwest::Client,
}

impl GoogleAdapter {
    pub fn new(settings: GoogleSettings) -> Self {
        Self {
            settings,
            client: http::build_client(),
        }
    }

    async fn token_request(&self, params: &[(&str, &str)]) -> ProviderResult<api::TokenResponse> {
        let response = self
            .client
            .post(TOKEN_URL)
            .form(params)
            .send()
            .await
            .map_err(|e| http::send_error(PROVIDER, e))?;
        let (status, body) = http::read_body(PROVIDER, response).await?;
        if !status.is_success() {
            return Err(http::token_error(PROVIDER, status, &body));
        }
        serde_json::from_str(&body).map_err(|e| {
            ProviderError::invalid_response("invalid token response")
                .with_provider(PROVIDER)
                .with_source(e)
        })
    }
}

impl ProviderAdapter for GoogleAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Google
    }

    fn scopes(&self) -> &[&'static str] {
        SCOPES
    }

    fn calendar_scope(&self) -> &'static str {
        "https://www.googleapis.com/auth/calendar.events"
    }

    fn auth_params(&self, force_consent: bool) -> ProviderResult<AuthParams> {
        let mut query = vec![
            ("client_id", self.settings.client_id.clone()),
            ("redirect_uri", self.settings.redirect_uri.clone()),
            ("response_type", "code".to_string()),
            ("scope", SCOPES.join(" ")),
            ("access_type", "offline".to_string()),
            ("include_granted_scopes", "true".to_string()),
        ];
        if force_consent {
            // Google only reissues a refresh token when consent is re-prompted.
            query.push(("prompt", "consent".to_string()));
        }
        Ok(AuthParams {
            endpoint: AUTH_URL.to_string(),
            query,
            server_nonce: None,
        })
    }

    fn exchange_code<'a>(
        &'a self,
        code: &'a str,
        _server_nonce: Option<&'a str>,
    ) -> BoxFuture<'a, ProviderResult<TokenGrant>> {
        Box::pin(async move {
            let token = self
                .token_request(&[
                    ("client_id", self.settings.client_id.as_str()),
                    ("client_secret", self.settings.client_secret.as_str()),
                    ("code", code),
                    ("grant_type", "authorization_code"),
                    ("redirect_uri", self.settings.redirect_uri.as_str()),
                ])
                .await?;

            let id_token = token.id_token.as_deref().ok_or_else(|| {
                ProviderError::invalid_response("token response carried no ID token")
                    .with_provider(PROVIDER)
            })?;
            let claims = decode_id_token(id_token)?;

            debug!(subject = %claims.subject, "exchanged google authorization code");
            Ok(TokenGrant {
                access_token: token.access_token,
                expires_at: expires_at(token.expires_in),
                refresh_token: token.refresh_token,
                scope: token.scope.unwrap_or_default(),
                claims,
            })
        })
    }

    fn refresh_tokens<'a>(
        &'a self,
        refresh_token: &'a str,
    ) -> BoxFuture<'a, ProviderResult<RefreshedTokens>> {
        Box::pin(async move {
            let token = self
                .token_request(&[
                    ("client_id", self.settings.client_id.as_str()),
                    ("client_secret", self.settings.client_secret.as_str()),
                    ("refresh_token", refresh_token),
                    ("grant_type", "refresh_token"),
                ])
                .await?;
            Ok(RefreshedTokens {
                access_token: token.access_token,
                expires_at: expires_at(token.expires_in),
                refresh_token: token.refresh_token,
            })
        })
    }

    fn list_events<'a>(
        &'a self,
        access_token: &'a str,
        window: &'a QueryWindow,
        cursor: Option<&'a str>,
        page: Option<&'a str>,
    ) -> BoxFuture<'a, ProviderResult<EventPage>> {
        Box::pin(async move {
            let mut query: Vec<(&str, String)> = vec![
                ("maxResults", "250".to_string()),
                ("singleEvents", "true".to_string()),
            ];
            match cursor {
                // syncToken excludes window parameters; Google rejects both.
                Some(cursor) => query.push(("syncToken", cursor.to_string())),
                None => {
                    query.push((
                        "timeMin",
                        window.start.to_rfc3339_opts(SecondsFormat::Secs, true),
                    ));
                    query.push((
                        "timeMax",
                        window.end.to_rfc3339_opts(SecondsFormat::Secs, true),
                    ));
                    query.push(("timeZone", "UTC".to_string()));
                }
            }
            if let Some(page) = page {
                query.push(("pageToken", page.to_string()));
            }

            let response = self
                .client
                .get(EVENTS_URL)
                .bearer_auth(access_token)
                .query(&query)
                .send()
                .await
                .map_err(|e| http::send_error(PROVIDER, e))?;
            let (status, body) = http::read_body(PROVIDER, response).await?;
            if !status.is_success() {
                return Err(http::status_error(PROVIDER, status, &body));
            }
            api::parse_events_page(&body)
        })
    }

    fn create_event<'a>(
        &'a self,
        access_token: &'a str,
        payload: &'a EventPayload,
    ) -> BoxFuture<'a, ProviderResult<String>> {
        Box::pin(async move {
            let response = self
                .client
                .post(EVENTS_URL)
                .bearer_auth(access_token)
                .json(&api::event_body(payload))
                .send()
                .await
                .map_err(|e| http::send_error(PROVIDER, e))?;
            let (status, body) = http::read_body(PROVIDER, response).await?;
            if !status.is_success() {
                return Err(http::status_error(PROVIDER, status, &body));
            }
            api::parse_created_event_id(&body)
        })
    }

    fn update_event<'a>(
        &'a self,
        access_token: &'a str,
        event_id: &'a str,
        payload: &'a EventPayload,
    ) -> BoxFuture<'a, ProviderResult<()>> {
        Box::pin(async move {
            let url = format!("{EVENTS_URL}/{}", urlencoding::encode(event_id));
            let response = self
                .client
                .put(&url)
                .bearer_auth(access_token)
                .json(&api::event_body(payload))
                .send()
                .await
                .map_err(|e| http::send_error(PROVIDER, e))?;
            let (status, body) = http::read_body(PROVIDER, response).await?;
            if !status.is_success() {
                return Err(http::status_error(PROVIDER, status, &body));
            }
            Ok(())
        })
    }

    fn delete_event<'a>(
        &'a self,
        access_token: &'a str,
        event_id: &'a str,
    ) -> BoxFuture<'a, ProviderResult<()>> {
        Box::pin(async move {
            let url = format!("{EVENTS_URL}/{}", urlencoding::encode(event_id));
            let response = self
                .client
                .delete(&url)
                .bearer_auth(access_token)
                .send()
                .await
                .map_err(|e| http::send_error(PROVIDER, e))?;
            let (status, body) = http::read_body(PROVIDER, response).await?;
            if !status.is_success() {
                // Google reports an already-deleted event as 410.
                if status == reqwest::StatusCode::GONE {
                    return Err(ProviderError::not_found("event already deleted")
                        .with_provider(PROVIDER)
                        .with_status(410));
                }
                return Err(http::status_error(PROVIDER, status, &body));
            }
            Ok(())
        })
    }
}

fn expires_at(expires_in: Option<i64>) -> i64 {
    Utc::now().timestamp() + expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> GoogleSettings {
        GoogleSettings {
            client_id: "test-client.apps.googleusercontent.com".to_string(),
            client_secret: "secret".to_string(),
            redirect_uri: "https://quorum.example/oauth/google/callback".to_string(),
        }
    }

    #[test]
    fn auth_params_request_offline_access() {
        let adapter = GoogleAdapter::new(settings());
        let params = adapter.auth_params(false).unwrap();
        let url = params.into_url("state-1");
        assert!(url.starts_with(AUTH_URL));
        assert!(url.contains("access_type=offline"));
        assert!(url.contains("response_type=code"));
        assert!(!url.contains("prompt=consent"));
    }

    #[test]
    fn force_consent_adds_prompt() {
        let adapter = GoogleAdapter::new(settings());
        let url = adapter.auth_params(true).unwrap().into_url("state-1");
        assert!(url.contains("prompt=consent"));
    }

    #[test]
    fn scopes_include_calendar_events() {
        let adapter = GoogleAdapter::new(settings());
        assert!(adapter
            .scopes()
            .contains(&"https://www.googleapis.com/auth/calendar.events"));
        assert_eq!(adapter.kind(), ProviderKind::Google);
    }
}
