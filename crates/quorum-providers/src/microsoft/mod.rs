//! Microsoft Graph calendar adapter.
//!
//! Authorization Code flow with PKCE and a certificate client assertion
//! instead of a shared secret. The PKCE verifier lives in the nonce
//! cache between redirect and callback, keyed by a server nonce carried
//! through the state parameter. Event reads use `calendarView/delta`,
//! following `@odata.nextLink` pages until a `@odata.deltaLink` cursor.

mod api;
mod assertion;

use std::sync::Arc;
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use tracing::debug;

use quorum_core::{EventPayload, ProviderKind, QueryWindow};
use quorum_store::NonceCache;

use crate::adapter::{AuthParams, BoxFuture, EventPage, ProviderAdapter, RefreshedTokens, TokenGrant};
use crate::claims::decode_id_token;
use crate::config::MicrosoftSettings;
use crate::error::{ProviderError, ProviderResult};
use crate::http;
use crate::pkce::{PkceFlow, random_token};

const PROVIDER: &str = "microsoft";
const GRAPH_DELTA_URL: &str = "https://graph.microsoft.com/v1.0/me/calendarView/delta";
const GRAPH_EVENTS_URL: &str = "https://graph.microsoft.com/v1.0/me/events";
const CLIENT_ASSERTION_TYPE: &str = "urn:ietf:params:oauth:client-assertion-type:jwt-bearer";

const SCOPES: &[&str] = &[
    "openid",
    "profile",
    "email",
    "offline_access",
    "https://graph.microsoft.com/Calendars.ReadWrite",
];

/// How long an abandoned flow keeps its PKCE verifier alive.
const VERIFIER_TTL: Duration = Duration::from_secs(600);

const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

pub struct MicrosoftAdapter {
    settings: MicrosoftSettings,
    nonces: Arc<dyn NonceCache>,
    client: reqwest::Client,
}

impl MicrosoftAdapter {
    pub fn new(settings: MicrosoftSettings, nonces: Arc<dyn NonceCache>) -> Self {
        Self {
            settings,
            nonces,
            client: http::build_client(),
        }
    }

    fn authorize_url(&self) -> String {
        format!(
            "https://login.microsoftonline.com/{}/oauth2/v2.0/authorize",
            self.settings.tenant
        )
    }

    fn token_url(&self) -> String {
        format!(
            "https://login.microsoftonline.com/{}/oauth2/v2.0/token",
            self.settings.tenant
        )
    }

    async fn token_request(&self, params: &[(&str, &str)]) -> ProviderResult<api::TokenResponse> {
        let assertion = assertion::build_client_assertion(&self.settings, &self.token_url())?;
        let mut form: Vec<(&str, &str)> = params.to_vec();
        form.push(("client_assertion_type", CLIENT_ASSERTION_TYPE));
        form.push(("client_assertion", assertion.as_str()));

        let response = self
            .client
            .post(self.token_url())
            .form(&form)
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

    async fn delta_request(&self, access_token: &str, url: &str) -> ProviderResult<EventPage> {
        let response = self
            .client
            .get(url)
            .bearer_auth(access_token)
            .header("Prefer", "outlook.timezone=\"UTC\"")
            .header("Prefer", "odata.maxpagesize=50")
            .send()
            .await
            .map_err(|e| http::send_error(PROVIDER, e))?;
        let (status, body) = http::read_body(PROVIDER, response).await?;
        if !status.is_success() {
            return Err(http::status_error(PROVIDER, status, &body));
        }
        api::parse_delta_page(&body)
    }
}

impl ProviderAdapter for MicrosoftAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Microsoft
    }

    fn scopes(&self) -> &[&'static str] {
        SCOPES
    }

    fn calendar_scope(&self) -> &'static str {
        "https://graph.microsoft.com/Calendars.ReadWrite"
    }

    fn auth_params(&self, force_consent: bool) -> ProviderResult<AuthParams> {
        let pkce = PkceFlow::new();
        let nonce = random_token(16);
        self.nonces
            .put(&nonce, &pkce.verifier, VERIFIER_TTL)
            .map_err(|e| {
                ProviderError::internal("failed to stash PKCE verifier")
                    .with_provider(PROVIDER)
                    .with_source(e)
            })?;

        let mut query = vec![
            ("client_id", self.settings.client_id.clone()),
            ("redirect_uri", self.settings.redirect_uri.clone()),
            ("response_type", "code".to_string()),
            ("response_mode", "query".to_string()),
            ("scope", SCOPES.join(" ")),
            ("code_challenge", pkce.challenge),
            ("code_challenge_method", "S256".to_string()),
        ];
        if force_consent {
            query.push(("prompt", "consent".to_string()));
        }
        Ok(AuthParams {
            endpoint: self.authorize_url(),
            query,
            server_nonce: Some(nonce),
        })
    }

    fn exchange_code<'a>(
        &'a self,
        code: &'a str,
        server_nonce: Option<&'a str>,
    ) -> BoxFuture<'a, ProviderResult<TokenGrant>> {
        Box::pin(async move {
            let nonce = server_nonce.ok_or_else(|| {
                ProviderError::invalid_nonce("callback carried no flow nonce")
                    .with_provider(PROVIDER)
            })?;
            let verifier = self
                .nonces
                .take(nonce)
                .map_err(|e| {
                    ProviderError::internal("nonce cache unavailable")
                        .with_provider(PROVIDER)
                        .with_source(e)
                })?
                .ok_or_else(|| {
                    ProviderError::invalid_nonce("flow nonce expired or already used")
                        .with_provider(PROVIDER)
                })?;

            let scope = SCOPES.join(" ");
            let token = self
                .token_request(&[
                    ("client_id", self.settings.client_id.as_str()),
                    ("scope", scope.as_str()),
                    ("code", code),
                    ("redirect_uri", self.settings.redirect_uri.as_str()),
                    ("grant_type", "authorization_code"),
                    ("code_verifier", verifier.as_str()),
                ])
                .await?;

            let id_token = token.id_token.as_deref().ok_or_else(|| {
                ProviderError::invalid_response("token response carried no ID token")
                    .with_provider(PROVIDER)
            })?;
            let claims = decode_id_token(id_token)?;

            debug!(subject = %claims.subject, "exchanged microsoft authorization code");
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
            let scope = SCOPES.join(" ");
            let token = self
                .token_request(&[
                    ("client_id", self.settings.client_id.as_str()),
                    ("scope", scope.as_str()),
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
            // nextLink and deltaLink are complete URLs; follow them as-is.
            let url = match (page, cursor) {
                (Some(page), _) => page.to_string(),
                (None, Some(cursor)) => cursor.to_string(),
                (None, None) => format!(
                    "{GRAPH_DELTA_URL}?startDateTime={}&endDateTime={}",
                    urlencoding::encode(&window.start.to_rfc3339_opts(SecondsFormat::Secs, true)),
                    urlencoding::encode(&window.end.to_rfc3339_opts(SecondsFormat::Secs, true)),
                ),
            };
            self.delta_request(access_token, &url).await
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
                .post(GRAPH_EVENTS_URL)
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
            let url = format!("{GRAPH_EVENTS_URL}/{}", urlencoding::encode(event_id));
            let response = self
                .client
                .patch(&url)
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
            let url = format!("{GRAPH_EVENTS_URL}/{}", urlencoding::encode(event_id));
            let response = self
                .client
                .delete(&url)
                .bearer_auth(access_token)
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
}

fn expires_at(expires_in: Option<i64>) -> i64 {
    Utc::now().timestamp() + expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS)
}
