//! Shared HTTP plumbing for adapters.

use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;

use crate::error::{ProviderError, ProviderResult};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const BODY_SNIPPET_LEN: usize = 200;

/// Builds the HTTP client adapters share.
pub(crate) fn build_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .expect("failed to create HTTP client")
}

/// Reads a response's status and body, mapping transport failures.
pub(crate) async fn read_body(
    provider: &'static str,
    response: reqwest::Response,
) -> ProviderResult<(StatusCode, String)> {
    let status = response.status();
    let body = response.text().await.map_err(|e| {
        ProviderError::network("failed to read response body")
            .with_provider(provider)
            .with_source(e)
    })?;
    Ok((status, body))
}

/// Maps a request send failure.
pub(crate) fn send_error(provider: &'static str, err: reqwest::Error) -> ProviderError {
    ProviderError::network("request failed")
        .with_provider(provider)
        .with_source(err)
}

fn snippet(body: &str) -> &str {
    if body.len() <= BODY_SNIPPET_LEN {
        return body;
    }
    let mut end = BODY_SNIPPET_LEN;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}

/// Maps a non-success API status to a provider error.
pub(crate) fn status_error(
    provider: &'static str,
    status: StatusCode,
    body: &str,
) -> ProviderError {
    let message = format!("{}: {}", status, snippet(body));
    let err = match status {
        StatusCode::BAD_REQUEST => ProviderError::bad_request(message),
        StatusCode::UNAUTHORIZED => ProviderError::authentication(message),
        StatusCode::FORBIDDEN => ProviderError::authorization(message),
        StatusCode::NOT_FOUND => ProviderError::not_found(message),
        StatusCode::GONE => ProviderError::cursor_expired(message),
        StatusCode::TOO_MANY_REQUESTS => ProviderError::rate_limited(message),
        s if s.is_server_error() => ProviderError::server(message),
        _ => ProviderError::invalid_response(message),
    };
    err.with_provider(provider).with_status(status.as_u16())
}

#[derive(Debug, Deserialize)]
struct OAuthErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Maps a non-success token endpoint response, surfacing the OAuth error
/// code so callers can distinguish a revoked grant from a bad request.
pub(crate) fn token_error(
    provider: &'static str,
    status: StatusCode,
    body: &str,
) -> ProviderError {
    match serde_json::from_str::<OAuthErrorBody>(body) {
        Ok(parsed) => {
            let message = parsed
                .error_description
                .unwrap_or_else(|| parsed.error.clone());
            ProviderError::authentication(format!("token request failed: {message}"))
                .with_provider(provider)
                .with_status(status.as_u16())
                .with_oauth_code(parsed.error)
        }
        Err(_) => ProviderError::authentication(format!(
            "token request failed ({}): {}",
            status,
            snippet(body)
        ))
        .with_provider(provider)
        .with_status(status.as_u16()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderErrorCode;

    #[test]
    fn gone_maps_to_cursor_expired() {
        let err = status_error("google", StatusCode::GONE, "sync token expired");
        assert_eq!(err.code(), ProviderErrorCode::CursorExpired);
        assert_eq!(err.status(), Some(410));
    }

    #[test]
    fn unauthorized_is_credential_revoked() {
        let err = status_error("microsoft", StatusCode::UNAUTHORIZED, "token expired");
        assert!(err.is_credential_revoked());
    }

    #[test]
    fn token_error_extracts_oauth_code() {
        let body = r#"{"error":"invalid_grant","error_description":"Token has been revoked."}"#;
        let err = token_error("google", StatusCode::BAD_REQUEST, body);
        assert_eq!(err.oauth_code(), Some("invalid_grant"));
        assert!(err.is_credential_revoked());
        assert!(err.message().contains("Token has been revoked."));
    }

    #[test]
    fn token_error_tolerates_non_json_body() {
        let err = token_error("google", StatusCode::BAD_GATEWAY, "<html>bad gateway</html>");
        assert_eq!(err.code(), ProviderErrorCode::AuthenticationFailed);
        assert_eq!(err.oauth_code(), None);
    }

    #[test]
    fn snippet_truncates_long_bodies() {
        let body = "x".repeat(1000);
        let err = status_error("google", StatusCode::INTERNAL_SERVER_ERROR, &body);
        assert!(err.message().len() < 300);
    }
}
