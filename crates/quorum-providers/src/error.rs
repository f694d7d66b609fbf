//! Error types for provider operations.

use std::fmt;
use thiserror::Error;

/// High-level classification of a provider error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderErrorCode {
    /// Authentication failed or credentials are invalid/expired.
    AuthenticationFailed,
    /// The user lacks permission for the operation.
    AuthorizationFailed,
    /// The sync cursor was rejected; the caller must run a full sync.
    CursorExpired,
    /// A flow-scoped nonce was missing, expired, or already consumed.
    InvalidNonce,
    /// Network error: connection failed, timeout, DNS resolution.
    NetworkError,
    /// Rate limit exceeded.
    RateLimited,
    /// The provider returned a 5xx status.
    ServerError,
    /// Unparseable or unexpected provider response.
    InvalidResponse,
    /// Resource not found (404).
    NotFound,
    /// The request was rejected as invalid (400).
    BadRequest,
    /// Missing or invalid adapter configuration.
    ConfigurationError,
    /// Unexpected internal state.
    InternalError,
}

impl ProviderErrorCode {
    /// Returns true if the operation may be retried as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NetworkError | Self::RateLimited | Self::ServerError
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthenticationFailed => "authentication_failed",
            Self::AuthorizationFailed => "authorization_failed",
            Self::CursorExpired => "cursor_expired",
            Self::InvalidNonce => "invalid_nonce",
            Self::NetworkError => "network_error",
            Self::RateLimited => "rate_limited",
            Self::ServerError => "server_error",
            Self::InvalidResponse => "invalid_response",
            Self::NotFound => "not_found",
            Self::BadRequest => "bad_request",
            Self::ConfigurationError => "configuration_error",
            Self::InternalError => "internal_error",
        }
    }
}

impl fmt::Display for ProviderErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An error from a provider operation.
#[derive(Debug, Error)]
pub struct ProviderError {
    code: ProviderErrorCode,
    message: String,
    /// The provider that produced the error (e.g. "google").
    provider: Option<String>,
    /// HTTP status of the failing response, when there was one.
    status: Option<u16>,
    /// Machine-readable error string from the provider's OAuth endpoint,
    /// e.g. "invalid_grant".
    oauth_code: Option<String>,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ProviderError {
    pub fn new(code: ProviderErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            provider: None,
            status: None,
            oauth_code: None,
            source: None,
        }
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::AuthenticationFailed, message)
    }

    pub fn authorization(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::AuthorizationFailed, message)
    }

    pub fn cursor_expired(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::CursorExpired, message)
    }

    pub fn invalid_nonce(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::InvalidNonce, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::NetworkError, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::RateLimited, message)
    }

    pub fn server(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::ServerError, message)
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::InvalidResponse, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::NotFound, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::BadRequest, message)
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::ConfigurationError, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::InternalError, message)
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_oauth_code(mut self, code: impl Into<String>) -> Self {
        self.oauth_code = Some(code.into());
        self
    }

    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    pub fn code(&self) -> ProviderErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn provider(&self) -> Option<&str> {
        self.provider.as_deref()
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }

    pub fn oauth_code(&self) -> Option<&str> {
        self.oauth_code.as_deref()
    }

    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }

    /// Returns true if the stored credential is no longer usable and
    /// should be dropped: the provider rejected the token itself, not
    /// just this request.
    pub fn is_credential_revoked(&self) -> bool {
        self.code == ProviderErrorCode::AuthenticationFailed
            && (self.status == Some(401) || self.oauth_code.as_deref() == Some("invalid_grant"))
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref provider) = self.provider {
            write!(f, "[{}] ", provider)?;
        }
        write!(f, "{}: {}", self.code, self.message)
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_retryable() {
        assert!(ProviderErrorCode::NetworkError.is_retryable());
        assert!(ProviderErrorCode::RateLimited.is_retryable());
        assert!(!ProviderErrorCode::CursorExpired.is_retryable());
        assert!(!ProviderErrorCode::AuthenticationFailed.is_retryable());
    }

    #[test]
    fn credential_revocation_detection() {
        assert!(ProviderError::authentication("token rejected")
            .with_status(401)
            .is_credential_revoked());
        assert!(ProviderError::authentication("grant revoked")
            .with_oauth_code("invalid_grant")
            .is_credential_revoked());
        assert!(!ProviderError::authentication("exchange failed")
            .with_status(400)
            .is_credential_revoked());
        assert!(!ProviderError::server("backend down")
            .with_status(401)
            .is_credential_revoked());
    }

    #[test]
    fn display_includes_provider_and_code() {
        let err = ProviderError::rate_limited("too many requests").with_provider("google");
        let display = format!("{}", err);
        assert!(display.contains("[google]"));
        assert!(display.contains("rate_limited"));
    }

    #[test]
    fn with_source_is_chained() {
        use std::error::Error;
        let io_err = std::io::Error::other("connection reset");
        let err = ProviderError::network("request failed").with_source(io_err);
        assert!(err.source().is_some());
    }
}
