//! Identity claims from OAuth ID tokens.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;

use crate::error::{ProviderError, ProviderResult};

/// Claims extracted from an ID token.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IdClaims {
    /// Stable account identifier (`sub`).
    #[serde(rename = "sub")]
    pub subject: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// Decodes the payload of a JWT ID token without verifying its signature.
///
/// WARNING: the signature is NOT checked. This is only sound because the
/// token arrives directly from the provider's token endpoint over TLS in
/// the same response as the access token; it must never be called on a
/// token received from a browser or any other untrusted channel.
pub fn decode_id_token(token: &str) -> ProviderResult<IdClaims> {
    let mut parts = token.split('.');
    let payload = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(_), Some(payload), Some(_), None) => payload,
        _ => return Err(ProviderError::invalid_response("malformed ID token")),
    };
    let raw = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|e| ProviderError::invalid_response("ID token payload is not base64url").with_source(e))?;
    serde_json::from_slice(&raw)
        .map_err(|e| ProviderError::invalid_response("ID token payload is not valid JSON").with_source(e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token_with_payload(payload: &str) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
        let body = URL_SAFE_NO_PAD.encode(payload.as_bytes());
        format!("{header}.{body}.signature")
    }

    #[test]
    fn decodes_subject_and_email() {
        let token = token_with_payload(
            r#"{"sub":"subject-1","email":"ada@example.com","name":"Ada","iat":1700000000}"#,
        );
        let claims = decode_id_token(&token).unwrap();
        assert_eq!(claims.subject, "subject-1");
        assert_eq!(claims.email.as_deref(), Some("ada@example.com"));
        assert_eq!(claims.name.as_deref(), Some("Ada"));
    }

    #[test]
    fn email_and_name_are_optional() {
        let token = token_with_payload(r#"{"sub":"subject-1"}"#);
        let claims = decode_id_token(&token).unwrap();
        assert_eq!(claims.email, None);
        assert_eq!(claims.name, None);
    }

    #[test]
    fn rejects_wrong_segment_count() {
        assert!(decode_id_token("only-one-segment").is_err());
        assert!(decode_id_token("a.b").is_err());
        assert!(decode_id_token("a.b.c.d").is_err());
    }

    #[test]
    fn rejects_missing_subject() {
        let token = token_with_payload(r#"{"email":"ada@example.com"}"#);
        assert!(decode_id_token(&token).is_err());
    }
}
