//! Provider adapter configuration.
//!
//! Settings are read once at startup and never mutated; every adapter
//! holds its own copy. A provider with no settings is simply absent from
//! the adapter registry.

use serde::Deserialize;

use quorum_core::ProviderKind;

/// Google OAuth application settings.
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleSettings {
    pub client_id: String,
    pub client_secret: String,
    /// Callback URL registered with the OAuth application.
    pub redirect_uri: String,
}

/// Microsoft OAuth application settings.
///
/// Microsoft flows authenticate the application with a signed client
/// assertion instead of a shared secret.
#[derive(Debug, Clone, Deserialize)]
pub struct MicrosoftSettings {
    pub client_id: String,
    /// Directory tenant, or "common" for multi-tenant applications.
    pub tenant: String,
    pub redirect_uri: String,
    /// PEM-encoded RSA private key for signing client assertions.
    pub private_key_pem: String,
    /// Base64url SHA-1 thumbprint of the registered certificate, sent as
    /// the assertion's `x5t` header.
    pub cert_thumbprint: String,
}

/// Settings for every supported provider.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub google: Option<GoogleSettings>,
    #[serde(default)]
    pub microsoft: Option<MicrosoftSettings>,
}

impl ProvidersConfig {
    /// Loads settings from the environment. Providers with incomplete
    /// variables are left unconfigured.
    pub fn from_env() -> Self {
        let google = match (
            std::env::var("QUORUM_GOOGLE_CLIENT_ID"),
            std::env::var("QUORUM_GOOGLE_CLIENT_SECRET"),
            std::env::var("QUORUM_GOOGLE_REDIRECT_URI"),
        ) {
            (Ok(client_id), Ok(client_secret), Ok(redirect_uri)) => Some(GoogleSettings {
                client_id,
                client_secret,
                redirect_uri,
            }),
            _ => None,
        };

        let microsoft = match (
            std::env::var("QUORUM_MICROSOFT_CLIENT_ID"),
            std::env::var("QUORUM_MICROSOFT_TENANT"),
            std::env::var("QUORUM_MICROSOFT_REDIRECT_URI"),
            std::env::var("QUORUM_MICROSOFT_PRIVATE_KEY_PEM"),
            std::env::var("QUORUM_MICROSOFT_CERT_THUMBPRINT"),
        ) {
            (Ok(client_id), Ok(tenant), Ok(redirect_uri), Ok(private_key_pem), Ok(cert_thumbprint)) => {
                Some(MicrosoftSettings {
                    client_id,
                    tenant,
                    redirect_uri,
                    private_key_pem,
                    cert_thumbprint,
                })
            }
            _ => None,
        };

        Self { google, microsoft }
    }

    pub fn is_configured(&self, kind: ProviderKind) -> bool {
        match kind {
            ProviderKind::Google => self.google.is_some(),
            ProviderKind::Microsoft => self.microsoft.is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_no_providers() {
        let config = ProvidersConfig::default();
        assert!(!config.is_configured(ProviderKind::Google));
        assert!(!config.is_configured(ProviderKind::Microsoft));
    }

    #[test]
    fn deserializes_partial_config() {
        let config: ProvidersConfig = serde_json::from_str(
            r#"{
                "google": {
                    "client_id": "cid",
                    "client_secret": "secret",
                    "redirect_uri": "https://quorum.example/oauth/google/callback"
                }
            }"#,
        )
        .unwrap();
        assert!(config.is_configured(ProviderKind::Google));
        assert!(!config.is_configured(ProviderKind::Microsoft));
    }
}
