//! Adapter registry.

use std::sync::Arc;

use tracing::info;

use quorum_store::NonceCache;

use crate::adapter::ProviderAdapter;
use crate::config::ProvidersConfig;
use crate::google::GoogleAdapter;
use crate::microsoft::MicrosoftAdapter;

/// Builds one adapter per configured provider.
pub fn build_adapters(
    config: &ProvidersConfig,
    nonces: Arc<dyn NonceCache>,
) -> Vec<Arc<dyn ProviderAdapter>> {
    let mut adapters: Vec<Arc<dyn ProviderAdapter>> = Vec::new();
    if let Some(google) = config.google.clone() {
        adapters.push(Arc::new(GoogleAdapter::new(google)));
    }
    if let Some(microsoft) = config.microsoft.clone() {
        adapters.push(Arc::new(MicrosoftAdapter::new(microsoft, nonces)));
    }
    info!(count = adapters.len(), "provider adapters registered");
    adapters
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GoogleSettings;
    use quorum_core::ProviderKind;
    use quorum_store::MemoryNonceCache;

    #[test]
    fn only_configured_providers_are_registered() {
        let config = ProvidersConfig {
            google: Some(GoogleSettings {
                client_id: "cid".to_string(),
                client_secret: "secret".to_string(),
                redirect_uri: "https://quorum.example/cb".to_string(),
            }),
            microsoft: None,
        };
        let adapters = build_adapters(&config, Arc::new(MemoryNonceCache::new()));
        assert_eq!(adapters.len(), 1);
        assert_eq!(adapters[0].kind(), ProviderKind::Google);
    }

    #[test]
    fn empty_config_yields_no_adapters() {
        let adapters =
            build_adapters(&ProvidersConfig::default(), Arc::new(MemoryNonceCache::new()));
        assert!(adapters.is_empty());
    }
}
