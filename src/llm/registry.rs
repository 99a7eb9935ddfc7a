//! `ProviderRegistry`: selects a [`ProviderClient`] per purpose from config.

use std::collections::HashMap;
use std::sync::Arc;

use super::client::{AnthropicClient, ClientConfig, OpenAIClient, ProviderClient};
use super::types::Provider;

/// Known call sites that need a provider. `Filter` is the high-volume cheap
/// path used by the Scorer; `Tailor` is the quality path used to generate
/// résumés.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Purpose {
    Filter,
    Tailor,
}

impl Purpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Filter => "filter",
            Self::Tailor => "tailor",
        }
    }
}

/// One entry of the `purpose -> {provider, model}` configuration map (§6.6).
#[derive(Debug, Clone)]
pub struct ProviderSelection {
    pub provider: Provider,
    pub model: String,
    pub api_key: String,
    pub base_url: Option<String>,
}

/// Builds and caches [`ProviderClient`] instances by purpose.
///
/// Unknown purposes fall back to the configured default provider with a
/// logged warning, per §4.3.
pub struct ProviderRegistry {
    selections: HashMap<Purpose, ProviderSelection>,
    default: ProviderSelection,
    clients: std::sync::Mutex<HashMap<&'static str, Arc<dyn ProviderClient>>>,
}

impl ProviderRegistry {
    pub fn new(selections: HashMap<Purpose, ProviderSelection>, default: ProviderSelection) -> Self {
        Self {
            selections,
            default,
            clients: std::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Returns a configured client for `purpose`, constructing and caching it
    /// on first use.
    pub fn client_for(&self, purpose: Purpose) -> Arc<dyn ProviderClient> {
        let key = purpose.as_str();
        if let Some(existing) = self.clients.lock().unwrap().get(key) {
            return existing.clone();
        }

        let selection = self.selections.get(&purpose).unwrap_or_else(|| {
            tracing::warn!(purpose = key, "no provider configured for purpose, using default");
            &self.default
        });

        let client = build_client(selection);
        self.clients.lock().unwrap().insert(key, client.clone());
        client
    }
}

fn build_client(selection: &ProviderSelection) -> Arc<dyn ProviderClient> {
    let mut config = ClientConfig::new(selection.api_key.clone(), selection.model.clone());
    if let Some(base_url) = &selection.base_url {
        config = config.with_base_url(base_url.clone());
    }

    match selection.provider {
        Provider::Anthropic => Arc::new(AnthropicClient::new(config)),
        Provider::OpenAI => Arc::new(OpenAIClient::new(config)),
        Provider::OpenRouter => Arc::new(OpenAIClient::with_provider(config, Provider::OpenRouter)),
        #[cfg(feature = "gemini")]
        Provider::Google => Arc::new(super::client::GoogleClient::new(config)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selection(provider: Provider, model: &str) -> ProviderSelection {
        ProviderSelection {
            provider,
            model: model.to_string(),
            api_key: "test-key".to_string(),
            base_url: None,
        }
    }

    #[test]
    fn falls_back_to_default_for_unknown_purpose() {
        let registry = ProviderRegistry::new(HashMap::new(), selection(Provider::Anthropic, "claude-3-5-haiku-20241022"));
        let client = registry.client_for(Purpose::Filter);
        assert_eq!(client.provider(), Provider::Anthropic);
    }

    #[test]
    fn uses_configured_selection_when_present() {
        let mut selections = HashMap::new();
        selections.insert(Purpose::Tailor, selection(Provider::OpenAI, "gpt-4o"));
        let registry = ProviderRegistry::new(selections, selection(Provider::Anthropic, "claude-3-5-haiku-20241022"));
        let client = registry.client_for(Purpose::Tailor);
        assert_eq!(client.provider(), Provider::OpenAI);
    }

    #[test]
    fn caches_clients_per_purpose() {
        let registry = ProviderRegistry::new(HashMap::new(), selection(Provider::Anthropic, "claude-3-5-haiku-20241022"));
        let a = registry.client_for(Purpose::Filter);
        let b = registry.client_for(Purpose::Filter);
        assert!(Arc::ptr_eq(&a, &b));
    }
}
