use crate::config::{ProviderKind, Settings};
use crate::core::error::PluginError;
use crate::providers::{ChatProvider, OpenAICompatibleProvider};
use std::collections::HashMap;
use std::sync::Arc;

type ProviderCreator =
    Box<dyn Fn(&Settings, &str) -> Arc<dyn ChatProvider> + Send + Sync>;

pub struct ProviderFactory {
    creators: HashMap<ProviderKind, ProviderCreator>,
}

impl ProviderFactory {
    pub fn new() -> Self {
        let mut creators: HashMap<ProviderKind, ProviderCreator> = HashMap::new();

        creators.insert(
            ProviderKind::OpenAI,
            Box::new(|settings: &Settings, api_key: &str| {
                Arc::new(OpenAICompatibleProvider::new(
                    settings.base_url(),
                    api_key.to_string(),
                    None,
                )) as Arc<dyn ChatProvider>
            }),
        );

        creators.insert(
            ProviderKind::OpenRouter,
            Box::new(|settings: &Settings, api_key: &str| {
                let mut headers = HashMap::new();
                headers.insert("X-Title".to_string(), "vaultchat".to_string());
                Arc::new(OpenAICompatibleProvider::new(
                    settings.base_url(),
                    api_key.to_string(),
                    Some(headers),
                )) as Arc<dyn ChatProvider>
            }),
        );

        creators.insert(
            ProviderKind::DeepSeek,
            Box::new(|settings: &Settings, api_key: &str| {
                Arc::new(OpenAICompatibleProvider::new(
                    settings.base_url(),
                    api_key.to_string(),
                    None,
                )) as Arc<dyn ChatProvider>
            }),
        );

        Self { creators }
    }

    /// Build the provider selected in `settings`.
    ///
    /// A missing API key is not checked here; requests are refused before
    /// they reach the provider.
    pub fn create(&self, settings: &Settings) -> Result<Arc<dyn ChatProvider>, PluginError> {
        let api_key = settings.api_key().unwrap_or_default();
        self.creators
            .get(&settings.provider)
            .map(|creator| creator(settings, api_key))
            .ok_or_else(|| {
                PluginError::Config(format!("Provider not found: {:?}", settings.provider))
            })
    }
}

impl Default for ProviderFactory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_provider_kind_has_a_creator() {
        let factory = ProviderFactory::new();
        for provider in [ProviderKind::OpenAI, ProviderKind::OpenRouter, ProviderKind::DeepSeek] {
            let settings = Settings {
                provider,
                api_key: Some("sk-test".to_string()),
                ..Settings::default()
            };
            assert!(factory.create(&settings).is_ok());
        }
    }
}
