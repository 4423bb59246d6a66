//! Model selection and vendor client registry
//!
//! Resolves a chat request to the vendor client that should serve it.
//! Selections may be a bare model name or `model@provider`.

use crate::core::client::ChatHttpClient;
use crate::core::config::Config;
use crate::core::provider::{LlmApi, ProviderError, ProviderType};
use crate::core::providers::{SoochowLifeProvider, TencentProvider};
use crate::models::chat::{LlmModel, ModelConfig};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Split `model@provider` at the last `@`
pub fn split_model_provider(selection: &str) -> (&str, Option<&str>) {
    match selection.rsplit_once('@') {
        Some((model, provider)) if !provider.is_empty() => (model, Some(provider)),
        _ => (selection, None),
    }
}

/// Holds one client per configured vendor
pub struct ModelManager {
    clients: HashMap<ProviderType, Arc<dyn LlmApi>>,
    default_provider: Option<ProviderType>,
}

impl ModelManager {
    pub fn new(default_provider: Option<ProviderType>) -> Self {
        Self {
            clients: HashMap::new(),
            default_provider,
        }
    }

    /// Build clients for every vendor section present in the configuration
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let http = ChatHttpClient::new()?;
        let access_code = config.access.code.clone();
        let mut manager = Self::new(config.default_provider());

        if let Some(settings) = &config.providers.tencent {
            manager.register(
                ProviderType::Tencent,
                Arc::new(TencentProvider::new(
                    http.clone(),
                    settings.clone(),
                    config.request.clone(),
                    access_code.clone(),
                )),
            );
        }

        if let Some(settings) = &config.providers.soochowlife {
            manager.register(
                ProviderType::SoochowLife,
                Arc::new(SoochowLifeProvider::new(
                    http.clone(),
                    settings.clone(),
                    config.request.clone(),
                    access_code.clone(),
                    config.public_origin(),
                )),
            );
        }

        if manager.clients.is_empty() {
            warn!("No vendor providers configured; only the proxy route is usable");
        }
        Ok(manager)
    }

    pub fn register(&mut self, provider: ProviderType, client: Arc<dyn LlmApi>) {
        info!("Registered provider: {}", client.provider_name());
        self.clients.insert(provider, client);
    }

    pub fn get(&self, provider: ProviderType) -> Option<Arc<dyn LlmApi>> {
        self.clients.get(&provider).cloned()
    }

    /// Configured providers in a stable order
    pub fn providers(&self) -> Vec<ProviderType> {
        ProviderType::all()
            .into_iter()
            .filter(|p| self.clients.contains_key(p))
            .collect()
    }

    /// Pick the client for a request.
    ///
    /// Precedence: explicit provider, `providerName` in the model config,
    /// the `@provider` suffix of the model, then the default provider.
    pub fn resolve(
        &self,
        explicit: Option<&str>,
        config: &ModelConfig,
    ) -> Result<(ProviderType, Arc<dyn LlmApi>), ProviderError> {
        let (_, suffix) = split_model_provider(&config.model);
        let requested = explicit
            .or(config.provider_name.as_deref())
            .or(suffix)
            .filter(|name| !name.is_empty());

        let provider = match requested {
            Some(name) => ProviderType::from_str(name)
                .ok_or_else(|| ProviderError::BadRequest(format!("Unknown provider: {}", name)))?,
            None => self.default_provider.ok_or_else(|| {
                ProviderError::BadRequest("No provider selected and no default configured".into())
            })?,
        };

        let client = self.get(provider).ok_or_else(|| {
            ProviderError::BadRequest(format!("Provider {} is not configured", provider))
        })?;
        Ok((provider, client))
    }

    /// Models of every configured provider, ordered for display
    pub async fn all_models(&self) -> Vec<LlmModel> {
        let mut models = Vec::new();
        for provider in self.providers() {
            let Some(client) = self.get(provider) else {
                continue;
            };
            match client.models().await {
                Ok(list) => models.extend(list),
                Err(e) => warn!("Failed to list models for {}: {}", provider, e),
            }
        }
        models.sort_by_key(|m| (m.provider.sorted, m.sorted));
        models
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_config() -> Config {
        Config::from_toml(
            r#"
            [providers]
            default = "tencent"

            [providers.tencent]
            bot_app_key = "bot-key"

            [providers.soochowlife]
            is_app = true
            base_url = "https://soochow.example"
        "#,
        )
        .unwrap()
    }

    #[test]
    fn test_split_model_provider() {
        assert_eq!(split_model_provider("soochowLife@SoochowLife"), ("soochowLife", Some("SoochowLife")));
        assert_eq!(split_model_provider("a@b@Tencent"), ("a@b", Some("Tencent")));
        assert_eq!(split_model_provider("tencent-bot"), ("tencent-bot", None));
        assert_eq!(split_model_provider("trailing@"), ("trailing@", None));
    }

    #[test]
    fn test_resolve_precedence() {
        let manager = ModelManager::from_config(&create_test_config()).unwrap();
        let mut config = ModelConfig::new("tencent-bot@Tencent");

        let (provider, _) = manager.resolve(None, &config).unwrap();
        assert_eq!(provider, ProviderType::Tencent);

        config.provider_name = Some("SoochowLife".into());
        let (provider, _) = manager.resolve(None, &config).unwrap();
        assert_eq!(provider, ProviderType::SoochowLife);

        let (provider, _) = manager.resolve(Some("tencent"), &config).unwrap();
        assert_eq!(provider, ProviderType::Tencent);
    }

    #[test]
    fn test_resolve_falls_back_to_default() {
        let manager = ModelManager::from_config(&create_test_config()).unwrap();
        let (provider, client) = manager.resolve(None, &ModelConfig::new("anything")).unwrap();
        assert_eq!(provider, ProviderType::Tencent);
        assert_eq!(client.provider_name(), "Tencent");
    }

    #[test]
    fn test_resolve_rejects_unknown_and_unconfigured() {
        let config = Config::from_toml(
            r#"
            [providers.tencent]
            bot_app_key = "bot-key"
        "#,
        )
        .unwrap();
        let manager = ModelManager::from_config(&config).unwrap();
        assert!(matches!(
            manager.resolve(Some("openai"), &ModelConfig::new("gpt-4o")),
            Err(ProviderError::BadRequest(_))
        ));
        assert!(matches!(
            manager.resolve(Some("soochowLife"), &ModelConfig::new("soochowLife")),
            Err(ProviderError::BadRequest(msg)) if msg.contains("not configured")
        ));
    }

    #[tokio::test]
    async fn test_all_models_sorted_by_provider() {
        let manager = ModelManager::from_config(&create_test_config()).unwrap();
        let models = manager.all_models().await;
        let names: Vec<_> = models.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["tencent-bot", "soochowLife"]);
    }
}
