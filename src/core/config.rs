//! Application configuration management
//!
//! This module handles loading and validating configuration from TOML files.
//! All configuration is validated at startup.

use crate::core::constants::{api_path, soochowlife, tencent, timeout};
use crate::core::provider::ProviderType;
use crate::core::providers::soochowlife::resolve_base_url;
use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

/// Default server port
const DEFAULT_PORT: u16 = 8082;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Origin the gateway is reachable at; proxy-relative vendor URLs join onto it
    #[serde(default)]
    pub public_url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            public_url: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RequestConfig {
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_thinking_timeout_ms")]
    pub thinking_timeout_ms: u64,
}

impl RequestConfig {
    /// Request timeout for a model; slow reasoning and image models get the longer one
    pub fn timeout_ms_for_model(&self, model: &str) -> u64 {
        let model = model.to_lowercase();
        if model.starts_with("dall-e")
            || model.starts_with("dalle")
            || model.starts_with("o1")
            || model.starts_with("o3")
            || model.contains("deepseek-r")
            || model.contains("-thinking")
        {
            self.thinking_timeout_ms
        } else {
            self.timeout_ms
        }
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            thinking_timeout_ms: default_thinking_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AccessConfig {
    /// Shared code callers must present in `x-access-code`
    #[serde(default)]
    pub code: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TencentConfig {
    pub bot_app_key: String,
    #[serde(default = "default_tencent_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_tencent_chat_path")]
    pub chat_path: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SoochowLifeConfig {
    /// Custom endpoint, used only when `use_custom_config` is set
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub use_custom_config: bool,
    /// Call the vendor directly instead of through the gateway proxy
    #[serde(default)]
    pub is_app: bool,
    /// Direct vendor endpoint for `is_app` mode
    #[serde(default)]
    pub base_url: String,
    #[serde(default = "default_soochowlife_chat_path")]
    pub chat_path: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default)]
    pub tencent: Option<TencentConfig>,
    #[serde(default)]
    pub soochowlife: Option<SoochowLifeConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProxyConfig {
    #[serde(default = "default_proxy_timeout_secs")]
    pub timeout_secs: u64,
    /// Provider name to upstream base URL
    #[serde(default)]
    pub upstreams: HashMap<String, String>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_proxy_timeout_secs(),
            upstreams: HashMap::new(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_timeout_ms() -> u64 {
    timeout::REQUEST_MS
}

fn default_thinking_timeout_ms() -> u64 {
    timeout::THINKING_REQUEST_MS
}

fn default_proxy_timeout_secs() -> u64 {
    timeout::PROXY_SECS
}

fn default_tencent_endpoint() -> String {
    tencent::ENDPOINT.to_string()
}

fn default_tencent_chat_path() -> String {
    tencent::CHAT_PATH.to_string()
}

fn default_soochowlife_chat_path() -> String {
    soochowlife::CHAT_PATH.to_string()
}

/// Application configuration loaded from a TOML file
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub request: RequestConfig,
    #[serde(default)]
    pub access: AccessConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub proxy: ProxyConfig,
}

impl Config {
    /// Load configuration from TOML file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The TOML file cannot be read or parsed
    /// - Configuration values are invalid
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path).context("Failed to read configuration file")?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(content).context("Failed to parse TOML configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the file named by `CONFIG_PATH`
    ///
    /// Looks for config.toml in current directory by default
    pub fn from_env() -> Result<Self> {
        let config_path =
            std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        Self::from_file(config_path)
    }

    fn validate(&self) -> Result<()> {
        if let Some(name) = &self.providers.default {
            let provider = ProviderType::from_str(name)
                .with_context(|| format!("Unknown default provider '{}'", name))?;
            if !self.is_configured(provider) {
                bail!("Default provider '{}' has no configuration section", name);
            }
        }

        if let Some(tencent) = &self.providers.tencent {
            if tencent.bot_app_key.trim().is_empty() {
                bail!("providers.tencent.bot_app_key must not be empty");
            }
        }

        let mut seen = HashSet::new();
        for (name, url) in &self.proxy.upstreams {
            if !url.starts_with("http") {
                bail!("proxy.upstreams.{} must be an http(s) URL, got '{}'", name, url);
            }
            if !seen.insert(name.to_lowercase()) {
                bail!("proxy.upstreams has several entries for '{}' differing only in case", name);
            }
        }

        // Proxied SoochowLife calls loop back through /api/soochowLife
        if let Some(soochow) = &self.providers.soochowlife {
            if resolve_base_url(soochow).starts_with(api_path::SOOCHOW_LIFE)
                && self.upstream_for(soochowlife::PROVIDER_ID).is_none()
            {
                bail!(
                    "providers.soochowlife is proxied but proxy.upstreams has no '{}' entry",
                    soochowlife::PROVIDER_ID
                );
            }
        }

        Ok(())
    }

    pub fn is_configured(&self, provider: ProviderType) -> bool {
        match provider {
            ProviderType::Tencent => self.providers.tencent.is_some(),
            ProviderType::SoochowLife => self.providers.soochowlife.is_some(),
        }
    }

    /// Provider used when a chat request names none
    pub fn default_provider(&self) -> Option<ProviderType> {
        self.providers
            .default
            .as_deref()
            .and_then(ProviderType::from_str)
            .or_else(|| {
                ProviderType::all()
                    .into_iter()
                    .find(|p| self.is_configured(*p))
            })
    }

    /// Origin vendor clients use to reach this gateway's proxy route
    pub fn public_origin(&self) -> String {
        match &self.server.public_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => {
                let host = match self.server.host.as_str() {
                    "0.0.0.0" | "::" => "127.0.0.1",
                    other => other,
                };
                format!("http://{}:{}", host, self.server.port)
            }
        }
    }

    /// Upstream base URL for a proxy route segment, matched case-insensitively
    pub fn upstream_for(&self, provider: &str) -> Option<&str> {
        self.proxy
            .upstreams
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(provider))
            .map(|(_, url)| url.as_str())
    }

    /// If an access code is set, checks that the client presented it.
    /// Otherwise validation is skipped and returns true.
    pub fn validate_access_code(&self, presented: Option<&str>) -> bool {
        match &self.access.code {
            Some(expected) => presented == Some(expected.as_str()),
            None => true,
        }
    }
}
