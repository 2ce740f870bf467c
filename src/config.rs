use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::net::SocketAddr;

use crate::cache::CacheConfig;
use crate::client::ClientConfig;
use crate::error::{BridgeError, Result};
use crate::ratelimit::RateLimitConfig;
use crate::retry::RetryConfig;
use crate::utils::{get_env_with_prefix, parse_env_with_prefix};
use crate::webhooks::WebhookConfig;

/// Main configuration for the bridge
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub client: ClientConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Maximum webhook body size in bytes (default: 1MB)
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_json")]
    pub json: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_body_size: default_max_body_size(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: default_json(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_json() -> bool {
    false
}

fn default_max_body_size() -> usize {
    1024 * 1024
}

impl ServerConfig {
    pub fn addr(&self) -> std::result::Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}

/// Builder for Config with environment variable support
#[must_use = "builder does nothing until you call build()"]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.config.server.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.config.server.port = port;
        self
    }

    pub fn with_max_body_size(mut self, max_body_size: usize) -> Self {
        self.config.server.max_body_size = max_body_size;
        self
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn with_json_logging(mut self, enabled: bool) -> Self {
        self.config.logging.json = enabled;
        self
    }

    pub fn with_webhook(mut self, webhook: WebhookConfig) -> Self {
        self.config.webhook = webhook;
        self
    }

    pub fn with_webhook_secret(mut self, secret: impl Into<String>) -> Self {
        self.config.webhook.secret = SecretString::from(secret.into());
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.config.retry = retry;
        self
    }

    pub fn with_rate_limit(mut self, rate_limit: RateLimitConfig) -> Self {
        self.config.rate_limit = rate_limit;
        self
    }

    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.config.cache = cache;
        self
    }

    pub fn with_client(mut self, client: ClientConfig) -> Self {
        self.config.client = client;
        self
    }

    pub fn with_api_token(mut self, token: impl Into<String>) -> Self {
        self.config.client.api_token = SecretString::from(token.into());
        self
    }

    /// Load configuration from environment variables with FRONTBRIDGE_ prefix
    pub fn from_env(mut self) -> Self {
        if let Some(host) = get_env_with_prefix("HOST") {
            self.config.server.host = host;
        }
        // FRONTBRIDGE_PORT first, then PORT for platforms that inject it
        if let Some(port) = parse_env_with_prefix("PORT") {
            self.config.server.port = port;
        }
        if let Some(size) = parse_env_with_prefix("MAX_BODY_SIZE") {
            self.config.server.max_body_size = size;
        }
        if let Some(level) = get_env_with_prefix("LOG_LEVEL") {
            self.config.logging.level = level;
        }
        if let Some(json) = parse_env_with_prefix("LOG_JSON") {
            self.config.logging.json = json;
        }

        self.config.webhook = WebhookConfig::from_env();
        self.config.retry = RetryConfig::from_env();
        self.config.rate_limit = RateLimitConfig::from_env();
        self.config.cache = CacheConfig::from_env();
        self.config.client = ClientConfig::from_env();

        self
    }

    /// Build the configuration, validating all settings
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Config`] for an unparsable listen address, an
    /// unknown log level, a missing webhook secret or API token, or any
    /// out-of-range tuning value.
    pub fn build(self) -> Result<Config> {
        let config = self.config;

        config.server.addr().map_err(|e| {
            BridgeError::config(format!(
                "Invalid server address {}:{} - {}",
                config.server.host, config.server.port, e
            ))
        })?;

        if config.server.port == 0 {
            return Err(BridgeError::config("Server port must be greater than 0"));
        }

        if config.server.max_body_size == 0 {
            return Err(BridgeError::config("Maximum body size must be greater than 0"));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.to_lowercase().as_str()) {
            return Err(BridgeError::config(format!(
                "Invalid log level: {}. Must be one of: {}",
                config.logging.level,
                valid_log_levels.join(", ")
            )));
        }

        config.webhook.validate()?;
        config.retry.validate().map_err(BridgeError::config)?;

        if config.client.api_token.expose_secret().is_empty() {
            return Err(BridgeError::config("API token must be set"));
        }
        if config.client.timeout_seconds == 0 {
            return Err(BridgeError::config("Request timeout must be greater than 0"));
        }
        url::Url::parse(&config.client.base_url)
            .map_err(|e| BridgeError::config(format!("Invalid API base URL: {}", e)))?;

        if config.cache.enabled && config.cache.ttl_seconds == 0 {
            return Err(BridgeError::config("Cache TTL must be greater than 0 when enabled"));
        }

        Ok(config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> ConfigBuilder {
        ConfigBuilder::new()
            .with_webhook_secret("whsec")
            .with_api_token("tok")
    }

    #[test]
    fn test_valid_config_builds() {
        let config = valid().with_port(9000).build().unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.cache.ttl_seconds, 3600);
        assert_eq!(config.client.timeout_seconds, 30);
    }

    #[test]
    fn test_missing_secrets_rejected() {
        assert!(ConfigBuilder::new().with_api_token("tok").build().is_err());
        assert!(ConfigBuilder::new().with_webhook_secret("whsec").build().is_err());
    }

    #[test]
    fn test_invalid_log_level_rejected() {
        let err = valid().with_log_level("chatty").build().unwrap_err();
        assert!(matches!(err, BridgeError::Config(_)));
    }

    #[test]
    fn test_invalid_address_rejected() {
        assert!(valid().with_host("not a host").build().is_err());
        assert!(valid().with_port(0).build().is_err());
    }

    #[test]
    fn test_invalid_retry_rejected() {
        let retry = RetryConfig::builder().jitter_factor(2.0).build();
        assert!(valid().with_retry(retry).build().is_err());
    }

    #[test]
    fn test_secrets_hidden_from_debug() {
        let config = valid().build().unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("whsec"));
    }
}
