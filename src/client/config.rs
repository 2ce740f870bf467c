use secrecy::SecretString;
use serde::Deserialize;
use std::time::Duration;

use crate::utils::{get_env_with_prefix, parse_env_with_prefix};

/// Outbound API client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Root of the REST API, e.g. `https://api2.frontapp.com`
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bearer token sent on every request
    #[serde(default = "default_api_token")]
    pub api_token: SecretString,

    /// Per-request timeout (in seconds), independent of retries
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_token: default_api_token(),
            timeout_seconds: default_timeout_seconds(),
            user_agent: default_user_agent(),
        }
    }
}

impl ClientConfig {
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Load client configuration from environment variables
    ///
    /// The token is read from `FRONT_API_TOKEN`.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(base_url) = get_env_with_prefix("FRONT_BASE_URL") {
            config.base_url = base_url;
        }
        if let Some(token) = get_env_with_prefix("FRONT_API_TOKEN") {
            config.api_token = SecretString::from(token);
        }
        if let Some(timeout) = parse_env_with_prefix("FRONT_TIMEOUT_SECONDS") {
            config.timeout_seconds = timeout;
        }
        if let Some(agent) = get_env_with_prefix("FRONT_USER_AGENT") {
            config.user_agent = agent;
        }

        config
    }
}

/// Builder for ClientConfig
#[must_use = "builder does nothing until you call build()"]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
        }
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    pub fn api_token(mut self, token: impl Into<String>) -> Self {
        self.config.api_token = SecretString::from(token.into());
        self
    }

    pub fn timeout_seconds(mut self, seconds: u64) -> Self {
        self.config.timeout_seconds = seconds;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    pub fn build(self) -> ClientConfig {
        self.config
    }
}

impl Default for ClientConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn default_base_url() -> String {
    "https://api2.frontapp.com".to_string()
}

fn default_api_token() -> SecretString {
    SecretString::from(String::new())
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!("frontbridge/{}", env!("CARGO_PKG_VERSION"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, "https://api2.frontapp.com");
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert!(config.user_agent.starts_with("frontbridge/"));
        assert!(config.api_token.expose_secret().is_empty());
    }

    #[test]
    fn test_token_not_in_debug_output() {
        let config = ClientConfig::builder().api_token("tok_very_secret").build();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("tok_very_secret"));
    }
}
