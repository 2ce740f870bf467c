use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;

use super::event::EventType;
use crate::error::{BridgeError, Result};
use crate::utils::{get_env_with_prefix, parse_env_with_prefix};

/// Inbound webhook configuration
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookConfig {
    /// Shared secret for signature verification
    #[serde(default = "default_secret")]
    pub secret: SecretString,

    /// Deliveries whose `payload.created_at` is older than this are rejected
    #[serde(default = "default_window_secs")]
    pub freshness_window_secs: u64,

    /// How long an accepted `(type, id)` is remembered
    #[serde(default = "default_window_secs")]
    pub dedup_window_secs: u64,

    /// Public URL of this bridge's `/webhooks` endpoint; subscriptions are
    /// only reconciled when set
    #[serde(default)]
    pub target_url: Option<String>,

    /// Event types to subscribe to
    #[serde(default = "default_events")]
    pub events: Vec<String>,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            secret: default_secret(),
            freshness_window_secs: default_window_secs(),
            dedup_window_secs: default_window_secs(),
            target_url: None,
            events: default_events(),
        }
    }
}

impl WebhookConfig {
    pub fn builder() -> WebhookConfigBuilder {
        WebhookConfigBuilder::new()
    }

    pub fn freshness_window(&self) -> Duration {
        Duration::from_secs(self.freshness_window_secs)
    }

    pub fn dedup_window(&self) -> Duration {
        Duration::from_secs(self.dedup_window_secs)
    }

    /// Load webhook configuration from environment variables
    ///
    /// `WEBHOOK_EVENTS` is a comma-separated list.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(secret) = get_env_with_prefix("WEBHOOK_SECRET") {
            config.secret = SecretString::from(secret);
        }
        if let Some(secs) = parse_env_with_prefix("WEBHOOK_FRESHNESS_WINDOW_SECS") {
            config.freshness_window_secs = secs;
        }
        if let Some(secs) = parse_env_with_prefix("WEBHOOK_DEDUP_WINDOW_SECS") {
            config.dedup_window_secs = secs;
        }
        if let Some(url) = get_env_with_prefix("WEBHOOK_TARGET_URL") {
            config.target_url = Some(url).filter(|u| !u.trim().is_empty());
        }
        if let Some(events) = get_env_with_prefix("WEBHOOK_EVENTS") {
            config.events = events
                .split(',')
                .map(str::trim)
                .filter(|e| !e.is_empty())
                .map(str::to_string)
                .collect();
        }

        config
    }

    pub fn validate(&self) -> Result<()> {
        if self.secret.expose_secret().is_empty() {
            return Err(BridgeError::config("Webhook secret must be set"));
        }
        if self.freshness_window_secs == 0 {
            return Err(BridgeError::config("Webhook freshness window must be positive"));
        }
        if self.dedup_window_secs == 0 {
            return Err(BridgeError::config("Webhook dedup window must be positive"));
        }
        if let Some(url) = &self.target_url {
            url::Url::parse(url)
                .map_err(|e| BridgeError::config(format!("Invalid webhook target URL: {}", e)))?;
        }
        Ok(())
    }
}

/// Builder for WebhookConfig
#[must_use = "builder does nothing until you call build()"]
pub struct WebhookConfigBuilder {
    config: WebhookConfig,
}

impl WebhookConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: WebhookConfig::default(),
        }
    }

    pub fn secret(mut self, secret: impl Into<String>) -> Self {
        self.config.secret = SecretString::from(secret.into());
        self
    }

    pub fn freshness_window_secs(mut self, secs: u64) -> Self {
        self.config.freshness_window_secs = secs;
        self
    }

    pub fn dedup_window_secs(mut self, secs: u64) -> Self {
        self.config.dedup_window_secs = secs;
        self
    }

    pub fn target_url(mut self, url: impl Into<String>) -> Self {
        self.config.target_url = Some(url.into());
        self
    }

    pub fn events<I, S>(mut self, events: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.events = events.into_iter().map(Into::into).collect();
        self
    }

    pub fn build(self) -> WebhookConfig {
        self.config
    }
}

impl Default for WebhookConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn default_secret() -> SecretString {
    SecretString::from(String::new())
}

fn default_window_secs() -> u64 {
    300 // 5 minutes
}

fn default_events() -> Vec<String> {
    EventType::KNOWN.iter().map(|t| t.as_str().to_string()).collect()
}
