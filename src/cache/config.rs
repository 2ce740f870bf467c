use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::utils::parse_env_with_prefix;

/// Response cache configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    /// Whether slow-changing reads are cached at all
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Time-to-live for cached reads (in seconds)
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: u64,

    /// Maximum number of entries held in memory
    #[serde(default = "default_max_entries")]
    pub max_entries: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            ttl_seconds: default_ttl_seconds(),
            max_entries: default_max_entries(),
        }
    }
}

impl CacheConfig {
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::new()
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }

    /// Load cache configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(enabled) = parse_env_with_prefix("CACHE_ENABLED") {
            config.enabled = enabled;
        }
        if let Some(ttl) = parse_env_with_prefix("CACHE_TTL_SECONDS") {
            config.ttl_seconds = ttl;
        }
        if let Some(max) = parse_env_with_prefix("CACHE_MAX_ENTRIES") {
            config.max_entries = max;
        }

        config
    }
}

/// Builder for CacheConfig
#[must_use = "builder does nothing until you call build()"]
pub struct CacheConfigBuilder {
    config: CacheConfig,
}

impl CacheConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: CacheConfig::default(),
        }
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.config.enabled = enabled;
        self
    }

    pub fn ttl_seconds(mut self, seconds: u64) -> Self {
        self.config.ttl_seconds = seconds;
        self
    }

    pub fn max_entries(mut self, max: u64) -> Self {
        self.config.max_entries = max;
        self
    }

    pub fn build(self) -> CacheConfig {
        self.config
    }
}

impl Default for CacheConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn default_enabled() -> bool {
    true
}

fn default_ttl_seconds() -> u64 {
    3600 // 1 hour
}

fn default_max_entries() -> u64 {
    1000
}
