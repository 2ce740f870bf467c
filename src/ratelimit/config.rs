use serde::{Deserialize, Serialize};

use crate::utils::parse_env_with_prefix;

/// Outbound rate-limit pacing configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Whether the governor paces requests at all
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Remaining-request count below which requests are spread evenly
    /// over the time left until the provider's window resets
    #[serde(default = "default_low_water_mark")]
    pub low_water_mark: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            low_water_mark: default_low_water_mark(),
        }
    }
}

impl RateLimitConfig {
    pub fn builder() -> RateLimitConfigBuilder {
        RateLimitConfigBuilder::new()
    }

    /// Configuration with pacing switched off
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Load rate limit configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(enabled) = parse_env_with_prefix("RATE_LIMIT_ENABLED") {
            config.enabled = enabled;
        }
        if let Some(mark) = parse_env_with_prefix("RATE_LIMIT_LOW_WATER_MARK") {
            config.low_water_mark = mark;
        }

        config
    }
}

/// Builder for RateLimitConfig
#[must_use = "builder does nothing until you call build()"]
pub struct RateLimitConfigBuilder {
    config: RateLimitConfig,
}

impl RateLimitConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: RateLimitConfig::default(),
        }
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.config.enabled = enabled;
        self
    }

    pub fn low_water_mark(mut self, mark: u64) -> Self {
        self.config.low_water_mark = mark;
        self
    }

    pub fn build(self) -> RateLimitConfig {
        self.config
    }
}

impl Default for RateLimitConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn default_enabled() -> bool {
    true
}

fn default_low_water_mark() -> u64 {
    10
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RateLimitConfig::default();
        assert!(config.enabled);
        assert_eq!(config.low_water_mark, 10);
    }

    #[test]
    fn test_disabled() {
        let config = RateLimitConfig::disabled();
        assert!(!config.enabled);
        assert_eq!(config.low_water_mark, 10);
    }

    #[test]
    fn test_builder() {
        let config = RateLimitConfig::builder()
            .enabled(false)
            .low_water_mark(25)
            .build();

        assert!(!config.enabled);
        assert_eq!(config.low_water_mark, 25);
    }
}
