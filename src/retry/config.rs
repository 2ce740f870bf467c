use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::utils::parse_env_with_prefix;

/// Backoff configuration shared by webhook processing and outbound calls
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
    /// Retries after the first attempt (total attempts = max_retries + 1)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay before the first retry, doubled for each further retry
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Upper bound on any single delay, jitter included
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Uniform jitter as a fraction of the delay (0.1 = ±10%)
    #[serde(default = "default_jitter_factor")]
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter_factor: default_jitter_factor(),
        }
    }
}

impl RetryConfig {
    pub fn builder() -> RetryConfigBuilder {
        RetryConfigBuilder::new()
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    /// Load retry configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(retries) = parse_env_with_prefix("RETRY_MAX_RETRIES") {
            config.max_retries = retries;
        }
        if let Some(initial) = parse_env_with_prefix("RETRY_INITIAL_DELAY_MS") {
            config.initial_delay_ms = initial;
        }
        if let Some(max) = parse_env_with_prefix("RETRY_MAX_DELAY_MS") {
            config.max_delay_ms = max;
        }
        if let Some(jitter) = parse_env_with_prefix("RETRY_JITTER_FACTOR") {
            config.jitter_factor = jitter;
        }

        config
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.initial_delay_ms > self.max_delay_ms {
            return Err(format!(
                "retry initial_delay_ms ({}) must not exceed max_delay_ms ({})",
                self.initial_delay_ms, self.max_delay_ms
            ));
        }
        if !(0.0..=1.0).contains(&self.jitter_factor) {
            return Err("retry jitter_factor must be in range [0.0, 1.0]".to_string());
        }
        Ok(())
    }
}

/// Builder for RetryConfig
#[must_use = "builder does nothing until you call build()"]
pub struct RetryConfigBuilder {
    config: RetryConfig,
}

impl RetryConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: RetryConfig::default(),
        }
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    pub fn initial_delay_ms(mut self, ms: u64) -> Self {
        self.config.initial_delay_ms = ms;
        self
    }

    pub fn max_delay_ms(mut self, ms: u64) -> Self {
        self.config.max_delay_ms = ms;
        self
    }

    pub fn jitter_factor(mut self, factor: f64) -> Self {
        self.config.jitter_factor = factor;
        self
    }

    pub fn build(self) -> RetryConfig {
        self.config
    }
}

impl Default for RetryConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    60_000
}

fn default_jitter_factor() -> f64 {
    0.1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.initial_delay(), Duration::from_secs(1));
        assert_eq!(config.max_delay(), Duration::from_secs(60));
        assert!((config.jitter_factor - 0.1).abs() < f64::EPSILON);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = RetryConfig::builder()
            .max_retries(5)
            .initial_delay_ms(250)
            .max_delay_ms(10_000)
            .jitter_factor(0.0)
            .build();

        assert_eq!(config.max_retries, 5);
        assert_eq!(config.initial_delay_ms, 250);
        assert_eq!(config.max_delay_ms, 10_000);
        assert_eq!(config.jitter_factor, 0.0);
    }

    #[test]
    fn test_validate_rejects_inverted_delays() {
        let config = RetryConfig::builder()
            .initial_delay_ms(5_000)
            .max_delay_ms(1_000)
            .build();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_out_of_range_jitter() {
        let config = RetryConfig::builder().jitter_factor(1.5).build();
        assert!(config.validate().is_err());
    }
}
