//! Utility functions and helpers.

pub mod env;

pub use env::{get_env_with_prefix, parse_env_with_prefix};

/// Current wall-clock time as fractional seconds since the Unix epoch
pub(crate) fn now_epoch_secs() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
