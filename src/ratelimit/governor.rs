use super::config::RateLimitConfig;
use crate::utils::now_epoch_secs;
use reqwest::header::HeaderMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

pub const REMAINING_HEADER: &str = "x-ratelimit-remaining";
pub const RESET_HEADER: &str = "x-ratelimit-reset";

/// Reset values above this are epoch milliseconds rather than seconds
const EPOCH_MILLIS_THRESHOLD: f64 = 1e11;
/// Reset values below this are seconds-until-reset rather than a timestamp
const EPOCH_SECONDS_THRESHOLD: f64 = 1e9;
/// Reset windows longer than this are treated as bogus and ignored
const MAX_RESET_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

/// Shared pacing state, updated from response headers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateLimitState {
    /// Delay to inject before each request while the window is open
    pub delay: Duration,
    /// When the provider's window resets
    pub reset_at: Option<Instant>,
}

impl RateLimitState {
    fn is_active(&self, now: Instant) -> bool {
        !self.delay.is_zero() && self.reset_at.is_some_and(|reset_at| now < reset_at)
    }
}

/// Process-wide pacing governor for the outbound API
///
/// Concurrent observers race on a mutex; the last response observed wins,
/// which is acceptable since the state is only a throttle hint.
#[derive(Debug)]
pub struct RateLimitGovernor {
    state: Mutex<RateLimitState>,
    low_water_mark: u64,
    enabled: bool,
}

impl Default for RateLimitGovernor {
    fn default() -> Self {
        Self::new(&RateLimitConfig::default())
    }
}

impl RateLimitGovernor {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            state: Mutex::new(RateLimitState::default()),
            low_water_mark: config.low_water_mark,
            enabled: config.enabled,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RateLimitState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Current state, for inspection and logging
    pub fn snapshot(&self) -> RateLimitState {
        *self.lock()
    }

    /// Delay the next request should wait, if the window is still open
    ///
    /// An expired window clears the stored delay.
    pub fn pending_delay(&self) -> Option<Duration> {
        if !self.enabled {
            return None;
        }

        let mut state = self.lock();
        if state.is_active(Instant::now()) {
            Some(state.delay)
        } else {
            state.delay = Duration::ZERO;
            None
        }
    }

    /// Wait out the pending delay before issuing a request
    pub async fn throttle(&self) {
        if let Some(delay) = self.pending_delay() {
            tracing::debug!(
                delay_ms = delay.as_millis() as u64,
                "Pacing outbound request to stay under the provider rate limit"
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// Update pacing from the rate-limit headers of an upstream response
    ///
    /// Responses without both headers leave the state untouched.
    pub fn observe(&self, headers: &HeaderMap) {
        let remaining = header_value::<u64>(headers, REMAINING_HEADER);
        let reset = header_value::<f64>(headers, RESET_HEADER);

        if let (Some(remaining), Some(reset)) = (remaining, reset) {
            self.record_limits(remaining, until_reset(reset, now_epoch_secs()));
        }
    }

    /// Record the provider's remaining budget and time left in its window
    pub fn record_limits(&self, remaining: u64, until_reset: Duration) {
        if !self.enabled {
            return;
        }

        let reset_at = Instant::now().checked_add(until_reset);
        let delay = if remaining < self.low_water_mark && reset_at.is_some() {
            Self::compute_delay(remaining, until_reset)
        } else {
            Duration::ZERO
        };

        {
            let mut state = self.lock();
            state.delay = delay;
            state.reset_at = reset_at;
        }

        if !delay.is_zero() {
            tracing::info!(
                remaining,
                reset_in_ms = until_reset.as_millis() as u64,
                delay_ms = delay.as_millis() as u64,
                "Rate limit budget low, pacing outbound requests"
            );
        }
    }

    /// Spread the time until reset evenly across the remaining requests
    ///
    /// The divisor is `remaining + 1` so an exhausted budget waits out the
    /// whole window and a budget of five splits it into six slots.
    pub fn compute_delay(remaining: u64, until_reset: Duration) -> Duration {
        let slots = u32::try_from(remaining.saturating_add(1)).unwrap_or(u32::MAX);
        until_reset / slots
    }

    /// Clear any pacing state
    pub fn reset(&self) {
        *self.lock() = RateLimitState::default();
    }
}

fn header_value<T: std::str::FromStr>(headers: &HeaderMap, name: &str) -> Option<T> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

/// Interpret an `x-ratelimit-reset` value relative to `now` (epoch seconds)
fn until_reset(reset: f64, now: f64) -> Duration {
    let secs = if reset >= EPOCH_MILLIS_THRESHOLD {
        reset / 1000.0 - now
    } else if reset >= EPOCH_SECONDS_THRESHOLD {
        reset - now
    } else {
        reset
    };

    match Duration::try_from_secs_f64(secs) {
        Ok(window) if window <= MAX_RESET_WINDOW => window,
        _ => Duration::ZERO,
    }
}
