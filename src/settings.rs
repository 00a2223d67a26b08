//! Process-level limiter settings.
//!
//! The service exposes a single knob, `RATE_LIMIT`, the number of requests per second
//! each client may make. Non-positive values turn limiting off. The counting window
//! is one second and idle clients are dropped after one minute.

use crate::clock::{Clock, SystemClock};
use crate::error::ConfigError;
use crate::rate_limit::{Config, Limiter, NoopLimiter, RateLimiter};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Environment variable holding the per-client requests-per-second limit.
pub const RATE_LIMIT_ENV: &str = "RATE_LIMIT";

/// Limit applied when `RATE_LIMIT` is unset or empty.
pub const DEFAULT_RATE_LIMIT: i64 = 100;

/// Errors from loading settings or building a limiter from them.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    #[error("invalid RATE_LIMIT value {value:?}: expected an integer requests/sec")]
    InvalidRateLimit { value: String },
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Limiter settings sourced from process configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    /// Requests per second per client; `<= 0` disables limiting.
    pub rate_limit: i64,
}

impl Default for Settings {
    fn default() -> Self {
        Self { rate_limit: DEFAULT_RATE_LIMIT }
    }
}

impl Settings {
    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through `lookup`, which maps a variable name to its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let settings = match lookup(RATE_LIMIT_ENV) {
            Some(value) if !value.is_empty() => {
                let rate_limit =
                    value.parse::<i64>().map_err(|_| SettingsError::InvalidRateLimit { value })?;
                Self { rate_limit }
            }
            _ => Self::default(),
        };
        info!(rate_limit = settings.rate_limit, "requests/sec per client");
        Ok(settings)
    }

    /// Build the limiter these settings describe, on the system clock.
    ///
    /// Returns a [`NoopLimiter`] when `rate_limit <= 0`. Otherwise the
    /// [`RateLimiter`]'s loops run until `shutdown` is cancelled.
    pub fn build_limiter(
        &self,
        shutdown: &CancellationToken,
    ) -> Result<Arc<dyn Limiter>, SettingsError> {
        self.build_limiter_with_clock(SystemClock, shutdown)
    }

    /// Like [`build_limiter`](Self::build_limiter) with an explicit clock.
    pub fn build_limiter_with_clock<C: Clock + 'static>(
        &self,
        clock: C,
        shutdown: &CancellationToken,
    ) -> Result<Arc<dyn Limiter>, SettingsError> {
        if self.rate_limit <= 0 {
            info!("rate limiting disabled");
            return Ok(Arc::new(NoopLimiter::new()));
        }
        let limit = u32::try_from(self.rate_limit)
            .map_err(|_| SettingsError::InvalidRateLimit { value: self.rate_limit.to_string() })?;
        let limiter = RateLimiter::with_clock(Config::per_second(limit), clock, shutdown)?;
        Ok(Arc::new(limiter))
    }
}
