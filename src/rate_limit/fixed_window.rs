//! Fixed-window rate limiter keyed by client identifier.
//!
//! Semantics:
//! - Every `allow` call increments the client's counter, denied calls included, so a
//!   client over its limit stays denied until the next reset.
//! - A request is admitted iff the post-increment count is `<= limit`.
//! - A reset loop zeroes all counters every `limit_interval`.
//! - A cleanup loop evicts clients idle for at least `client_timeout`, checked every
//!   `client_timeout`.
//!
//! Both loops run as tokio tasks until the [`CancellationToken`] passed at construction
//! is cancelled. There is no other way to stop them.
//!
//! Racing calls for the same client at the limit boundary are admitted in lock
//! acquisition order; counts are exact, the order is not specified.
//!
//! Example
//! ```rust
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//! use turnstile::rate_limit::{Config, Limiter, RateLimiter};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let shutdown = CancellationToken::new();
//! let config = Config {
//!     limit: 2,
//!     limit_interval: Duration::from_secs(1),
//!     client_timeout: Duration::from_secs(60),
//! };
//! let limiter = RateLimiter::new(config, &shutdown).unwrap();
//! assert!(limiter.allow("10.0.0.1"));
//! assert!(limiter.allow("10.0.0.1"));
//! assert!(!limiter.allow("10.0.0.1"));
//! shutdown.cancel();
//! # });
//! ```

use crate::clock::{Clock, SystemClock};
use crate::error::ConfigError;
use crate::rate_limit::store::{ActivityStore, ClientActivity};
use crate::rate_limit::Limiter;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Shortest accepted counting window.
pub const MIN_LIMIT_INTERVAL: Duration = Duration::from_secs(1);

/// Idle timeout used by [`Config::per_second`].
pub const DEFAULT_CLIENT_TIMEOUT: Duration = Duration::from_secs(60);

/// Limiter configuration, validated by [`RateLimiter::new`].
///
/// `Default` is all zeroes and therefore invalid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Config {
    /// Maximum admitted requests per interval, per client.
    pub limit: u32,
    /// Length of one counting window.
    pub limit_interval: Duration,
    /// Idle time after which a client's record is evicted.
    pub client_timeout: Duration,
}

impl Config {
    /// `limit` requests per second with a one minute idle timeout.
    pub fn per_second(limit: u32) -> Self {
        Self { limit, limit_interval: MIN_LIMIT_INTERVAL, client_timeout: DEFAULT_CLIENT_TIMEOUT }
    }

    /// Check the rules in order: limit, then interval, then timeout.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.limit == 0 {
            return Err(ConfigError::InvalidLimit { provided: self.limit });
        }
        if self.limit_interval < MIN_LIMIT_INTERVAL {
            return Err(ConfigError::InvalidLimitInterval { provided: self.limit_interval });
        }
        if self.client_timeout <= self.limit_interval {
            return Err(ConfigError::InvalidClientTimeout {
                provided: self.client_timeout,
                limit_interval: self.limit_interval,
            });
        }
        Ok(())
    }
}

/// Per-client fixed-window limiter.
///
/// Clones share the same store and clock, so all handles observe and affect the same
/// counters.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    store: Arc<ActivityStore>,
    clock: Arc<dyn Clock>,
    config: Config,
}

impl RateLimiter {
    /// Validate `config` and start the maintenance loops on the system clock.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn new(config: Config, shutdown: &CancellationToken) -> Result<Self, ConfigError> {
        Self::with_clock(config, SystemClock, shutdown)
    }

    /// Like [`new`](Self::new) but reading time and tickers from `clock`.
    ///
    /// Tickers are created before this returns, so a mock clock advanced afterwards
    /// drives both loops.
    pub fn with_clock<C: Clock + 'static>(
        config: Config,
        clock: C,
        shutdown: &CancellationToken,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let limiter = Self { store: Arc::new(ActivityStore::new()), clock: Arc::new(clock), config };
        limiter.spawn_limit_reset(shutdown.clone());
        limiter.spawn_client_cleanup(shutdown.clone());

        info!(
            limit = config.limit,
            limit_interval_ms = duration_millis(config.limit_interval),
            client_timeout_ms = duration_millis(config.client_timeout),
            "rate limiter started"
        );
        Ok(limiter)
    }

    /// The validated configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Number of clients currently tracked.
    pub fn number_of_clients(&self) -> usize {
        self.store.len()
    }

    /// Snapshot of a tracked client's record.
    pub fn activity(&self, client: &str) -> Option<ClientActivity> {
        self.store.get(client)
    }

    fn spawn_limit_reset(&self, shutdown: CancellationToken) {
        let mut ticker = self.clock.ticker(self.config.limit_interval);
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        store.reset_counts();
                    }
                }
            }
            debug!("limit reset loop stopped");
        });
    }

    fn spawn_client_cleanup(&self, shutdown: CancellationToken) {
        let mut ticker = self.clock.ticker(self.config.client_timeout);
        let store = Arc::clone(&self.store);
        let timeout = self.config.client_timeout;
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => break,
                    now = ticker.tick() => {
                        let evicted = store.evict_idle(now, timeout);
                        if evicted > 0 {
                            debug!(evicted, remaining = store.len(), "evicted idle clients");
                        }
                    }
                }
            }
            debug!("client cleanup loop stopped");
        });
    }
}

impl Limiter for RateLimiter {
    fn allow(&self, client: &str) -> bool {
        let count = self.store.record(client, self.clock.now());
        let allowed = count <= u64::from(self.config.limit);
        if !allowed {
            debug!(client, count, limit = self.config.limit, "request denied");
        }
        allowed
    }
}

fn duration_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
