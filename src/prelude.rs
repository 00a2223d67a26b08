//! Convenient re-exports for common Turnstile types.
pub use crate::{
    client_id::client_id,
    clock::{Clock, MockClock, SystemClock},
    error::{AdmissionError, ConfigError},
    rate_limit::{AdmissionLayer, ClientKey, Config, Limiter, NoopLimiter, RateLimiter},
    settings::{Settings, SettingsError},
};
