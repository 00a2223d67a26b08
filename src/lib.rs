#![forbid(unsafe_code)]
#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::all))]

//! # Turnstile
//!
//! Per-client request admission for async Rust services: a fixed-window rate limiter
//! keyed by client identity, with background counter resets and idle-client eviction.
//!
//! ## Features
//!
//! - **Fixed-window limiting** per client, exact counts under concurrency
//! - **Idle eviction** so memory tracks active clients only
//! - **No-op limiter** for switching limiting off without branching
//! - **Tower middleware** that rejects over-limit requests before the inner service
//! - **Deterministic tests** via an injectable [`MockClock`]
//!
//! ## Quick Start
//!
//! ```rust
//! use turnstile::{client_id, Config, Limiter, RateLimiter};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() {
//!     let shutdown = CancellationToken::new();
//!     let limiter = RateLimiter::new(Config::per_second(100), &shutdown).unwrap();
//!
//!     if !limiter.allow(client_id("203.0.113.9:41000")) {
//!         // respond with 429 Too Many Requests
//!     }
//!
//!     shutdown.cancel();
//! }
//! ```

pub mod client_id;
pub mod clock;
pub mod error;
pub mod prelude;
pub mod rate_limit;
pub mod settings;

// Re-exports
pub use client_id::client_id;
pub use clock::{Clock, MockClock, SystemClock, Ticker};
pub use error::{AdmissionError, ConfigError};
pub use rate_limit::{
    AdmissionLayer, AdmissionService, Config, Limiter, NoopLimiter, RateLimiter,
};
pub use settings::{Settings, SettingsError};
