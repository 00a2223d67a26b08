//! Per-client request admission.
//!
//! This module provides the building blocks for rate limiting:
//! - [`Limiter`]: the admission contract, `allow(client) -> bool`.
//! - [`RateLimiter`]: fixed-window counting per client with idle-client eviction.
//! - [`NoopLimiter`]: admits everything; used when limiting is disabled.
//! - [`AdmissionLayer`]: Tower middleware that asks a `Limiter` before calling the
//!   wrapped service.
//!
//! # Architecture
//!
//! - **Middleware**: `AdmissionLayer` derives a client identifier from each request and
//!   doesn't know *how* limiting works, only that it should ask a `Limiter`.
//! - **Logic**: `RateLimiter` (in `fixed_window`) counts requests and runs the reset and
//!   cleanup loops.
//! - **Storage**: `ActivityStore` (in `store`) holds per-client state behind one lock.

use std::sync::Arc;

pub mod fixed_window;
pub mod middleware;
pub mod noop;
pub mod store;

pub use fixed_window::{Config, RateLimiter, DEFAULT_CLIENT_TIMEOUT, MIN_LIMIT_INTERVAL};
pub use middleware::{AdmissionLayer, AdmissionService, ClientKey, RemoteAddr};
pub use noop::NoopLimiter;
pub use store::{ActivityStore, ClientActivity};

/// Admission decision for a single request.
///
/// Called once per inbound request with the client's identifier. An empty identifier
/// is a valid bucket shared by every client whose identity could not be resolved.
pub trait Limiter: Send + Sync + std::fmt::Debug {
    /// Returns `true` if the request may proceed.
    fn allow(&self, client: &str) -> bool;
}

impl<L: Limiter + ?Sized> Limiter for Arc<L> {
    fn allow(&self, client: &str) -> bool {
        (**self).allow(client)
    }
}

impl<L: Limiter + ?Sized> Limiter for Box<L> {
    fn allow(&self, client: &str) -> bool {
        (**self).allow(client)
    }
}
