use crate::rate_limit::Limiter;

/// Limiter that admits every request.
///
/// Stands in for [`RateLimiter`](crate::rate_limit::RateLimiter) when rate limiting is
/// disabled, so callers never branch on a missing limiter.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLimiter;

impl NoopLimiter {
    pub fn new() -> Self {
        Self
    }
}

impl Limiter for NoopLimiter {
    fn allow(&self, _client: &str) -> bool {
        true
    }
}
