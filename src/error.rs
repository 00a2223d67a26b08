//! Error types for limiter construction and the admission middleware
use std::fmt;
use std::time::Duration;

/// Rejected limiter configuration. Each violated rule has its own variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// `limit` must be > 0.
    #[error("rate limit must be greater than zero (got {provided})")]
    InvalidLimit {
        /// Value provided by caller.
        provided: u32,
    },
    /// `limit_interval` must be at least one second.
    #[error("limit interval must be at least one second (got {provided:?})")]
    InvalidLimitInterval {
        /// Value provided by caller.
        provided: Duration,
    },
    /// `client_timeout` must be strictly greater than `limit_interval`.
    #[error(
        "client timeout must be greater than limit interval (got {provided:?}, interval {limit_interval:?})"
    )]
    InvalidClientTimeout {
        /// Value provided by caller.
        provided: Duration,
        /// Interval it was compared against.
        limit_interval: Duration,
    },
}

/// Error returned by [`AdmissionService`](crate::rate_limit::AdmissionService).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmissionError<E> {
    /// The client exceeded its limit for the current interval.
    Rejected { client: String },
    /// The wrapped service failed
    Inner(E),
}

impl<E: fmt::Display> fmt::Display for AdmissionError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejected { client } if client.is_empty() => {
                write!(f, "too many requests from unidentified clients")
            }
            Self::Rejected { client } => write!(f, "too many requests from client '{}'", client),
            Self::Inner(e) => write!(f, "{}", e),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for AdmissionError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Inner(e) => Some(e),
            Self::Rejected { .. } => None,
        }
    }
}

impl<E> AdmissionError<E> {
    /// Check if the request was turned away by the limiter.
    ///
    /// HTTP services map this to `429 Too Many Requests`.
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }
    /// Check if this error wraps an inner error.
    pub fn is_inner(&self) -> bool {
        matches!(self, Self::Inner(_))
    }
    /// Client identifier of a rejected request.
    pub fn rejected_client(&self) -> Option<&str> {
        match self {
            Self::Rejected { client } => Some(client),
            _ => None,
        }
    }
    /// Get the inner error if this is an Inner variant
    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::Inner(e) => Some(e),
            _ => None,
        }
    }
    /// Borrow the inner error if present.
    pub fn as_inner(&self) -> Option<&E> {
        match self {
            Self::Inner(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;
    use std::io;

    #[test]
    fn config_errors_are_distinct_and_descriptive() {
        let limit = ConfigError::InvalidLimit { provided: 0 };
        let interval = ConfigError::InvalidLimitInterval { provided: Duration::from_millis(500) };
        let timeout = ConfigError::InvalidClientTimeout {
            provided: Duration::from_secs(1),
            limit_interval: Duration::from_secs(1),
        };
        assert_ne!(limit, interval);
        assert_ne!(interval, timeout);
        assert!(limit.to_string().contains("greater than zero"));
        assert!(interval.to_string().contains("at least one second"));
        assert!(interval.to_string().contains("500ms"));
        assert!(timeout.to_string().contains("greater than limit interval"));
    }

    #[test]
    fn rejected_display_names_the_client() {
        let err: AdmissionError<io::Error> = AdmissionError::Rejected { client: "10.1.2.3".into() };
        let msg = err.to_string();
        assert!(msg.contains("too many requests"));
        assert!(msg.contains("10.1.2.3"));
        assert!(err.is_rejected());
        assert_eq!(err.rejected_client(), Some("10.1.2.3"));
        assert!(err.source().is_none());
    }

    #[test]
    fn rejected_display_for_shared_bucket() {
        let err: AdmissionError<io::Error> = AdmissionError::Rejected { client: String::new() };
        assert_eq!(err.to_string(), "too many requests from unidentified clients");
    }

    #[test]
    fn inner_error_passes_through() {
        let err = AdmissionError::Inner(io::Error::new(io::ErrorKind::Other, "backend down"));
        assert!(err.is_inner());
        assert!(!err.is_rejected());
        assert_eq!(err.to_string(), "backend down");
        assert!(err.source().is_some());
        assert_eq!(err.as_inner().map(|e| e.kind()), Some(io::ErrorKind::Other));
        assert_eq!(err.into_inner().unwrap().to_string(), "backend down");
    }
}
