//! Upstream match-data access.
//!
//! - `source`: the provider seam ([`MatchSource`]) and its HTTP implementation
//! - `client`: cache-fronted, retrying client composed over a source

use std::time::Duration;

use thiserror::Error;

pub mod client;
pub mod source;

pub use client::{RecentMatches, UpstreamClient};
pub use source::{HttpMatchSource, MatchSource};

use crate::config::UpstreamConfig;

/// Longest we will honour a provider's `Retry-After`.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(30);

/// Errors that can occur talking to the provider.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Provider error (HTTP {status}): {message}")]
    Upstream { status: u16, message: String },

    #[error("Transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected response shape: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl UpstreamError {
    /// Map a non-success HTTP status to an error. The provider's message body
    /// is not carried over.
    pub fn from_status(status: u16, retry_after_secs: Option<u64>, what: &str) -> Self {
        match status {
            404 => UpstreamError::NotFound(what.to_string()),
            429 => UpstreamError::RateLimited {
                retry_after_secs: retry_after_secs.unwrap_or(60),
            },
            _ => UpstreamError::Upstream {
                status,
                message: reqwest::StatusCode::from_u16(status)
                    .ok()
                    .and_then(|s| s.canonical_reason())
                    .unwrap_or("Unknown")
                    .to_string(),
            },
        }
    }

    /// Whether the same request may succeed if repeated.
    pub fn is_retryable(&self) -> bool {
        match self {
            UpstreamError::RateLimited { .. } => true,
            UpstreamError::Upstream { status, .. } => *status >= 500,
            UpstreamError::Http(e) => e.is_timeout() || e.is_connect(),
            UpstreamError::Timeout(_) => true,
            _ => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, UpstreamError::NotFound(_))
    }
}

/// Retry policy for provider calls.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 1000,
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &UpstreamConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_delay_ms: config.initial_retry_delay_ms,
            backoff_multiplier: config.backoff_multiplier,
        }
    }

    /// No retries at all.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            initial_delay_ms: 0,
            backoff_multiplier: 1.0,
        }
    }

    /// Delay before retry number `attempt` (0-based). A rate-limit response
    /// stretches the delay to its `Retry-After`, capped.
    pub fn delay_for(&self, attempt: u32, error: &UpstreamError) -> Duration {
        let backoff = self.initial_delay_ms as f64 * self.backoff_multiplier.powi(attempt as i32);
        let backoff = Duration::from_millis(backoff.min(u64::MAX as f64) as u64);

        match error {
            UpstreamError::RateLimited { retry_after_secs } => {
                backoff.max(Duration::from_secs(*retry_after_secs).min(MAX_RETRY_AFTER))
            }
            _ => backoff,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_mapping() {
        assert!(UpstreamError::from_status(404, None, "account").is_not_found());
        assert!(matches!(
            UpstreamError::from_status(429, Some(5), "x"),
            UpstreamError::RateLimited { retry_after_secs: 5 }
        ));
        assert!(matches!(
            UpstreamError::from_status(429, None, "x"),
            UpstreamError::RateLimited { retry_after_secs: 60 }
        ));
        match UpstreamError::from_status(503, None, "x") {
            UpstreamError::Upstream { status, message } => {
                assert_eq!(status, 503);
                assert_eq!(message, "Service Unavailable");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_is_retryable() {
        assert!(UpstreamError::RateLimited { retry_after_secs: 1 }.is_retryable());
        assert!(UpstreamError::from_status(502, None, "x").is_retryable());
        assert!(!UpstreamError::from_status(400, None, "x").is_retryable());
        assert!(!UpstreamError::NotFound("x".into()).is_retryable());
        assert!(UpstreamError::Timeout(Duration::from_secs(15)).is_retryable());
    }

    #[test]
    fn test_retry_policy_default() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.initial_delay_ms, 1000);
    }

    #[test]
    fn test_retry_policy_backoff() {
        let policy = RetryPolicy::default();
        let err = UpstreamError::from_status(500, None, "x");
        assert_eq!(policy.delay_for(0, &err), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(1, &err), Duration::from_millis(2000));
        assert_eq!(policy.delay_for(2, &err), Duration::from_millis(4000));
    }

    #[test]
    fn test_retry_policy_honours_retry_after_with_cap() {
        let policy = RetryPolicy::default();
        let short = UpstreamError::RateLimited { retry_after_secs: 5 };
        let long = UpstreamError::RateLimited { retry_after_secs: 600 };

        assert_eq!(policy.delay_for(0, &short), Duration::from_secs(5));
        assert_eq!(policy.delay_for(0, &long), MAX_RETRY_AFTER);
    }
}
