//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap backend calls with a deadline
//! - Keep timeout errors distinct from other errors
//!
//! Timed-out proxy attempts become 504 Gateway Timeout.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

use crate::config::TimeoutConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("deadline of {0:?} elapsed")]
pub struct DeadlineElapsed(pub Duration);

/// Deadlines applied to every outbound call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadlines {
    pub connect: Duration,
    pub upstream: Duration,
    pub request: Duration,
}

impl From<&TimeoutConfig> for Deadlines {
    fn from(config: &TimeoutConfig) -> Self {
        Self {
            connect: Duration::from_secs(config.connect_secs),
            upstream: Duration::from_secs(config.upstream_secs),
            request: Duration::from_secs(config.request_secs),
        }
    }
}

/// Run `fut` to completion or fail with [`DeadlineElapsed`]. The future is
/// dropped on expiry, which aborts any I/O it owns.
pub async fn with_deadline<F: Future>(limit: Duration, fut: F) -> Result<F::Output, DeadlineElapsed> {
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| DeadlineElapsed(limit))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn slow_future_times_out() {
        let limit = Duration::from_millis(20);
        let result = with_deadline(limit, tokio::time::sleep(Duration::from_secs(5))).await;
        assert_eq!(result, Err(DeadlineElapsed(limit)));
    }

    #[tokio::test]
    async fn fast_future_passes_through() {
        let result = with_deadline(Duration::from_secs(1), async { 7 }).await;
        assert_eq!(result, Ok(7));
    }

    #[test]
    fn deadlines_from_config() {
        let deadlines = Deadlines::from(&TimeoutConfig::default());
        assert_eq!(deadlines.connect, Duration::from_secs(5));
        assert_eq!(deadlines.upstream, Duration::from_secs(15));
        assert_eq!(deadlines.request, Duration::from_secs(30));
    }
}
