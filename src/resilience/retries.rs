//! Retry logic.
//!
//! # Responsibilities
//! - Re-run a single fallible call with exponential backoff + jitter
//! - Stop early on errors the caller marks permanent
//! - Return promptly when the caller cancels
//! - Decide which proxied requests may be retried at all
//!
//! # Design Decisions
//! - Never retry POST/PATCH (non-idempotent)
//! - Circuit-open rejections are permanent; the breaker already decided

use std::future::Future;
use std::time::Duration;

use axum::http::{Method, StatusCode};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::config::RetryConfig;
use crate::resilience::backoff::calculate_backoff;

/// Outcome of a single failed attempt, classified by the caller.
#[derive(Debug)]
pub enum AttemptError<E> {
    /// Worth another attempt.
    Transient(E),
    /// Retrying cannot help; stop now.
    Permanent(E),
}

#[derive(Debug, Error)]
pub enum RetryError<E> {
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: E },

    #[error("{0}")]
    Aborted(E),

    #[error("retry cancelled")]
    Cancelled,
}

impl<E> RetryError<E> {
    /// The downstream error, unless the caller cancelled.
    pub fn into_inner(self) -> Option<E> {
        match self {
            RetryError::Exhausted { last, .. } => Some(last),
            RetryError::Aborted(e) => Some(e),
            RetryError::Cancelled => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            multiplier: config.multiplier,
        }
    }
}

impl RetryPolicy {
    pub fn delay_for(&self, attempt: u32) -> Duration {
        calculate_backoff(attempt, self.base_delay, self.max_delay, self.multiplier)
    }

    /// Call `f` up to `max_retries + 1` times.
    pub async fn run<F, Fut, T, E>(&self, cancel: &CancellationToken, mut f: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AttemptError<E>>>,
    {
        let mut attempt = 0u32;
        loop {
            if cancel.is_cancelled() {
                return Err(RetryError::Cancelled);
            }

            let err = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(RetryError::Cancelled),
                result = f() => match result {
                    Ok(value) => return Ok(value),
                    Err(AttemptError::Permanent(e)) => return Err(RetryError::Aborted(e)),
                    Err(AttemptError::Transient(e)) => e,
                },
            };

            if attempt >= self.max_retries {
                return Err(RetryError::Exhausted {
                    attempts: attempt + 1,
                    last: err,
                });
            }

            let delay = self.delay_for(attempt);
            attempt += 1;
            tracing::debug!(attempt = attempt, delay_ms = delay.as_millis() as u64, "Retrying after backoff");

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(RetryError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

/// Whether a proxied request with this method may be replayed.
pub fn is_retryable_method(method: &Method) -> bool {
    matches!(
        *method,
        Method::GET | Method::HEAD | Method::OPTIONS | Method::PUT | Method::DELETE | Method::TRACE
    )
}

/// Upstream statuses worth another attempt.
pub fn is_retryable_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT
    )
}
