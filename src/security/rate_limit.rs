//! Per-client rate limiting middleware.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};

use crate::config::RateLimitConfig;
use crate::error::GatewayError;
use crate::http::request::{client_ip, peer_addr, request_id};
use crate::observability::metrics;

/// Buckets idle this long are dropped on the next sweep.
const IDLE_EVICTION: Duration = Duration::from_secs(600);
const SWEEP_THRESHOLD: usize = 10_000;

/// A simple token bucket rate limiter.
struct TokenBucket {
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn new(capacity: f64) -> Self {
        Self {
            tokens: capacity,
            last_update: Instant::now(),
        }
    }

    fn try_acquire(&mut self, capacity: f64, refill_rate: f64) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f64();

        // Refill tokens
        self.tokens = (self.tokens + elapsed * refill_rate).min(capacity);
        self.last_update = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Token buckets keyed by client IP.
pub struct RateLimiter {
    enabled: bool,
    buckets: Mutex<HashMap<String, TokenBucket>>,
    /// Tokens per second.
    refill_rate: f64,
    capacity: f64,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            enabled: config.enabled,
            buckets: Mutex::new(HashMap::new()),
            refill_rate: f64::from(config.requests_per_minute) / 60.0,
            capacity: f64::from(config.burst_size.max(1)),
        }
    }

    /// Take one token for `key`. `false` means the request must be rejected.
    pub fn check(&self, key: &str) -> bool {
        if !self.enabled {
            return true;
        }

        let mut buckets = self.buckets.lock().unwrap_or_else(PoisonError::into_inner);
        if buckets.len() >= SWEEP_THRESHOLD {
            buckets.retain(|_, bucket| bucket.last_update.elapsed() < IDLE_EVICTION);
        }

        buckets
            .entry(key.to_string())
            .or_insert_with(|| TokenBucket::new(self.capacity))
            .try_acquire(self.capacity, self.refill_rate)
    }
}

/// Middleware function for per-IP rate limiting.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let key = client_ip(request.headers(), peer_addr(&request))
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    if limiter.check(&key) {
        return next.run(request).await;
    }

    tracing::warn!(client = %key, path = %request.uri().path(), "Rate limit exceeded");
    metrics::record_rate_limited();
    GatewayError::TooManyRequests.into_response_with(request_id(request.headers()))
}
