//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by method, status, service
//! - `gateway_request_duration_seconds` (histogram): latency distribution
//! - `gateway_rate_limited_total` (counter): requests rejected with 429
//! - `gateway_instance_health` (gauge): 1=passing, 0.5=warning/unknown, 0=critical
//! - `gateway_circuit_state` (gauge): 0=closed, 1=half-open, 2=open
//! - `gateway_retries_total` (counter): proxy retries by service
//!
//! Until [`init_metrics`] installs a recorder every macro call is a no-op,
//! so library code and tests can record freely.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder};

use crate::registry::HealthStatus;
use crate::resilience::CircuitState;

const LATENCY_BUCKETS: &[f64] = &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0];

/// Install the Prometheus recorder and its scrape listener on `addr`.
/// Must run inside a tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(Matcher::Suffix("_duration_seconds".to_string()), LATENCY_BUCKETS)?
        .install()?;

    describe_counter!("gateway_requests_total", Unit::Count, "Requests handled by the gateway");
    describe_histogram!(
        "gateway_request_duration_seconds",
        Unit::Seconds,
        "End-to-end request latency"
    );
    describe_counter!("gateway_rate_limited_total", Unit::Count, "Requests rejected by the rate limiter");
    describe_gauge!("gateway_instance_health", "Last probe result per instance");
    describe_gauge!("gateway_circuit_state", "Circuit breaker state per dependency");
    describe_counter!("gateway_retries_total", Unit::Count, "Proxy attempts repeated after a transient failure");

    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, service: &str, start: Instant) {
    counter!(
        "gateway_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "service" => service.to_string()
    )
    .increment(1);
    histogram!("gateway_request_duration_seconds", "service" => service.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_rate_limited() {
    counter!("gateway_rate_limited_total").increment(1);
}

pub fn record_instance_health(service: &str, instance: &str, status: HealthStatus) {
    let value = match status {
        HealthStatus::Passing => 1.0,
        HealthStatus::Warning | HealthStatus::Unknown => 0.5,
        HealthStatus::Critical => 0.0,
    };
    gauge!(
        "gateway_instance_health",
        "service" => service.to_string(),
        "instance" => instance.to_string()
    )
    .set(value);
}

pub fn record_breaker_state(service: &str, state: CircuitState) {
    let value = match state {
        CircuitState::Closed => 0.0,
        CircuitState::HalfOpen => 1.0,
        CircuitState::Open => 2.0,
    };
    gauge!("gateway_circuit_state", "service" => service.to_string()).set(value);
}

pub fn record_retry(service: &str) {
    counter!("gateway_retries_total", "service" => service.to_string()).increment(1);
}
