//! Configuration validation.
//!
//! Serde handles syntax; this module checks value ranges and addresses.
//! All problems are reported together rather than stopping at the first one.

use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::GatewayConfig;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_socket_addr(&mut errors, "listener.bind_address", &config.listener.bind_address);

    for (name, service) in &config.services {
        let field = format!("services.{}", name);
        if name.is_empty() || name.contains('/') {
            errors.push(ValidationError::new(&field, "service name must be a non-empty path segment"));
        }
        if service.port == 0 {
            errors.push(ValidationError::new(format!("{}.port", field), "port must be non-zero"));
        }
        let base = format!("http://{}:{}", service.address, service.port);
        if service.address.is_empty() || Url::parse(&base).is_err() {
            errors.push(ValidationError::new(
                format!("{}.address", field),
                format!("'{}' is not a valid host", service.address),
            ));
        }
    }

    if !config.routing.api_prefix.starts_with('/') {
        errors.push(ValidationError::new("routing.api_prefix", "must start with '/'"));
    }
    if !config.routing.upstream_prefix.starts_with('/') {
        errors.push(ValidationError::new("routing.upstream_prefix", "must start with '/'"));
    }

    let hc = &config.health_check;
    if hc.interval_ms == 0 {
        errors.push(ValidationError::new("health_check.interval_ms", "must be greater than 0"));
    }
    if hc.timeout_ms == 0 {
        errors.push(ValidationError::new("health_check.timeout_ms", "must be greater than 0"));
    }
    if !hc.path.starts_with('/') {
        errors.push(ValidationError::new("health_check.path", "must start with '/'"));
    }

    let cb = &config.circuit_breaker;
    if cb.failure_threshold == 0 {
        errors.push(ValidationError::new("circuit_breaker.failure_threshold", "must be greater than 0"));
    }
    if cb.success_threshold == 0 {
        errors.push(ValidationError::new("circuit_breaker.success_threshold", "must be greater than 0"));
    }

    let retries = &config.retries;
    if retries.multiplier < 1.0 {
        errors.push(ValidationError::new("retries.multiplier", "must be at least 1.0"));
    }
    if retries.base_delay_ms > retries.max_delay_ms {
        errors.push(ValidationError::new("retries.base_delay_ms", "must not exceed retries.max_delay_ms"));
    }

    if config.timeouts.upstream_secs == 0 || config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts", "upstream_secs and request_secs must be greater than 0"));
    }
    if config.timeouts.request_secs < config.timeouts.upstream_secs {
        errors.push(ValidationError::new(
            "timeouts.request_secs",
            "must not be shorter than timeouts.upstream_secs",
        ));
    }

    if config.rate_limit.enabled
        && (config.rate_limit.requests_per_minute == 0 || config.rate_limit.burst_size == 0)
    {
        errors.push(ValidationError::new(
            "rate_limit",
            "requests_per_minute and burst_size must be greater than 0 when enabled",
        ));
    }

    if config.observability.metrics_enabled {
        check_socket_addr(&mut errors, "observability.metrics_address", &config.observability.metrics_address);
    }

    if config.admin.enabled {
        check_socket_addr(&mut errors, "admin.bind_address", &config.admin.bind_address);
        if config.admin.api_key.len() < 16 {
            errors.push(ValidationError::new("admin.api_key", "must be at least 16 characters"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_socket_addr(errors: &mut Vec<ValidationError>, field: &str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(field, format!("'{}' is not a socket address", value)));
    }
}
