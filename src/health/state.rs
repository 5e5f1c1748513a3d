//! Mapping of probe outcomes to instance health.
//!
//! # State Transitions
//! ```text
//! HTTP 200                    → passing
//! any other HTTP status       → warning
//! connection error / timeout  → critical
//! ```
//!
//! One probe decides the status; there is no hysteresis, so a recovered
//! instance is routable again right after its next successful probe.

use axum::http::StatusCode;

use crate::registry::HealthStatus;

/// Result of a single health probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Responded(StatusCode),
    ConnectError(String),
    TimedOut,
}

impl ProbeOutcome {
    pub fn status(&self) -> HealthStatus {
        match self {
            ProbeOutcome::Responded(code) if *code == StatusCode::OK => HealthStatus::Passing,
            ProbeOutcome::Responded(_) => HealthStatus::Warning,
            ProbeOutcome::ConnectError(_) | ProbeOutcome::TimedOut => HealthStatus::Critical,
        }
    }
}
