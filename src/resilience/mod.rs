//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to a dependency:
//!     → circuit_breaker.rs (admit or fail fast, track outcomes per dependency)
//!     → timeouts.rs (per-attempt deadline)
//!     → On transient failure: retries.rs (backoff.rs delay, then try again)
//! ```
//!
//! # Design Decisions
//! - Every external call has a deadline
//! - Retries are opt-in and only for idempotent requests
//! - Breakers are per logical dependency, not per instance

pub mod backoff;
pub mod circuit_breaker;
pub mod retries;
pub mod timeouts;

pub use circuit_breaker::{BreakerError, BreakerRegistry, BreakerSnapshot, CircuitBreaker, CircuitState};
pub use retries::{AttemptError, RetryError, RetryPolicy};
pub use timeouts::{with_deadline, DeadlineElapsed, Deadlines};
