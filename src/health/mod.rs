//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Periodic timer (active.rs)
//!     → snapshot registry
//!     → GET <instance>/health, one future per instance
//!     → classify (state.rs)
//!     → ServiceRegistry::set_health
//! ```
//!
//! # Design Decisions
//! - Probes relabel instances, they never remove them
//! - No lock is held while a probe is in flight
//! - Health state is per-instance, not per-service

pub mod active;
pub mod state;

pub use active::HealthChecker;
pub use state::ProbeOutcome;
