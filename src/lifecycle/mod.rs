//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     config → registry seeded → breakers → health checker → listeners
//!
//! Shutdown (shutdown.rs):
//!     Signal received → broadcast → health checker exits, servers drain
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{reconcile_static_services, seed_registry, Gateway, ReconcileSummary};
