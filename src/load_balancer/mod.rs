//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Router resolved service name
//!     → pool.rs (LoadBalancer: read healthy instances from registry)
//!     → Apply strategy:
//!         - round_robin.rs (rotate per service)
//!         - random.rs (uniform pick)
//!     → Return instance or NoHealthyInstances
//! ```
//!
//! # Design Decisions
//! - Strategies are stateless with respect to health; the registry is the
//!   only source of truth and is consulted on every call
//! - Unhealthy instances are filtered before the strategy runs

pub mod pool;
pub mod random;
pub mod round_robin;

use std::fmt::Debug;

use crate::registry::ServiceInstance;

pub use pool::LoadBalancer;

/// Picks an index into the healthy candidates of a service.
pub trait SelectionStrategy: Send + Sync + Debug {
    fn pick(&self, service: &str, candidates: &[ServiceInstance]) -> Option<usize>;
}
