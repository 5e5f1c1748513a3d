//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (path, query)
//!     → matcher.rs (split `/api/v1/{service}/{rest}`)
//!     → router.rs (resolve service name against the registry)
//!     → Return: RouteTarget { service, upstream path } or RouteError
//! ```
//!
//! # Design Decisions
//! - No regex in hot path (prefix matching only)
//! - Deterministic: same input and registry state always give the same target

pub mod matcher;
pub mod router;

pub use router::{RouteError, RouteTarget, ServiceRouter};
