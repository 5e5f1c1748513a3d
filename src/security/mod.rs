//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → rate_limit.rs (per-IP token bucket, 429 when empty)
//!     → Pass to routing
//! Outgoing response:
//!     → headers.rs (security response headers)
//! ```
//!
//! Request body size is capped by `RequestBodyLimitLayer` in the server stack.

pub mod headers;
pub mod rate_limit;

pub use headers::security_headers_middleware;
pub use rate_limit::{rate_limit_middleware, RateLimiter};
