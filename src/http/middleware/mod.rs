//! Gateway middleware.
//!
//! Order in the server stack, outermost first: recovery, request id,
//! request logging, security headers, cors, rate limit, metrics, then
//! the request deadline; the body limit sits on the routes themselves.

pub mod cors;
pub mod deadline;
pub mod metrics;
pub mod recovery;

pub use cors::{cors_middleware, CorsHeaders};
pub use deadline::deadline_middleware;
pub use metrics::{metrics_middleware, ServiceLabel};
pub use recovery::panic_response;
