//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → request.rs (request ID, client IP)
//!     → handlers.rs (/, /health, /services)
//!     → proxy.rs (everything else: route, select, breaker, forward)
//!     → response.rs (strip hop-by-hop, envelopes)
//!     → Send to client
//! ```

pub mod handlers;
pub mod middleware;
pub mod proxy;
pub mod request;
pub mod response;
pub mod server;

pub use request::{MakeRequestUuid, X_REQUEST_ID};
pub use server::{build_router, GatewayState, HttpServer};
