//! Mesh gateway library.
//!
//! API gateway and service-mesh control layer for a fleet of platform
//! services: registry, active health checks, instance selection, per-dependency
//! circuit breakers, retries and an HTTP front door that proxies
//! `/api/v1/<service>/...` to a healthy instance.

pub mod admin;
pub mod client;
pub mod config;
pub mod error;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod load_balancer;
pub mod observability;
pub mod registry;
pub mod resilience;
pub mod routing;
pub mod security;

pub use client::{ClientError, DependencyClient};
pub use config::schema::GatewayConfig;
pub use error::{GatewayError, GatewayResult};
pub use health::HealthChecker;
pub use http::{GatewayState, HttpServer};
pub use lifecycle::{Gateway, Shutdown};
pub use load_balancer::LoadBalancer;
pub use registry::{HealthStatus, ServiceInstance, ServiceRegistry};
pub use resilience::{CircuitBreaker, CircuitState, RetryPolicy};
