//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! gateway.toml
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → shared by value/Arc with every subsystem at startup
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads + validates
//!     → lifecycle::startup reconciles the static service table
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError};
pub use watcher::ConfigWatcher;
pub use schema::{
    AdminConfig, CircuitBreakerConfig, CorsConfig, GatewayConfig, HealthCheckConfig,
    ListenerConfig, LoadBalancingConfig, LogFormat, ObservabilityConfig, RateLimitConfig,
    RetryConfig, RoutingConfig, SecurityConfig, StaticServiceConfig, Strategy, TimeoutConfig,
};
