//! Route lookup.
//!
//! # Responsibilities
//! - Split the request path into service segment and remainder
//! - Resolve the segment to a registered service name
//! - Return the resolved target or an explicit no-match
//!
//! # Design Decisions
//! - Resolution reads the live registry, so services registered at runtime
//!   are routable immediately
//! - The segment is tried as-is first, then with the service suffix

use std::sync::Arc;

use thiserror::Error;

use crate::config::RoutingConfig;
use crate::registry::ServiceRegistry;
use crate::routing::matcher::{rewrite_path, ApiPathMatcher};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    #[error("no service in request path")]
    MissingService,

    #[error("service '{0}' not found")]
    UnknownService(String),
}

/// Where a request should go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTarget {
    pub service: String,
    /// Upstream path and query, e.g. `/v1/escrows/123?expand=1`.
    pub path_and_query: String,
}

#[derive(Debug)]
pub struct ServiceRouter {
    matcher: ApiPathMatcher,
    upstream_prefix: String,
    service_suffix: String,
    registry: Arc<ServiceRegistry>,
}

impl ServiceRouter {
    pub fn new(config: &RoutingConfig, registry: Arc<ServiceRegistry>) -> Self {
        Self {
            matcher: ApiPathMatcher::new(config.api_prefix.clone()),
            upstream_prefix: config.upstream_prefix.clone(),
            service_suffix: config.service_suffix.clone(),
            registry,
        }
    }

    pub fn api_prefix(&self) -> &str {
        self.matcher.prefix()
    }

    /// Registered service name for a path segment, if any.
    pub fn resolve_service(&self, segment: &str) -> Option<String> {
        if self.registry.contains_service(segment) {
            return Some(segment.to_string());
        }
        if self.service_suffix.is_empty() || segment.ends_with(self.service_suffix.as_str()) {
            return None;
        }
        let suffixed = format!("{}{}", segment, self.service_suffix);
        self.registry.contains_service(&suffixed).then_some(suffixed)
    }

    pub fn route(&self, path: &str, query: Option<&str>) -> Result<RouteTarget, RouteError> {
        let parsed = self.matcher.matches(path).ok_or(RouteError::MissingService)?;
        let service = self
            .resolve_service(parsed.segment)
            .ok_or_else(|| RouteError::UnknownService(parsed.segment.to_string()))?;

        Ok(RouteTarget {
            service,
            path_and_query: rewrite_path(&self.upstream_prefix, parsed.rest, query),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ServiceInstance;

    fn router_with(services: &[&str]) -> ServiceRouter {
        let registry = Arc::new(ServiceRegistry::new());
        for (i, name) in services.iter().enumerate() {
            registry.register(ServiceInstance::new(*name, "1", "127.0.0.1", 8081 + i as u16));
        }
        ServiceRouter::new(&RoutingConfig::default(), registry)
    }

    #[test]
    fn resolves_short_name_via_suffix() {
        let router = router_with(&["escrow-service"]);
        let target = router.route("/api/v1/escrow/escrows/123", Some("expand=1")).unwrap();
        assert_eq!(target.service, "escrow-service");
        assert_eq!(target.path_and_query, "/v1/escrows/123?expand=1");
    }

    #[test]
    fn exact_name_wins_over_suffix() {
        let router = router_with(&["ledger", "ledger-service"]);
        assert_eq!(router.route("/api/v1/ledger/accounts", None).unwrap().service, "ledger");
        assert_eq!(
            router.route("/api/v1/ledger-service/accounts", None).unwrap().service,
            "ledger-service"
        );
    }

    #[test]
    fn unknown_and_malformed() {
        let router = router_with(&["payment-service"]);
        assert_eq!(
            router.route("/api/v1/escrow/v1/escrows/123", None),
            Err(RouteError::UnknownService("escrow".into()))
        );
        assert_eq!(router.route("/api/v1/", None), Err(RouteError::MissingService));
        assert_eq!(router.route("/other", None), Err(RouteError::MissingService));
    }
}
