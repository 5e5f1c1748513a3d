//! Instance selection over the live registry.
//!
//! # Responsibilities
//! - Ask the registry for the currently healthy instances of a service
//! - Apply the configured strategy to pick one
//! - Format the chosen instance as a base URL

use std::sync::Arc;

use crate::config::Strategy;
use crate::load_balancer::{random::Random, round_robin::RoundRobin, SelectionStrategy};
use crate::registry::{RegistryError, ServiceInstance, ServiceRegistry};

/// Picks one healthy instance per call.
///
/// Nothing is cached: every call re-reads the registry, so an instance the
/// health checker just marked unhealthy is excluded from the very next pick.
#[derive(Debug)]
pub struct LoadBalancer {
    registry: Arc<ServiceRegistry>,
    strategy: Box<dyn SelectionStrategy>,
}

impl LoadBalancer {
    pub fn new(registry: Arc<ServiceRegistry>, strategy: Strategy) -> Self {
        let strategy: Box<dyn SelectionStrategy> = match strategy {
            Strategy::RoundRobin => Box::new(RoundRobin::new()),
            Strategy::Random => Box::new(Random::new()),
        };
        Self::with_strategy(registry, strategy)
    }

    pub fn with_strategy(registry: Arc<ServiceRegistry>, strategy: Box<dyn SelectionStrategy>) -> Self {
        Self { registry, strategy }
    }

    pub fn registry(&self) -> &Arc<ServiceRegistry> {
        &self.registry
    }

    /// Select one routable instance of `service`.
    pub fn select(&self, service: &str) -> Result<ServiceInstance, RegistryError> {
        let mut healthy = self.registry.list_healthy(service)?;
        match self.strategy.pick(service, &healthy) {
            Some(index) if index < healthy.len() => Ok(healthy.swap_remove(index)),
            _ => {
                tracing::debug!(service = %service, candidates = healthy.len(), "Strategy returned no instance");
                Err(RegistryError::NoHealthyInstances(service.to_string()))
            }
        }
    }

    /// Base URL (`http://address:port`) of a selected instance.
    pub fn get_endpoint(&self, service: &str) -> Result<String, RegistryError> {
        self.select(service).map(|instance| instance.base_url())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::HealthStatus;

    fn registry_with(states: &[(&str, HealthStatus)]) -> Arc<ServiceRegistry> {
        let registry = Arc::new(ServiceRegistry::new());
        for (i, (id, health)) in states.iter().enumerate() {
            registry.register(
                ServiceInstance::new("payment", *id, "127.0.0.1", 9001 + i as u16).with_health(*health),
            );
        }
        registry
    }

    #[test]
    fn select_skips_unroutable_instances() {
        let registry = registry_with(&[
            ("a", HealthStatus::Critical),
            ("b", HealthStatus::Passing),
            ("c", HealthStatus::Warning),
        ]);
        for strategy in [Strategy::RoundRobin, Strategy::Random] {
            let lb = LoadBalancer::new(registry.clone(), strategy);
            for _ in 0..20 {
                assert_eq!(lb.select("payment").unwrap().id, "b");
            }
        }
    }

    #[test]
    fn all_critical_is_no_healthy_instances() {
        let registry = registry_with(&[("a", HealthStatus::Critical), ("b", HealthStatus::Critical)]);
        let lb = LoadBalancer::new(registry, Strategy::RoundRobin);
        assert_eq!(
            lb.select("payment"),
            Err(RegistryError::NoHealthyInstances("payment".into()))
        );
    }

    #[test]
    fn status_change_applies_to_next_select() {
        let registry = registry_with(&[("a", HealthStatus::Passing), ("b", HealthStatus::Passing)]);
        let lb = LoadBalancer::new(registry.clone(), Strategy::RoundRobin);
        lb.select("payment").unwrap();

        registry.set_health("payment", "a", HealthStatus::Critical).unwrap();
        for _ in 0..10 {
            assert_eq!(lb.select("payment").unwrap().id, "b");
        }
    }

    #[test]
    fn endpoint_is_formatted_base_url() {
        let registry = registry_with(&[("a", HealthStatus::Unknown)]);
        let lb = LoadBalancer::new(registry, Strategy::RoundRobin);
        assert_eq!(lb.get_endpoint("payment").unwrap(), "http://127.0.0.1:9001");
    }
}
