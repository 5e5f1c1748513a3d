//! Service registry subsystem.
//!
//! # Data Flow
//! ```text
//! startup / admin API ──register/deregister──┐
//!                                            ▼
//! health checker ──set_health──────→ ServiceRegistry (RwLock<HashMap>)
//!                                            │
//!             load balancer ←─list_healthy───┤
//!             /health, /services ←─list_all──┤
//!             subscribers ←─RegistryEvent────┘ (events.rs, outside the lock)
//! ```
//!
//! # Design Decisions
//! - Explicitly constructed and shared via `Arc`; no process-wide global
//! - One reader/writer lock over the whole map; writes only do bookkeeping
//! - Instances are never expired; health degrades, membership persists
//! - A service whose last instance is deregistered disappears

pub mod events;
pub mod instance;

use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use thiserror::Error;

pub use events::{EventKind, RegistryEvent, Subscription};
pub use instance::{HealthStatus, ServiceInstance};

use events::EventHub;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("service instance not found: {service}/{id}")]
    InstanceNotFound { service: String, id: String },

    #[error("no healthy instances found for service: {0}")]
    NoHealthyInstances(String),
}

/// In-memory directory of service instances.
#[derive(Debug, Default)]
pub struct ServiceRegistry {
    services: RwLock<HashMap<String, Vec<ServiceInstance>>>,
    events: EventHub,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Vec<ServiceInstance>>> {
        self.services.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Vec<ServiceInstance>>> {
        self.services.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or replace an instance (last write wins).
    pub fn register(&self, instance: ServiceInstance) {
        let service = instance.service_name.clone();
        let id = instance.id.clone();

        let (snapshot, replaced) = {
            let mut services = self.write();
            let bucket = services.entry(service.clone()).or_default();
            let replaced = match bucket.iter_mut().find(|existing| existing.id == instance.id) {
                Some(existing) => {
                    *existing = instance;
                    true
                }
                None => {
                    bucket.push(instance);
                    false
                }
            };
            (bucket.clone(), replaced)
        };

        if replaced {
            tracing::debug!(service = %service, id = %id, "Service instance re-registered");
        } else {
            tracing::info!(service = %service, id = %id, "Service instance registered");
        }

        self.events.publish(RegistryEvent {
            service,
            kind: EventKind::Registered { id },
            instances: snapshot,
        });
    }

    /// Remove an instance, returning it.
    pub fn deregister(&self, service: &str, id: &str) -> Result<ServiceInstance, RegistryError> {
        let not_found = || RegistryError::InstanceNotFound {
            service: service.to_string(),
            id: id.to_string(),
        };

        let (removed, snapshot) = {
            let mut services = self.write();
            let bucket = services.get_mut(service).ok_or_else(not_found)?;
            let index = bucket.iter().position(|i| i.id == id).ok_or_else(not_found)?;
            let removed = bucket.remove(index);
            let snapshot = bucket.clone();
            if bucket.is_empty() {
                services.remove(service);
            }
            (removed, snapshot)
        };

        tracing::info!(service = %service, id = %id, "Service instance deregistered");
        self.events.publish(RegistryEvent {
            service: service.to_string(),
            kind: EventKind::Deregistered { id: id.to_string() },
            instances: snapshot,
        });
        Ok(removed)
    }

    /// Update only the health of an existing instance.
    ///
    /// Fails for instances removed while a probe was in flight, so a late
    /// probe result never brings a deregistered instance back.
    pub fn set_health(&self, service: &str, id: &str, status: HealthStatus) -> Result<(), RegistryError> {
        let snapshot = {
            let mut services = self.write();
            let instance = services
                .get_mut(service)
                .and_then(|bucket| bucket.iter_mut().find(|i| i.id == id))
                .ok_or_else(|| RegistryError::InstanceNotFound {
                    service: service.to_string(),
                    id: id.to_string(),
                })?;
            let previous = instance.health;
            instance.health = status;
            if previous != status {
                tracing::info!(service = %service, id = %id, from = %previous, to = %status, "Instance health changed");
            }
            services.get(service).cloned().unwrap_or_default()
        };

        self.events.publish(RegistryEvent {
            service: service.to_string(),
            kind: EventKind::HealthChanged { id: id.to_string(), status },
            instances: snapshot,
        });
        Ok(())
    }

    /// Instances of `service` that may receive traffic.
    pub fn list_healthy(&self, service: &str) -> Result<Vec<ServiceInstance>, RegistryError> {
        let healthy: Vec<ServiceInstance> = self
            .read()
            .get(service)
            .map(|bucket| bucket.iter().filter(|i| i.health.is_routable()).cloned().collect())
            .unwrap_or_default();

        if healthy.is_empty() {
            return Err(RegistryError::NoHealthyInstances(service.to_string()));
        }
        Ok(healthy)
    }

    /// Every instance of `service`, regardless of health.
    pub fn list_all(&self, service: &str) -> Vec<ServiceInstance> {
        self.read().get(service).cloned().unwrap_or_default()
    }

    /// Snapshot of the whole registry, ordered by service name.
    pub fn list_all_services(&self) -> BTreeMap<String, Vec<ServiceInstance>> {
        self.read()
            .iter()
            .map(|(name, instances)| (name.clone(), instances.clone()))
            .collect()
    }

    pub fn contains_service(&self, service: &str) -> bool {
        self.read().contains_key(service)
    }

    pub fn service_count(&self) -> usize {
        self.read().len()
    }

    /// Subscribe to changes of one service.
    pub fn subscribe(&self, service: &str) -> Subscription {
        self.events.subscribe(service)
    }
}
