//! Service instance model.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Health of one instance as last observed by the health checker.
///
/// Transitions are driven by probes only:
/// ```text
/// any ── 200 ─────────────────→ Passing
/// any ── other status ────────→ Warning
/// any ── connect error/timeout → Critical
/// ```
/// Newly registered instances start as `Unknown` and are routable until the
/// first probe says otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    #[default]
    Unknown,
    Passing,
    Warning,
    Critical,
}

impl HealthStatus {
    /// Whether the load balancer may pick an instance in this state.
    pub fn is_routable(self) -> bool {
        matches!(self, HealthStatus::Passing | HealthStatus::Unknown)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HealthStatus::Unknown => "unknown",
            HealthStatus::Passing => "passing",
            HealthStatus::Warning => "warning",
            HealthStatus::Critical => "critical",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One running process of a named backend service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInstance {
    pub id: String,
    #[serde(rename = "name")]
    pub service_name: String,
    pub address: String,
    pub port: u16,
    #[serde(default)]
    pub health: HealthStatus,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl ServiceInstance {
    pub fn new(
        service_name: impl Into<String>,
        id: impl Into<String>,
        address: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            id: id.into(),
            service_name: service_name.into(),
            address: address.into(),
            port,
            health: HealthStatus::Unknown,
            tags: Vec::new(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_health(mut self, health: HealthStatus) -> Self {
        self.health = health;
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_metadata(mut self, metadata: HashMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Base URL of the instance, e.g. `http://10.0.0.5:8083`.
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.address, self.port)
    }

    /// `host:port` authority used for outbound requests.
    pub fn authority(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routable_states() {
        assert!(HealthStatus::Unknown.is_routable());
        assert!(HealthStatus::Passing.is_routable());
        assert!(!HealthStatus::Warning.is_routable());
        assert!(!HealthStatus::Critical.is_routable());
    }

    #[test]
    fn serializes_with_wire_names() {
        let instance = ServiceInstance::new("payment-service", "payment-service-1", "localhost", 8083)
            .with_tags(["default"])
            .with_health(HealthStatus::Critical);
        let json = serde_json::to_value(&instance).unwrap();

        assert_eq!(json["name"], "payment-service");
        assert_eq!(json["health"], "critical");
        assert_eq!(json["port"], 8083);
        assert_eq!(instance.base_url(), "http://localhost:8083");
    }

    #[test]
    fn missing_health_deserializes_as_unknown() {
        let instance: ServiceInstance = serde_json::from_str(
            r#"{"id":"a","name":"fees-service","address":"127.0.0.1","port":8092}"#,
        )
        .unwrap();
        assert_eq!(instance.health, HealthStatus::Unknown);
        assert!(instance.tags.is_empty());
    }
}
