//! Gateway's own endpoints: `/`, `/health` and `/services`.

use std::collections::BTreeMap;

use axum::{extract::State, Json};
use serde::Serialize;
use serde_json::{json, Value};

use crate::http::response::{envelope, timestamp};
use crate::http::server::GatewayState;
use crate::registry::{HealthStatus, ServiceInstance};

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub gateway: GatewayInfo,
    pub services: BTreeMap<String, ServiceHealth>,
    pub summary: HealthSummary,
}

#[derive(Debug, Serialize)]
pub struct GatewayInfo {
    pub uptime_secs: u64,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct ServiceHealth {
    pub status: &'static str,
    pub total_instances: usize,
    pub healthy_instances: usize,
    pub instances: Vec<ServiceInstance>,
}

#[derive(Debug, Serialize)]
pub struct HealthSummary {
    pub total_services: usize,
    pub healthy_services: usize,
}

/// Aggregate registry state. Only `passing` instances count as healthy here,
/// and the gateway reports healthy while at least one service is.
pub fn health_report(state: &GatewayState) -> HealthReport {
    let services: BTreeMap<String, ServiceHealth> = state
        .registry
        .list_all_services()
        .into_iter()
        .map(|(name, instances)| {
            let healthy_instances = instances
                .iter()
                .filter(|i| i.health == HealthStatus::Passing)
                .count();
            let health = ServiceHealth {
                status: if healthy_instances > 0 { "healthy" } else { "unhealthy" },
                total_instances: instances.len(),
                healthy_instances,
                instances,
            };
            (name, health)
        })
        .collect();

    let healthy_services = services.values().filter(|s| s.healthy_instances > 0).count();
    HealthReport {
        status: if healthy_services > 0 { "healthy" } else { "unhealthy" },
        gateway: GatewayInfo {
            uptime_secs: state.uptime().as_secs(),
            timestamp: timestamp(),
        },
        summary: HealthSummary {
            total_services: services.len(),
            healthy_services,
        },
        services,
    }
}

pub async fn health(State(state): State<GatewayState>) -> Json<HealthReport> {
    Json(health_report(&state))
}

pub async fn list_services(State(state): State<GatewayState>) -> Json<Value> {
    let services = state.registry.list_all_services();
    Json(envelope("Registered services", services))
}

pub async fn root(State(state): State<GatewayState>) -> Json<Value> {
    let prefix = state.router.api_prefix();
    let services: Vec<String> = state.registry.list_all_services().into_keys().collect();
    Json(envelope(
        "Service mesh API gateway",
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "uptime_secs": state.uptime().as_secs(),
            "services": services,
            "endpoints": {
                "health": "/health",
                "services": "/services",
                "api": format!("{}/{{service}}/*", prefix),
            },
        }),
    ))
}
