use std::collections::HashMap;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{GatewayError, GatewayResult};
use crate::http::response::envelope;
use crate::http::server::GatewayState;
use crate::registry::ServiceInstance;
use crate::resilience::BreakerSnapshot;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub uptime_secs: u64,
    pub services: usize,
    pub instances: usize,
}

/// Body of `POST /admin/services`.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub id: String,
    pub address: String,
    pub port: u16,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl RegisterRequest {
    fn into_instance(self) -> GatewayResult<ServiceInstance> {
        if self.name.trim().is_empty() || self.id.trim().is_empty() {
            return Err(GatewayError::BadRequest("name and id must not be empty".to_string()));
        }
        if self.address.trim().is_empty() {
            return Err(GatewayError::BadRequest("address must not be empty".to_string()));
        }
        if self.port == 0 {
            return Err(GatewayError::BadRequest("port must be non-zero".to_string()));
        }
        Ok(ServiceInstance::new(self.name, self.id, self.address, self.port)
            .with_tags(self.tags)
            .with_metadata(self.metadata))
    }
}

pub async fn get_status(State(state): State<GatewayState>) -> Json<SystemStatus> {
    let services = state.registry.list_all_services();
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        uptime_secs: state.uptime().as_secs(),
        services: services.len(),
        instances: services.values().map(Vec::len).sum(),
    })
}

pub async fn get_services(State(state): State<GatewayState>) -> Json<Value> {
    Json(envelope("Registered services", state.registry.list_all_services()))
}

pub async fn register_service(
    State(state): State<GatewayState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> GatewayResult<(StatusCode, Json<Value>)> {
    let Json(request) = payload.map_err(|e| GatewayError::BadRequest(e.body_text()))?;
    let instance = request.into_instance()?;

    // Dynamic services get their breaker on registration rather than first call.
    state.breakers.get(&instance.service_name);
    state.registry.register(instance.clone());
    tracing::info!(service = %instance.service_name, id = %instance.id, "Instance registered via admin API");

    Ok((StatusCode::CREATED, Json(envelope("Instance registered", instance))))
}

pub async fn deregister_service(
    State(state): State<GatewayState>,
    Path((service, id)): Path<(String, String)>,
) -> GatewayResult<Json<Value>> {
    let removed = state.registry.deregister(&service, &id)?;
    tracing::info!(service = %service, id = %id, "Instance deregistered via admin API");
    Ok(Json(envelope("Instance deregistered", removed)))
}

pub async fn get_breakers(State(state): State<GatewayState>) -> Json<Vec<BreakerSnapshot>> {
    Json(state.breakers.snapshots())
}
