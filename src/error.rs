//! HTTP-facing error type.
//!
//! Every error the gateway itself produces is rendered as
//! `{"status":"error","message":...,"timestamp":...,"request_id":...}`.
//! Upstream error text never reaches the client; it is logged instead.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::http::response::timestamp;
use crate::registry::RegistryError;
use crate::routing::RouteError;

pub type GatewayResult<T> = Result<T, GatewayError>;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("route not found")]
    RouteNotFound,

    #[error("service '{0}' not found")]
    ServiceNotFound(String),

    #[error("instance '{id}' of service '{service}' not found")]
    InstanceNotFound { service: String, id: String },

    #[error("no healthy instances for service '{0}'")]
    NoHealthyInstances(String),

    #[error("circuit open for service '{0}'")]
    CircuitOpen(String),

    #[error("upstream connection to '{service}' failed: {detail}")]
    BadGateway { service: String, detail: String },

    #[error("upstream '{0}' timed out")]
    GatewayTimeout(String),

    #[error("request deadline of {0:?} exceeded")]
    DeadlineExceeded(std::time::Duration),

    #[error("request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("rate limit exceeded")]
    TooManyRequests,

    #[error("unauthorized")]
    Unauthorized,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::RouteNotFound
            | GatewayError::ServiceNotFound(_)
            | GatewayError::InstanceNotFound { .. } => StatusCode::NOT_FOUND,
            GatewayError::NoHealthyInstances(_) | GatewayError::CircuitOpen(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            GatewayError::BadGateway { .. } => StatusCode::BAD_GATEWAY,
            GatewayError::GatewayTimeout(_) | GatewayError::DeadlineExceeded(_) => {
                StatusCode::GATEWAY_TIMEOUT
            }
            GatewayError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            GatewayError::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::Unauthorized => StatusCode::UNAUTHORIZED,
            GatewayError::BadRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-safe message.
    pub fn user_message(&self) -> String {
        match self {
            GatewayError::RouteNotFound => "Route not found".to_string(),
            GatewayError::ServiceNotFound(name) => format!("Service '{}' not found", name),
            GatewayError::InstanceNotFound { service, id } => {
                format!("Instance '{}' of service '{}' not found", id, service)
            }
            GatewayError::NoHealthyInstances(name) => format!("Service '{}' unavailable", name),
            GatewayError::CircuitOpen(name) => {
                format!("Service '{}' temporarily unavailable (circuit open)", name)
            }
            GatewayError::BadGateway { service, .. } => format!("Upstream '{}' unreachable", service),
            GatewayError::GatewayTimeout(service) => format!("Upstream '{}' timed out", service),
            GatewayError::DeadlineExceeded(_) => "Request deadline exceeded".to_string(),
            GatewayError::PayloadTooLarge { limit } => {
                format!("Request body exceeds {} bytes", limit)
            }
            GatewayError::TooManyRequests => "Rate limit exceeded".to_string(),
            GatewayError::Unauthorized => "Unauthorized".to_string(),
            GatewayError::BadRequest(msg) => msg.clone(),
            GatewayError::Internal(_) => "Internal server error".to_string(),
        }
    }

    fn log(&self) {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::warn!(error = %self, status = status.as_u16(), "Request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }
    }

    /// Render with the request id attached.
    pub fn into_response_with(self, request_id: Option<&str>) -> Response {
        self.log();
        let status = self.status_code();
        (status, Json(error_body(&self.user_message(), request_id))).into_response()
    }
}

/// Standard error envelope.
pub fn error_body(message: &str, request_id: Option<&str>) -> serde_json::Value {
    let mut body = json!({
        "status": "error",
        "message": message,
        "timestamp": timestamp(),
    });
    if let Some(id) = request_id {
        body["request_id"] = json!(id);
    }
    body
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        self.into_response_with(None)
    }
}

impl From<RegistryError> for GatewayError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NoHealthyInstances(service) => GatewayError::NoHealthyInstances(service),
            RegistryError::InstanceNotFound { service, id } => GatewayError::InstanceNotFound { service, id },
        }
    }
}

impl From<RouteError> for GatewayError {
    fn from(err: RouteError) -> Self {
        match err {
            RouteError::MissingService => GatewayError::RouteNotFound,
            RouteError::UnknownService(name) => GatewayError::ServiceNotFound(name),
        }
    }
}
