//! CORS headers and preflight short-circuit.
//!
//! Every response carries the configured CORS headers. `OPTIONS` requests are
//! answered here with 200 and never reach the router.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderValue, Method, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::config::CorsConfig;

/// Pre-rendered header values.
#[derive(Debug, Clone)]
pub struct CorsHeaders {
    allow_origin: HeaderValue,
    allow_methods: HeaderValue,
    allow_headers: HeaderValue,
    expose_headers: Option<HeaderValue>,
}

impl CorsHeaders {
    /// Entries that are not valid header values are skipped with a warning.
    pub fn from_config(config: &CorsConfig) -> Self {
        Self {
            allow_origin: header_value(&config.allowed_origin).unwrap_or(HeaderValue::from_static("*")),
            allow_methods: header_value(&config.allowed_methods.join(", "))
                .unwrap_or(HeaderValue::from_static("GET, POST, PUT, DELETE, OPTIONS")),
            allow_headers: header_value(&config.allowed_headers.join(", "))
                .unwrap_or(HeaderValue::from_static("Content-Type, Authorization")),
            expose_headers: if config.exposed_headers.is_empty() {
                None
            } else {
                header_value(&config.exposed_headers.join(", "))
            },
        }
    }

    fn apply(&self, headers: &mut HeaderMap) {
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, self.allow_origin.clone());
        headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, self.allow_methods.clone());
        headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, self.allow_headers.clone());
        if let Some(expose) = &self.expose_headers {
            headers.insert(header::ACCESS_CONTROL_EXPOSE_HEADERS, expose.clone());
        }
    }
}

fn header_value(raw: &str) -> Option<HeaderValue> {
    match HeaderValue::from_str(raw) {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(value = %raw, "Ignoring invalid CORS header value");
            None
        }
    }
}

pub async fn cors_middleware(
    State(cors): State<Arc<CorsHeaders>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let mut response = if request.method() == Method::OPTIONS {
        StatusCode::OK.into_response()
    } else {
        next.run(request).await
    };
    cors.apply(response.headers_mut());
    response
}
