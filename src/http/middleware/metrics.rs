//! Request metrics.

use std::time::Instant;

use axum::{body::Body, http::Request, middleware::Next, response::Response};

use crate::observability::metrics;

/// Response extension naming the service a request was routed to.
#[derive(Debug, Clone)]
pub struct ServiceLabel(pub String);

pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();

    let response = next.run(request).await;

    let service = response
        .extensions()
        .get::<ServiceLabel>()
        .map(|label| label.0.as_str())
        .unwrap_or("none");
    metrics::record_request(&method, response.status().as_u16(), service, start);
    response
}
