//! Overall request deadline.
//!
//! Covers retries and backoff as a whole; an expired request gets a JSON 504
//! and the in-flight upstream call is dropped.

use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};

use crate::error::GatewayError;
use crate::http::request::request_id;
use crate::resilience::with_deadline;

pub async fn deadline_middleware(
    State(limit): State<Duration>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let request_id = request_id(request.headers()).map(str::to_owned);
    let path = request.uri().path().to_owned();

    match with_deadline(limit, next.run(request)).await {
        Ok(response) => response,
        Err(elapsed) => {
            tracing::warn!(path = %path, error = %elapsed, "Request deadline exceeded");
            GatewayError::DeadlineExceeded(limit).into_response_with(request_id.as_deref())
        }
    }
}
