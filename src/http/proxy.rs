//! Reverse proxy handler.
//!
//! # Data Flow
//! ```text
//! /api/v1/{service}/{rest}
//!     → ServiceRouter (resolve service, rewrite to /v1/{rest})
//!     → buffer body (limit → 413)
//!     → LoadBalancer.select (no healthy → 503)
//!     → CircuitBreaker.execute_with (open → 503, 5xx counted as failure)
//!     → upstream call with deadline (connect error → 502, timeout → 504)
//!     → relay status, headers and body
//! ```
//!
//! With retries enabled, idempotent requests are replayed on 502/503/504,
//! connect errors and timeouts. Circuit-open rejections are returned as-is.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, HeaderMap, HeaderValue, Method, Request, Uri},
    response::Response,
};
use hyper::body::Incoming;
use tokio_util::sync::CancellationToken;

use crate::error::{GatewayError, GatewayResult};
use crate::http::middleware::ServiceLabel;
use crate::http::request::{peer_addr, request_id, X_FORWARDED_FOR, X_GATEWAY_SERVICE, X_REQUEST_ID};
use crate::http::response::strip_hop_by_hop;
use crate::http::server::GatewayState;
use crate::observability::metrics;
use crate::resilience::retries::{is_retryable_method, is_retryable_status};
use crate::resilience::{with_deadline, AttemptError, BreakerError, RetryPolicy};
use crate::routing::RouteTarget;

enum UpstreamFailure {
    Connect(String),
    TimedOut,
}

/// What a failed attempt leaves behind when retries run out.
enum RetryFailure {
    /// An upstream 502/503/504, relayed verbatim.
    Relay(Response),
    Error(GatewayError),
}

pub async fn proxy_handler(State(state): State<GatewayState>, request: Request<Body>) -> Response {
    let request_id = request_id(request.headers()).map(str::to_owned);

    let target = match state.router.route(request.uri().path(), request.uri().query()) {
        Ok(target) => target,
        Err(err) => {
            tracing::debug!(path = %request.uri().path(), error = %err, "No route");
            return GatewayError::from(err).into_response_with(request_id.as_deref());
        }
    };

    tracing::debug!(
        service = %target.service,
        method = %request.method(),
        upstream_path = %target.path_and_query,
        "Proxying request"
    );

    let mut response = match forward(&state, &target, request, request_id.as_deref()).await {
        Ok(response) => response,
        Err(err) => err.into_response_with(request_id.as_deref()),
    };
    response.extensions_mut().insert(ServiceLabel(target.service));
    response
}

async fn forward(
    state: &GatewayState,
    target: &RouteTarget,
    request: Request<Body>,
    request_id: Option<&str>,
) -> GatewayResult<Response> {
    let peer = peer_addr(&request);
    let (parts, body) = request.into_parts();

    let limit = state.config.security.max_body_size;
    let body = axum::body::to_bytes(body, limit)
        .await
        .map_err(|_| GatewayError::PayloadTooLarge { limit })?;

    let headers = outbound_headers(&parts.headers, peer, request_id, &target.service);
    let call = UpstreamCall {
        state,
        service: &target.service,
        method: &parts.method,
        path_and_query: &target.path_and_query,
        headers: &headers,
        body: &body,
    };

    match &state.retry {
        Some(policy) if is_retryable_method(&parts.method) => call.send_with_retries(policy).await,
        _ => call.send().await,
    }
}

/// Inbound headers minus hop-by-hop, plus forwarding headers.
fn outbound_headers(
    inbound: &HeaderMap,
    peer: Option<SocketAddr>,
    request_id: Option<&str>,
    service: &str,
) -> HeaderMap {
    let mut headers = inbound.clone();
    strip_hop_by_hop(&mut headers);
    headers.remove(header::HOST);
    headers.remove(header::CONTENT_LENGTH);

    if let Some(peer) = peer {
        let ip = peer.ip().to_string();
        let forwarded = match headers.get(X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
            Some(existing) => format!("{}, {}", existing, ip),
            None => ip,
        };
        if let Ok(value) = HeaderValue::from_str(&forwarded) {
            headers.insert(X_FORWARDED_FOR, value);
        }
    }
    if let Some(id) = request_id.and_then(|id| HeaderValue::from_str(id).ok()) {
        headers.insert(X_REQUEST_ID, id);
    }
    if let Ok(value) = HeaderValue::from_str(service) {
        headers.insert(X_GATEWAY_SERVICE, value);
    }
    headers
}

struct UpstreamCall<'a> {
    state: &'a GatewayState,
    service: &'a str,
    method: &'a Method,
    path_and_query: &'a str,
    headers: &'a HeaderMap,
    body: &'a Bytes,
}

impl UpstreamCall<'_> {
    /// One attempt against one selected instance.
    async fn send(&self) -> GatewayResult<Response> {
        let instance = self.state.balancer.select(self.service)?;

        let uri: Uri = format!("http://{}{}", instance.authority(), self.path_and_query)
            .parse()
            .map_err(|e| GatewayError::Internal(format!("invalid upstream uri: {}", e)))?;
        let mut builder = Request::builder().method(self.method.clone()).uri(uri);
        if let Some(headers) = builder.headers_mut() {
            *headers = self.headers.clone();
        }
        let request = builder
            .body(Body::from(self.body.clone()))
            .map_err(|e| GatewayError::Internal(format!("failed to build upstream request: {}", e)))?;

        let client = &self.state.client;
        let deadline = self.state.deadlines.upstream;
        let breaker = self.state.breakers.get(self.service);

        let outcome = breaker
            .execute_with(
                || async move {
                    match with_deadline(deadline, client.request(request)).await {
                        Ok(Ok(response)) => Ok(response),
                        Ok(Err(e)) => Err(UpstreamFailure::Connect(e.to_string())),
                        Err(_) => Err(UpstreamFailure::TimedOut),
                    }
                },
                |result| matches!(result, Ok(response) if !response.status().is_server_error()),
            )
            .await;

        match outcome {
            Ok(response) => Ok(relay(response)),
            Err(BreakerError::Open) => {
                tracing::debug!(service = %self.service, "Circuit open, rejecting");
                Err(GatewayError::CircuitOpen(self.service.to_string()))
            }
            Err(BreakerError::Inner(UpstreamFailure::Connect(detail))) => {
                tracing::warn!(
                    service = %self.service,
                    instance = %instance.id,
                    error = %detail,
                    "Upstream connection failed"
                );
                Err(GatewayError::BadGateway {
                    service: self.service.to_string(),
                    detail,
                })
            }
            Err(BreakerError::Inner(UpstreamFailure::TimedOut)) => {
                tracing::warn!(
                    service = %self.service,
                    instance = %instance.id,
                    timeout_ms = deadline.as_millis() as u64,
                    "Upstream timed out"
                );
                Err(GatewayError::GatewayTimeout(self.service.to_string()))
            }
        }
    }

    async fn send_with_retries(&self, policy: &RetryPolicy) -> GatewayResult<Response> {
        let attempts = AtomicU32::new(0);
        let result = policy
            .run(&CancellationToken::new(), || {
                if attempts.fetch_add(1, Ordering::Relaxed) > 0 {
                    metrics::record_retry(self.service);
                }
                let call = self;
                async move {
                    match call.send().await {
                        Ok(response) if is_retryable_status(response.status()) => {
                            Err(AttemptError::Transient(RetryFailure::Relay(response)))
                        }
                        Ok(response) => Ok(response),
                        Err(err @ (GatewayError::BadGateway { .. } | GatewayError::GatewayTimeout(_))) => {
                            Err(AttemptError::Transient(RetryFailure::Error(err)))
                        }
                        Err(err) => Err(AttemptError::Permanent(RetryFailure::Error(err))),
                    }
                }
            })
            .await;

        match result {
            Ok(response) => Ok(response),
            Err(err) => match err.into_inner() {
                Some(RetryFailure::Relay(response)) => Ok(response),
                Some(RetryFailure::Error(err)) => Err(err),
                None => Err(GatewayError::Internal("retry cancelled".to_string())),
            },
        }
    }
}

fn relay(response: hyper::Response<Incoming>) -> Response {
    let (mut parts, body) = response.into_parts();
    strip_hop_by_hop(&mut parts.headers);
    Response::from_parts(parts, Body::new(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outbound_headers_forwarding() {
        let mut inbound = HeaderMap::new();
        inbound.insert(header::HOST, HeaderValue::from_static("gateway.local"));
        inbound.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
        inbound.insert(X_FORWARDED_FOR, HeaderValue::from_static("203.0.113.7"));
        inbound.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer t"));
        let peer: SocketAddr = "10.1.2.3:40000".parse().unwrap();

        let headers = outbound_headers(&inbound, Some(peer), Some("req-1"), "payment-service");

        assert!(!headers.contains_key(header::HOST));
        assert!(!headers.contains_key(header::CONNECTION));
        assert_eq!(headers[X_FORWARDED_FOR], "203.0.113.7, 10.1.2.3");
        assert_eq!(headers[X_REQUEST_ID], "req-1");
        assert_eq!(headers[X_GATEWAY_SERVICE], "payment-service");
        assert_eq!(headers[header::AUTHORIZATION], "Bearer t");
    }
}
