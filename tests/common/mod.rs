//! Shared utilities for integration tests: mock platform services and a
//! gateway bound to an ephemeral port.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use mesh_gateway::config::GatewayConfig;
use mesh_gateway::http::{GatewayState, HttpServer};
use mesh_gateway::lifecycle::Shutdown;
use mesh_gateway::registry::{HealthStatus, ServiceInstance, ServiceRegistry};

/// A mock service and the number of non-health requests it has served.
pub struct MockService {
    pub addr: SocketAddr,
    pub hits: Arc<AtomicUsize>,
}

impl MockService {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn instance(&self, service: &str, id: &str) -> ServiceInstance {
        ServiceInstance::new(service, id, self.addr.ip().to_string(), self.addr.port())
    }
}

/// Serve `app` on 127.0.0.1 with an OS-assigned port.
pub async fn spawn_app(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

/// Answers `/health` with 200 and echoes every other request back as JSON.
pub async fn echo_service() -> MockService {
    let hits = Arc::new(AtomicUsize::new(0));
    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .fallback(echo)
        .with_state(hits.clone());
    MockService {
        addr: spawn_app(app).await,
        hits,
    }
}

async fn echo(
    State(hits): State<Arc<AtomicUsize>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Json<Value> {
    hits.fetch_add(1, Ordering::SeqCst);
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_owned);
    Json(json!({
        "method": method.as_str(),
        "path": uri.path(),
        "query": uri.query(),
        "body": String::from_utf8_lossy(&body),
        "x_gateway_service": header("x-gateway-service"),
        "x_request_id": header("x-request-id"),
        "x_forwarded_for": header("x-forwarded-for"),
        "host": header("host"),
        "connection": header("connection"),
    }))
}

/// Answers every non-health request with `status`.
pub async fn status_service(status: StatusCode) -> MockService {
    scripted_service(move |_| status).await
}

/// Answers request number `n` (starting at 0) with `script(n)`.
pub async fn scripted_service<F>(script: F) -> MockService
where
    F: Fn(usize) -> StatusCode + Clone + Send + Sync + 'static,
{
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .fallback(move || {
            let counter = counter.clone();
            let script = script.clone();
            async move {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                let status = script(n);
                (status, Json(json!({ "attempt": n, "status": status.as_u16() })))
            }
        });
    MockService {
        addr: spawn_app(app).await,
        hits,
    }
}

/// `/health` answers with whatever status is currently stored in the handle.
pub async fn switchable_health_service(initial: StatusCode) -> (SocketAddr, Arc<AtomicU16>) {
    let status = Arc::new(AtomicU16::new(initial.as_u16()));
    let current = status.clone();
    let app = Router::new().route(
        "/health",
        get(move || {
            let current = current.clone();
            async move {
                StatusCode::from_u16(current.load(Ordering::SeqCst)).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }),
    );
    (spawn_app(app).await, status)
}

/// Accepts connections and never writes a byte.
pub async fn silent_service() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    addr
}

/// An address nothing listens on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// Defaults with background work off and generous limits.
pub fn test_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.health_check.enabled = false;
    config.observability.metrics_enabled = false;
    config.rate_limit.requests_per_minute = 100_000;
    config.rate_limit.burst_size = 100_000;
    config.timeouts.upstream_secs = 2;
    config.admin.api_key = "test-admin-key-0123456789".to_string();
    config
}

/// Register `instance` and mark it passing.
pub fn register_passing(registry: &ServiceRegistry, instance: ServiceInstance) {
    registry.register(instance.with_health(HealthStatus::Passing));
}

pub struct TestGateway {
    pub addr: SocketAddr,
    pub state: GatewayState,
    pub shutdown: Arc<Shutdown>,
}

impl TestGateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestGateway {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Serve a gateway over `registry` on an ephemeral port.
pub async fn spawn_gateway(config: GatewayConfig, registry: Arc<ServiceRegistry>) -> TestGateway {
    let state = GatewayState::new(config, registry);
    let shutdown = Arc::new(Shutdown::new());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = HttpServer::new(state.clone());
    let signal = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, signal).await;
    });

    TestGateway {
        addr,
        state,
        shutdown,
    }
}

pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}
