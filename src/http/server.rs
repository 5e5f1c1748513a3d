//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build the shared gateway state
//! - Create the Axum router with the gateway endpoints and proxy fallback
//! - Wire up middleware in order
//! - Serve until the shutdown broadcast fires

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    middleware,
    routing::get,
    Router,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::GatewayConfig;
use crate::http::handlers;
use crate::http::middleware::{
    cors_middleware, deadline_middleware, metrics_middleware, panic_response, CorsHeaders,
};
use crate::http::proxy::proxy_handler;
use crate::http::request::{request_id, MakeRequestUuid};
use crate::load_balancer::LoadBalancer;
use crate::observability::metrics;
use crate::registry::ServiceRegistry;
use crate::resilience::{BreakerRegistry, CircuitState, Deadlines, RetryPolicy};
use crate::routing::ServiceRouter;
use crate::security::{rate_limit_middleware, security_headers_middleware, RateLimiter};

/// Shared state injected into handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub config: Arc<GatewayConfig>,
    pub registry: Arc<ServiceRegistry>,
    pub balancer: Arc<LoadBalancer>,
    pub breakers: Arc<BreakerRegistry>,
    pub router: Arc<ServiceRouter>,
    pub client: Client<HttpConnector, Body>,
    /// `None` when proxy retries are disabled.
    pub retry: Option<RetryPolicy>,
    pub deadlines: Deadlines,
    pub started_at: Instant,
}

impl GatewayState {
    pub fn new(config: GatewayConfig, registry: Arc<ServiceRegistry>) -> Self {
        let deadlines = Deadlines::from(&config.timeouts);

        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(deadlines.connect));
        let client = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(Duration::from_secs(90))
            .build(connector);

        let breakers = BreakerRegistry::new(config.circuit_breaker.clone()).with_state_change_hook(
            Arc::new(|service: &str, _from: CircuitState, to: CircuitState| {
                metrics::record_breaker_state(service, to)
            }),
        );
        // Statically configured dependencies get their breaker up front.
        for service in config.services.keys() {
            breakers.get(service);
        }

        let balancer = LoadBalancer::new(registry.clone(), config.load_balancing.strategy);
        let router = ServiceRouter::new(&config.routing, registry.clone());
        let retry = config.retries.enabled.then(|| RetryPolicy::from(&config.retries));

        Self {
            registry,
            balancer: Arc::new(balancer),
            breakers: Arc::new(breakers),
            router: Arc::new(router),
            client,
            retry,
            deadlines,
            started_at: Instant::now(),
            config: Arc::new(config),
        }
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(state: GatewayState) -> Self {
        Self {
            router: build_router(state),
        }
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve on `listener` until `shutdown` fires, then drain in-flight requests.
    pub async fn run(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) -> std::io::Result<()> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Build the Axum router with all middleware layers, outermost first.
pub fn build_router(state: GatewayState) -> Router {
    let config = state.config.clone();
    let cors = Arc::new(CorsHeaders::from_config(&config.cors));
    let limiter = Arc::new(RateLimiter::new(&config.rate_limit));

    let stack = ServiceBuilder::new()
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<Body>| {
            tracing::info_span!(
                "request",
                method = %request.method(),
                path = %request.uri().path(),
                request_id = request_id(request.headers()).unwrap_or("-"),
            )
        }))
        .layer(middleware::from_fn_with_state(
            config.security.enable_headers,
            security_headers_middleware,
        ))
        .layer(middleware::from_fn_with_state(cors, cors_middleware))
        .layer(middleware::from_fn_with_state(limiter, rate_limit_middleware))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn_with_state(
            state.deadlines.request,
            deadline_middleware,
        ));

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/services", get(handlers::list_services))
        .fallback(proxy_handler)
        .layer(RequestBodyLimitLayer::new(config.security.max_body_size))
        .with_state(state)
        .layer(stack)
}
