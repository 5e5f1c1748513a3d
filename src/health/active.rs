//! Active health checking.
//!
//! # Responsibilities
//! - Periodically probe every registered instance
//! - Write the resulting status back into the registry

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::Request;
use futures_util::future::join_all;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::sync::broadcast;
use tokio::time::{self, MissedTickBehavior};

use crate::config::HealthCheckConfig;
use crate::health::state::ProbeOutcome;
use crate::observability::metrics;
use crate::registry::{ServiceInstance, ServiceRegistry};

pub struct HealthChecker {
    registry: Arc<ServiceRegistry>,
    config: HealthCheckConfig,
    client: Client<HttpConnector, Body>,
}

impl HealthChecker {
    pub fn new(registry: Arc<ServiceRegistry>, config: HealthCheckConfig) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(config.timeout()));
        let client = Client::builder(TokioExecutor::new())
            .pool_max_idle_per_host(0)
            .build(connector);

        Self {
            registry,
            config,
            client,
        }
    }

    /// Probe on every tick until shutdown is broadcast.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        if !self.config.enabled {
            tracing::info!("Active health checks disabled");
            return;
        }

        tracing::info!(
            interval_ms = self.config.interval_ms,
            timeout_ms = self.config.timeout_ms,
            path = %self.config.path,
            "Health checker starting"
        );

        let mut ticker = time::interval(self.config.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.probe_all().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health checker received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Run one tick: probe every instance concurrently and record results.
    ///
    /// The fan-out as a whole is bounded by the tick interval; probes still
    /// pending at that point are abandoned and their instances keep their
    /// previous status. Returns the number of instances probed.
    pub async fn probe_all(&self) -> usize {
        let instances: Vec<ServiceInstance> = self
            .registry
            .list_all_services()
            .into_values()
            .flatten()
            .collect();
        let count = instances.len();
        if count == 0 {
            return 0;
        }

        let probes = instances.iter().map(|instance| self.check_and_record(instance));
        if time::timeout(self.config.interval(), join_all(probes)).await.is_err() {
            tracing::warn!(instances = count, "Health check round exceeded the tick interval");
        }
        count
    }

    async fn check_and_record(&self, instance: &ServiceInstance) {
        let outcome = self.probe(instance).await;
        let status = outcome.status();

        match &outcome {
            ProbeOutcome::Responded(code) if !code.is_success() => {
                tracing::warn!(service = %instance.service_name, id = %instance.id, status = %code, "Health check failed: non-success status");
            }
            ProbeOutcome::ConnectError(e) => {
                tracing::warn!(service = %instance.service_name, id = %instance.id, error = %e, "Health check failed: connection error");
            }
            ProbeOutcome::TimedOut => {
                tracing::warn!(service = %instance.service_name, id = %instance.id, "Health check failed: timeout");
            }
            ProbeOutcome::Responded(_) => {}
        }

        match self.registry.set_health(&instance.service_name, &instance.id, status) {
            Ok(()) => metrics::record_instance_health(&instance.service_name, &instance.id, status),
            Err(_) => {
                tracing::debug!(service = %instance.service_name, id = %instance.id, "Instance deregistered while its check was in flight; result dropped");
            }
        }
    }

    async fn probe(&self, instance: &ServiceInstance) -> ProbeOutcome {
        let uri = format!("{}{}", instance.base_url(), self.config.path);
        let request = match Request::builder()
            .method("GET")
            .uri(&uri)
            .header("user-agent", "mesh-gateway-health-check")
            .body(Body::empty())
        {
            Ok(req) => req,
            Err(e) => return ProbeOutcome::ConnectError(format!("invalid probe uri {}: {}", uri, e)),
        };

        let timeout: Duration = self.config.timeout();
        match time::timeout(timeout, self.client.request(request)).await {
            Ok(Ok(response)) => ProbeOutcome::Responded(response.status()),
            Ok(Err(e)) => ProbeOutcome::ConnectError(e.to_string()),
            Err(_) => ProbeOutcome::TimedOut,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::get, Router};
    use metrics_exporter_prometheus::PrometheusBuilder;
    use tokio::net::TcpListener;

    fn config() -> HealthCheckConfig {
        HealthCheckConfig {
            enabled: true,
            interval_ms: 1_000,
            timeout_ms: 500,
            path: "/health".to_string(),
        }
    }

    #[test]
    fn gauge_is_skipped_for_instances_removed_mid_check() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        ::metrics::with_local_recorder(&recorder, || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            runtime.block_on(async {
                let registry = Arc::new(ServiceRegistry::new());

                // Deregisters the saga instance before answering.
                let leaving = registry.clone();
                let app = Router::new().route(
                    "/health",
                    get(move || {
                        let leaving = leaving.clone();
                        async move {
                            let _ = leaving.deregister("saga-service", "saga-old");
                            "ok"
                        }
                    }),
                );
                let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
                let addr = listener.local_addr().unwrap();
                tokio::spawn(async move {
                    let _ = axum::serve(listener, app).await;
                });

                registry.register(ServiceInstance::new("saga-service", "saga-old", "127.0.0.1", addr.port()));
                registry.register(ServiceInstance::new("eventbus-service", "eventbus-1", "127.0.0.1", addr.port()));

                let checker = HealthChecker::new(registry.clone(), config());
                assert_eq!(checker.probe_all().await, 2);
                assert!(!registry.contains_service("saga-service"));
            });
        });

        let rendered = handle.render();
        assert!(rendered.contains("eventbus-1"));
        assert!(!rendered.contains("saga-old"));
    }
}
