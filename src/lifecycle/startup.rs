//! Startup orchestration.
//!
//! # Responsibilities
//! - Seed the registry from the static service table
//! - Build shared state (breakers are created per static service here)
//! - Start background tasks (health checker, config reload, admin API)
//! - Bind listeners and begin accepting traffic
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Static services are registered before the listener accepts traffic
//! - Listeners start last (traffic only when ready)

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::admin::setup_admin_router;
use crate::config::{ConfigWatcher, GatewayConfig, StaticServiceConfig};
use crate::health::HealthChecker;
use crate::http::{GatewayState, HttpServer};
use crate::lifecycle::shutdown::Shutdown;
use crate::registry::{ServiceInstance, ServiceRegistry};

/// Registry entry for one static service table row.
pub fn static_instance(service: &str, entry: &StaticServiceConfig) -> ServiceInstance {
    ServiceInstance::new(service, entry.instance_id(service), entry.address.clone(), entry.port)
        .with_tags(entry.tags.iter().cloned())
        .with_metadata(entry.metadata.clone())
}

/// Register every static service. Returns how many were registered.
pub fn seed_registry(registry: &ServiceRegistry, services: &BTreeMap<String, StaticServiceConfig>) -> usize {
    for (name, entry) in services {
        registry.register(static_instance(name, entry));
    }
    tracing::info!(services = services.len(), "Static services registered");
    services.len()
}

/// What a reload changed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub added: Vec<String>,
    pub updated: Vec<String>,
    pub removed: Vec<String>,
}

impl ReconcileSummary {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }
}

/// Apply a new static service table on top of the previous one.
///
/// Unchanged entries are left alone so they keep their probed health.
/// Instances registered through the admin API are never touched.
pub fn reconcile_static_services(
    registry: &ServiceRegistry,
    previous: &BTreeMap<String, StaticServiceConfig>,
    next: &BTreeMap<String, StaticServiceConfig>,
) -> ReconcileSummary {
    let mut summary = ReconcileSummary::default();

    for (name, old) in previous {
        if next.contains_key(name) {
            continue;
        }
        // Someone may have deregistered it through the admin API already.
        let _ = registry.deregister(name, &old.instance_id(name));
        summary.removed.push(name.clone());
    }

    for (name, entry) in next {
        match previous.get(name) {
            Some(old) if old == entry => {}
            Some(old) => {
                let old_id = old.instance_id(name);
                if old_id != entry.instance_id(name) {
                    let _ = registry.deregister(name, &old_id);
                }
                registry.register(static_instance(name, entry));
                summary.updated.push(name.clone());
            }
            None => {
                registry.register(static_instance(name, entry));
                summary.added.push(name.clone());
            }
        }
    }

    if !summary.is_empty() {
        tracing::info!(
            added = ?summary.added,
            updated = ?summary.updated,
            removed = ?summary.removed,
            "Static service table reconciled"
        );
    }
    summary
}

/// A fully wired gateway, ready to serve.
pub struct Gateway {
    state: GatewayState,
    shutdown: Arc<Shutdown>,
}

impl Gateway {
    /// Build shared state and register static services. Nothing is spawned yet.
    pub fn build(config: GatewayConfig) -> Self {
        let registry = Arc::new(ServiceRegistry::new());
        seed_registry(&registry, &config.services);
        Self {
            state: GatewayState::new(config, registry),
            shutdown: Arc::new(Shutdown::new()),
        }
    }

    pub fn state(&self) -> &GatewayState {
        &self.state
    }

    pub fn registry(&self) -> &Arc<ServiceRegistry> {
        &self.state.registry
    }

    pub fn shutdown(&self) -> Arc<Shutdown> {
        self.shutdown.clone()
    }

    pub fn spawn_health_checker(&self) -> JoinHandle<()> {
        let checker = HealthChecker::new(self.state.registry.clone(), self.state.config.health_check.clone());
        tokio::spawn(checker.run(self.shutdown.subscribe()))
    }

    /// Watch `path` and reconcile the static service table on every valid change.
    pub fn spawn_config_reload(&self, path: &Path) -> Result<JoinHandle<()>, notify::Error> {
        let (watcher, updates) = ConfigWatcher::new(path);
        let handle = watcher.run()?;
        let registry = self.state.registry.clone();
        let initial = self.state.config.services.clone();
        let cancel = self.shutdown.token();

        Ok(tokio::spawn(async move {
            // The watcher stops when its handle drops.
            let _handle = handle;
            apply_reloads(registry, initial, updates, cancel).await;
        }))
    }

    /// Start the admin listener if enabled.
    pub async fn spawn_admin(&self) -> std::io::Result<Option<JoinHandle<()>>> {
        let admin = &self.state.config.admin;
        if !admin.enabled {
            return Ok(None);
        }

        let listener = TcpListener::bind(&admin.bind_address).await?;
        tracing::info!(address = %listener.local_addr()?, "Admin API listening");

        let app = setup_admin_router(self.state.clone());
        let mut shutdown = self.shutdown.subscribe();
        Ok(Some(tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown.recv().await;
                })
                .await;
            if let Err(e) = result {
                tracing::error!(error = %e, "Admin API server failed");
            }
        })))
    }

    /// Start background tasks and serve on `listener` until shutdown.
    pub async fn serve(self, listener: TcpListener) -> std::io::Result<()> {
        let health = self.spawn_health_checker();
        let admin = self.spawn_admin().await?;

        let server = HttpServer::new(self.state.clone());
        let result = server.run(listener, self.shutdown.subscribe()).await;

        // A server error (not a signal) still has to stop the background tasks.
        self.shutdown.trigger();
        if let Err(e) = health.await {
            tracing::error!(error = %e, "Health checker task failed");
        }
        if let Some(admin) = admin {
            if let Err(e) = admin.await {
                tracing::error!(error = %e, "Admin task failed");
            }
        }
        result
    }
}

async fn apply_reloads(
    registry: Arc<ServiceRegistry>,
    mut current: BTreeMap<String, StaticServiceConfig>,
    mut updates: mpsc::UnboundedReceiver<GatewayConfig>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            update = updates.recv() => {
                let Some(config) = update else { break };
                reconcile_static_services(&registry, &current, &config.services);
                current = config.services;
            }
        }
    }
    tracing::debug!("Config reload task stopped");
}
