//! Change notification for registry subscribers.
//!
//! Each service gets its own broadcast channel, created on first subscribe.
//! Delivery is best-effort: a subscriber that falls behind by more than the
//! channel capacity skips the oldest events, and publishing to a service with
//! no live subscribers is a no-op.

use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::registry::instance::{HealthStatus, ServiceInstance};

const CHANNEL_CAPACITY: usize = 64;

/// What happened to the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    Registered { id: String },
    Deregistered { id: String },
    HealthChanged { id: String, status: HealthStatus },
}

/// A change to one service, with the membership snapshot taken after it.
#[derive(Debug, Clone)]
pub struct RegistryEvent {
    pub service: String,
    pub kind: EventKind,
    pub instances: Vec<ServiceInstance>,
}

/// Receiving end of a subscription to one service.
#[derive(Debug)]
pub struct Subscription {
    service: String,
    rx: broadcast::Receiver<RegistryEvent>,
}

impl Subscription {
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Wait for the next event.
    ///
    /// Returns `None` once the registry is dropped. Missed events caused by
    /// lag are skipped with a warning.
    pub async fn recv(&mut self) -> Option<RegistryEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(service = %self.service, skipped, "Registry subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking poll, mostly useful in tests.
    pub fn try_recv(&mut self) -> Option<RegistryEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }
}

/// Per-service broadcast senders.
#[derive(Debug, Default)]
pub(crate) struct EventHub {
    channels: DashMap<String, broadcast::Sender<RegistryEvent>>,
}

impl EventHub {
    pub(crate) fn subscribe(&self, service: &str) -> Subscription {
        let rx = self
            .channels
            .entry(service.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe();
        Subscription {
            service: service.to_string(),
            rx,
        }
    }

    pub(crate) fn publish(&self, event: RegistryEvent) {
        if let Some(tx) = self.channels.get(&event.service) {
            // No receivers left is fine.
            let _ = tx.send(event);
        }
    }
}
