//! Round-robin selection strategy.

use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::load_balancer::SelectionStrategy;
use crate::registry::ServiceInstance;

/// Round-robin selector.
/// Keeps one rotating counter per service name.
#[derive(Debug, Default)]
pub struct RoundRobin {
    counters: DashMap<String, AtomicUsize>,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SelectionStrategy for RoundRobin {
    fn pick(&self, service: &str, candidates: &[ServiceInstance]) -> Option<usize> {
        if candidates.is_empty() {
            return None;
        }

        // The candidate list shrinks and grows with health; the modulo keeps
        // the index in range either way.
        let ticket = match self.counters.get(service) {
            Some(counter) => counter.fetch_add(1, Ordering::Relaxed),
            None => self
                .counters
                .entry(service.to_string())
                .or_default()
                .fetch_add(1, Ordering::Relaxed),
        };
        Some(ticket % candidates.len())
    }
}
