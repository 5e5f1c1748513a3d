//! Uniform random selection strategy.

use crate::load_balancer::SelectionStrategy;
use crate::registry::ServiceInstance;

#[derive(Debug, Default)]
pub struct Random;

impl Random {
    pub fn new() -> Self {
        Self
    }
}

impl SelectionStrategy for Random {
    fn pick(&self, _service: &str, candidates: &[ServiceInstance]) -> Option<usize> {
        if candidates.is_empty() {
            return None;
        }
        Some(fastrand::usize(..candidates.len()))
    }
}
