//! Circuit breaker for dependency protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: dependency assumed down, calls fail fast
//! - HalfOpen: a limited number of trial calls test recovery
//!
//! # State Transitions
//! ```text
//! Closed   → Open:     failure_count reaches failure_threshold
//! Open     → HalfOpen: first call after `timeout` since the last failure
//! HalfOpen → Closed:   success_count reaches success_threshold
//! HalfOpen → Open:     any trial call fails
//! ```
//!
//! One breaker guards one logical dependency (a service name), not a single
//! instance. Its lock covers bookkeeping only; the guarded call runs outside.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::Serialize;
use thiserror::Error;

use crate::config::CircuitBreakerConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        };
        f.write_str(name)
    }
}

/// Error returned by [`CircuitBreaker::execute`].
#[derive(Debug, Error)]
pub enum BreakerError<E> {
    /// Rejected without calling the dependency.
    #[error("circuit breaker is open")]
    Open,

    /// The guarded call itself failed.
    #[error("{0}")]
    Inner(E),
}

/// Called with `(dependency, from, to)` on every transition.
pub type StateChangeHook = Arc<dyn Fn(&str, CircuitState, CircuitState) + Send + Sync>;

#[derive(Debug)]
struct Core {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    /// Trial calls admitted in HalfOpen that have not reported back.
    trials_in_flight: u32,
    last_failure: Option<Instant>,
    /// Bumped on every transition; outcomes from an older generation are dropped.
    generation: u64,
}

/// Point-in-time view of a breaker, for diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct BreakerSnapshot {
    pub name: String,
    pub state: CircuitState,
    pub failure_count: u32,
    pub success_count: u32,
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub timeout_ms: u64,
}

pub struct CircuitBreaker {
    name: String,
    failure_threshold: u32,
    success_threshold: u32,
    timeout: Duration,
    core: Mutex<Core>,
    on_state_change: Option<StateChangeHook>,
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("state", &self.state())
            .finish()
    }
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: &CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            failure_threshold: config.failure_threshold.max(1),
            success_threshold: config.success_threshold.max(1),
            timeout: config.timeout(),
            core: Mutex::new(Core {
                state: CircuitState::Closed,
                failure_count: 0,
                success_count: 0,
                trials_in_flight: 0,
                last_failure: None,
                generation: 0,
            }),
            on_state_change: None,
        }
    }

    pub fn with_state_change_hook(mut self, hook: StateChangeHook) -> Self {
        self.on_state_change = Some(hook);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn lock(&self) -> MutexGuard<'_, Core> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let core = self.lock();
        BreakerSnapshot {
            name: self.name.clone(),
            state: core.state,
            failure_count: core.failure_count,
            success_count: core.success_count,
            failure_threshold: self.failure_threshold,
            success_threshold: self.success_threshold,
            timeout_ms: self.timeout.as_millis() as u64,
        }
    }

    /// Run `f` if the breaker admits it; `Err` outcomes count as failures.
    pub async fn execute<F, Fut, T, E>(&self, f: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.execute_with(f, |result| result.is_ok()).await
    }

    /// Like [`execute`](Self::execute), with the caller deciding which
    /// outcomes count as success.
    pub async fn execute_with<F, Fut, T, E, C>(&self, f: F, is_success: C) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: FnOnce(&Result<T, E>) -> bool,
    {
        let admission = self.try_admit().ok_or(BreakerError::Open)?;
        let result = f().await;
        admission.settle(is_success(&result));
        result.map_err(BreakerError::Inner)
    }

    /// Admission check. `None` means the call must be rejected.
    fn try_admit(&self) -> Option<Admission<'_>> {
        let mut core = self.lock();
        let trial = match core.state {
            CircuitState::Closed => false,
            CircuitState::Open => {
                let expired = core
                    .last_failure
                    .map_or(true, |at| at.elapsed() >= self.timeout);
                if !expired {
                    return None;
                }
                self.transition(&mut core, CircuitState::HalfOpen);
                core.trials_in_flight = 1;
                true
            }
            CircuitState::HalfOpen => {
                if core.trials_in_flight >= self.success_threshold {
                    return None;
                }
                core.trials_in_flight += 1;
                true
            }
        };
        Some(Admission {
            breaker: self,
            trial,
            generation: core.generation,
            settled: false,
        })
    }

    fn record(&self, trial: bool, generation: u64, success: Option<bool>) {
        let mut core = self.lock();
        if generation != core.generation {
            return;
        }
        if trial && core.state == CircuitState::HalfOpen {
            core.trials_in_flight = core.trials_in_flight.saturating_sub(1);
        }
        let Some(success) = success else {
            return;
        };

        match (core.state, success) {
            (CircuitState::Closed, true) => core.failure_count = 0,
            (CircuitState::Closed, false) => {
                core.failure_count += 1;
                core.last_failure = Some(Instant::now());
                if core.failure_count >= self.failure_threshold {
                    self.transition(&mut core, CircuitState::Open);
                }
            }
            (CircuitState::HalfOpen, true) => {
                core.success_count += 1;
                if core.success_count >= self.success_threshold {
                    self.transition(&mut core, CircuitState::Closed);
                }
            }
            (CircuitState::HalfOpen, false) => {
                core.last_failure = Some(Instant::now());
                self.transition(&mut core, CircuitState::Open);
            }
            (CircuitState::Open, _) => {}
        }
    }

    fn transition(&self, core: &mut Core, to: CircuitState) {
        let from = core.state;
        if from == to {
            return;
        }
        core.state = to;
        core.failure_count = 0;
        core.success_count = 0;
        core.trials_in_flight = 0;
        core.generation = core.generation.wrapping_add(1);

        match to {
            CircuitState::Open => {
                tracing::warn!(dependency = %self.name, from = %from, "Circuit opened")
            }
            _ => tracing::info!(dependency = %self.name, from = %from, to = %to, "Circuit state changed"),
        }
        if let Some(hook) = &self.on_state_change {
            hook(&self.name, from, to);
        }
    }
}

/// An admitted call. Dropping it without settling (the caller's future was
/// cancelled) frees a HalfOpen slot but records no outcome.
struct Admission<'a> {
    breaker: &'a CircuitBreaker,
    trial: bool,
    generation: u64,
    settled: bool,
}

impl Admission<'_> {
    fn settle(mut self, success: bool) {
        self.settled = true;
        self.breaker.record(self.trial, self.generation, Some(success));
    }
}

impl Drop for Admission<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.breaker.record(self.trial, self.generation, None);
        }
    }
}

/// One breaker per dependency name, created on first use.
pub struct BreakerRegistry {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    defaults: CircuitBreakerConfig,
    hook: Option<StateChangeHook>,
}

impl BreakerRegistry {
    pub fn new(defaults: CircuitBreakerConfig) -> Self {
        Self {
            breakers: DashMap::new(),
            defaults,
            hook: None,
        }
    }

    pub fn with_state_change_hook(mut self, hook: StateChangeHook) -> Self {
        self.hook = Some(hook);
        self
    }

    pub fn get(&self, name: &str) -> Arc<CircuitBreaker> {
        // Fast path: key already exists, no allocation.
        if let Some(entry) = self.breakers.get(name) {
            return entry.value().clone();
        }
        self.breakers
            .entry(name.to_string())
            .or_insert_with(|| {
                let breaker = CircuitBreaker::new(name, &self.defaults);
                Arc::new(match &self.hook {
                    Some(hook) => breaker.with_state_change_hook(hook.clone()),
                    None => breaker,
                })
            })
            .clone()
    }

    /// Snapshots of every breaker, ordered by name.
    pub fn snapshots(&self) -> Vec<BreakerSnapshot> {
        let mut all: Vec<_> = self.breakers.iter().map(|entry| entry.value().snapshot()).collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }
}
