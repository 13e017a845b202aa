// API budget tracking with two interchangeable per-endpoint policies.
//
// Window policy: a counted quota that resets on a fixed schedule. A call is
// allowed while `used < limit * (1 - safety_buffer)`, so a fraction of the
// quota is always held in reserve.
//
// Cooldown policy: at most one call per `min_interval`. Used where the
// upstream quota is too small to count meaningfully ("one search per 15
// minutes").
//
// The tracker is shared across detector polls and both queue drains via
// Arc<BudgetTracker>. All state sits behind a single Mutex so the
// check-then-record in `try_acquire` is atomic: two callers can never both
// observe "budget available" and overspend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::error::{PipelineError, PipelineResult};

/// Well-known endpoint keys.
pub mod endpoints {
    pub const SEARCH: &str = "search";
    pub const LOOKUP: &str = "lookup";
    pub const MINTING: &str = "minting";
    pub const DM: &str = "dm";
}

/// How an endpoint's usage is limited.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BudgetPolicy {
    Window {
        limit: u64,
        window: Duration,
        /// Fraction of `limit` held back (0.1 reserves 10%).
        safety_buffer: f64,
    },
    Cooldown {
        min_interval: Duration,
    },
}

impl BudgetPolicy {
    pub fn window(limit: u64, window: Duration, safety_buffer: f64) -> Self {
        BudgetPolicy::Window {
            limit,
            window,
            safety_buffer: safety_buffer.clamp(0.0, 1.0),
        }
    }

    pub fn cooldown(min_interval: Duration) -> Self {
        BudgetPolicy::Cooldown { min_interval }
    }

    /// Baseline for endpoints nobody configured: 1000 calls per day.
    pub fn permissive() -> Self {
        BudgetPolicy::window(1_000, Duration::from_secs(24 * 60 * 60), 0.0)
    }
}

#[derive(Debug, Clone)]
enum EndpointState {
    Window {
        used: u64,
        limit: u64,
        window: Duration,
        safety_buffer: f64,
        reset_at: DateTime<Utc>,
    },
    Cooldown {
        min_interval: Duration,
        last_call_at: Option<DateTime<Utc>>,
    },
}

impl EndpointState {
    fn new(policy: BudgetPolicy, now: DateTime<Utc>) -> Self {
        match policy {
            BudgetPolicy::Window {
                limit,
                window,
                safety_buffer,
            } => EndpointState::Window {
                used: 0,
                limit,
                window,
                safety_buffer,
                reset_at: now + to_chrono(window),
            },
            BudgetPolicy::Cooldown { min_interval } => EndpointState::Cooldown {
                min_interval,
                last_call_at: None,
            },
        }
    }

    /// Roll the window over if its reset time has passed.
    fn refresh(&mut self, endpoint: &str, now: DateTime<Utc>) {
        if let EndpointState::Window {
            used,
            window,
            reset_at,
            ..
        } = self
        {
            if now >= *reset_at {
                if *used > 0 {
                    info!(endpoint = endpoint, used = *used, "Budget window reset");
                }
                *used = 0;
                *reset_at = now + to_chrono(*window);
            }
        }
    }

    fn allows(&self, now: DateTime<Utc>, buffer_override: Option<f64>) -> bool {
        self.allows_n(now, 1, buffer_override)
    }

    /// Whether `n` more calls fit. For windows the last of them must still
    /// be under the buffered cap, the same test a single call passes.
    fn allows_n(&self, now: DateTime<Utc>, n: u64, buffer_override: Option<f64>) -> bool {
        match self {
            EndpointState::Window {
                used,
                limit,
                safety_buffer,
                ..
            } => {
                let buffer = buffer_override.unwrap_or(*safety_buffer).clamp(0.0, 1.0);
                let last = used.saturating_add(n.max(1) - 1);
                (last as f64) < (*limit as f64) * (1.0 - buffer)
            }
            EndpointState::Cooldown {
                min_interval,
                last_call_at,
            } => match last_call_at {
                None => true,
                Some(last) => now - *last >= to_chrono(*min_interval),
            },
        }
    }

    fn record(&mut self, n: u64, now: DateTime<Utc>) {
        match self {
            EndpointState::Window { used, limit, .. } => {
                *used = used.saturating_add(n).min(*limit);
            }
            EndpointState::Cooldown { last_call_at, .. } => {
                *last_call_at = Some(now);
            }
        }
    }

    fn wait(&self, now: DateTime<Utc>) -> Duration {
        self.wait_n(now, 1)
    }

    fn wait_n(&self, now: DateTime<Utc>, n: u64) -> Duration {
        if self.allows_n(now, n, None) {
            return Duration::ZERO;
        }
        let until = match self {
            EndpointState::Window { reset_at, .. } => *reset_at,
            EndpointState::Cooldown {
                min_interval,
                last_call_at,
            } => match last_call_at {
                Some(last) => *last + to_chrono(*min_interval),
                None => now,
            },
        };
        // Negative deltas become zero.
        (until - now).to_std().unwrap_or(Duration::ZERO)
    }
}

/// Point-in-time view of one endpoint, for dashboards and the CLI.
#[derive(Debug, Clone, Serialize)]
pub struct BudgetStatus {
    pub endpoint: String,
    pub policy: &'static str,
    pub used: Option<u64>,
    pub limit: Option<u64>,
    pub window_reset_at: Option<DateTime<Utc>>,
    pub last_call_at: Option<DateTime<Utc>>,
    pub available: bool,
    pub retry_after_secs: u64,
}

pub struct BudgetTracker {
    endpoints: Mutex<HashMap<String, EndpointState>>,
    policies: HashMap<String, BudgetPolicy>,
    default_policy: BudgetPolicy,
    clock: Arc<dyn Clock>,
}

impl BudgetTracker {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            endpoints: Mutex::new(HashMap::new()),
            policies: HashMap::new(),
            default_policy: BudgetPolicy::permissive(),
            clock,
        }
    }

    /// Configure an endpoint's policy. Builder-style, used at construction.
    pub fn with_policy(mut self, endpoint: &str, policy: BudgetPolicy) -> Self {
        self.policies.insert(endpoint.to_string(), policy);
        self
    }

    pub fn with_default_policy(mut self, policy: BudgetPolicy) -> Self {
        self.default_policy = policy;
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, EndpointState>> {
        self.endpoints.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Run `f` against an endpoint's state after a reset check, creating the
    /// state from its configured (or default) policy on first use.
    fn with_state<T>(&self, endpoint: &str, f: impl FnOnce(&mut EndpointState, DateTime<Utc>) -> T) -> T {
        let now = self.clock.now();
        let mut endpoints = self.lock();
        let state = endpoints.entry(endpoint.to_string()).or_insert_with(|| {
            let policy = self
                .policies
                .get(endpoint)
                .copied()
                .unwrap_or(self.default_policy);
            debug!(endpoint = endpoint, ?policy, "Tracking new endpoint");
            EndpointState::new(policy, now)
        });
        state.refresh(endpoint, now);
        f(state, now)
    }

    /// Whether a call is allowed right now, using the endpoint's own buffer.
    pub fn may_call(&self, endpoint: &str) -> bool {
        self.with_state(endpoint, |state, now| state.allows(now, None))
    }

    /// Like `may_call` but with an explicit safety buffer fraction.
    /// Cooldown endpoints ignore the buffer.
    pub fn may_call_with_buffer(&self, endpoint: &str, safety_buffer: f64) -> bool {
        self.with_state(endpoint, |state, now| state.allows(now, Some(safety_buffer)))
    }

    /// Record `n` calls (cooldown endpoints just note the call time).
    pub fn record_usage(&self, endpoint: &str, n: u64) {
        self.with_state(endpoint, |state, now| state.record(n, now))
    }

    /// Atomically check and record a single call.
    pub fn try_acquire(&self, endpoint: &str) -> PipelineResult<()> {
        self.try_acquire_n(endpoint, 1)
    }

    /// Atomically check and record `n` calls. All `n` must fit under the
    /// buffered cap; nothing is recorded otherwise.
    pub fn try_acquire_n(&self, endpoint: &str, n: u64) -> PipelineResult<()> {
        self.with_state(endpoint, |state, now| {
            if state.allows_n(now, n, None) {
                state.record(n, now);
                Ok(())
            } else {
                Err(PipelineError::BudgetExceeded {
                    endpoint: endpoint.to_string(),
                    retry_after: state.wait_n(now, n),
                })
            }
        })
    }

    /// How long until the endpoint allows a call. Never negative.
    pub fn time_until_available(&self, endpoint: &str) -> Duration {
        self.with_state(endpoint, |state, now| state.wait(now))
    }

    /// Start a fresh window (or clear the cooldown) immediately.
    pub fn reset(&self, endpoint: &str) {
        self.with_state(endpoint, |state, now| match state {
            EndpointState::Window {
                used,
                window,
                reset_at,
                ..
            } => {
                *used = 0;
                *reset_at = now + to_chrono(*window);
            }
            EndpointState::Cooldown { last_call_at, .. } => *last_call_at = None,
        })
    }

    pub fn status(&self, endpoint: &str) -> BudgetStatus {
        self.with_state(endpoint, |state, now| status_of(endpoint, state, now))
    }

    /// Status of every endpoint seen or configured so far, sorted by name.
    pub fn snapshot(&self) -> Vec<BudgetStatus> {
        let mut names: Vec<String> = self.policies.keys().cloned().collect();
        names.extend(self.lock().keys().cloned());
        names.sort();
        names.dedup();
        names.iter().map(|name| self.status(name)).collect()
    }
}

fn status_of(endpoint: &str, state: &EndpointState, now: DateTime<Utc>) -> BudgetStatus {
    let available = state.allows(now, None);
    let retry_after_secs = state.wait(now).as_secs();
    match state {
        EndpointState::Window {
            used,
            limit,
            reset_at,
            ..
        } => BudgetStatus {
            endpoint: endpoint.to_string(),
            policy: "window",
            used: Some(*used),
            limit: Some(*limit),
            window_reset_at: Some(*reset_at),
            last_call_at: None,
            available,
            retry_after_secs,
        },
        EndpointState::Cooldown { last_call_at, .. } => BudgetStatus {
            endpoint: endpoint.to_string(),
            policy: "cooldown",
            used: None,
            limit: None,
            window_reset_at: None,
            last_call_at: *last_call_at,
            available,
            retry_after_secs,
        },
    }
}

fn to_chrono(d: Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or_else(|_| chrono::Duration::days(36_500))
}
