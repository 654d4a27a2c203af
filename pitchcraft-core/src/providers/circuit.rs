//! Per-provider circuit breaker.
//!
//! Trips open after a run of consecutive failures so a dead search provider
//! stops adding latency to every task, then lets a single trial call through once
//! the recovery window has passed. Other callers are refused until the trial call
//! reports back; a failed trial re-opens the circuit immediately. A trial that
//! never reports (its task was cancelled) is replaced after another window.

use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// State of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CircuitState {
    /// Calls are permitted.
    Closed,
    /// Too many failures; calls are refused until the recovery window passes.
    Open { since: Instant },
    /// One recovery trial in flight, admitted at `since`.
    HalfOpen { since: Instant },
}

#[derive(Debug)]
pub struct CircuitBreaker {
    provider: String,
    state: CircuitState,
    failure_count: usize,
    failure_threshold: usize,
    recovery_timeout: Duration,
}

impl CircuitBreaker {
    pub fn new(
        provider: impl Into<String>,
        failure_threshold: usize,
        recovery_timeout: Duration,
    ) -> Self {
        Self {
            provider: provider.into(),
            state: CircuitState::Closed,
            failure_count: 0,
            failure_threshold: failure_threshold.max(1),
            recovery_timeout,
        }
    }

    /// Whether a call may go out now. Moves an expired open circuit to
    /// half-open and admits the caller as its only trial call.
    pub fn is_call_permitted(&mut self) -> bool {
        match self.state {
            CircuitState::Closed => true,
            CircuitState::Open { since } => {
                if since.elapsed() >= self.recovery_timeout {
                    debug!(
                        provider = %self.provider,
                        "Circuit breaker transitioning to half-open"
                    );
                    self.admit_trial();
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen { since } => {
                if since.elapsed() >= self.recovery_timeout {
                    debug!(
                        provider = %self.provider,
                        "Recovery trial never reported; admitting another"
                    );
                    self.admit_trial();
                    true
                } else {
                    false
                }
            }
        }
    }

    fn admit_trial(&mut self) {
        self.state = CircuitState::HalfOpen {
            since: Instant::now(),
        };
    }

    fn is_half_open(&self) -> bool {
        matches!(self.state, CircuitState::HalfOpen { .. })
    }

    pub fn record_success(&mut self) {
        if self.is_half_open() {
            debug!(provider = %self.provider, "Circuit breaker closing after successful trial");
        }
        self.failure_count = 0;
        self.state = CircuitState::Closed;
    }

    pub fn record_failure(&mut self) {
        self.failure_count += 1;
        let reopen = self.is_half_open();
        if reopen || self.failure_count >= self.failure_threshold {
            if !matches!(self.state, CircuitState::Open { .. }) {
                warn!(
                    provider = %self.provider,
                    failures = self.failure_count,
                    threshold = self.failure_threshold,
                    "Circuit breaker opening"
                );
            }
            self.state = CircuitState::Open {
                since: Instant::now(),
            };
        }
    }

    pub fn state(&self) -> CircuitState {
        self.state
    }
}
