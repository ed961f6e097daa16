//! The closed/open/half-open circuit breaker gating the downstream forwarder
//! (spec §4.4). Grounded on the original `services/authgw/downstream.py`
//! `Breaker` class, generalized from its implicit two-state cooldown timer
//! into the explicit three-state machine spec §3/§4.4 calls for.

use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

struct Inner {
    state: BreakerState,
    opened_at: Instant,
    fail: u64,
    total: u64,
}

/// Parse a `failure_threshold` config value that may be a fraction in
/// `(0,1]` or an integer percentage (e.g. `20` means `0.20`).
pub fn parse_failure_threshold(raw: f64) -> f64 {
    if raw > 1.0 {
        raw / 100.0
    } else {
        raw
    }
}

pub struct Breaker {
    failure_threshold: f64,
    half_open_after: Duration,
    inner: Mutex<Inner>,
}

impl Breaker {
    pub fn new(failure_threshold: f64, half_open_after: Duration) -> Self {
        Self {
            failure_threshold,
            half_open_after,
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                opened_at: Instant::now(),
                fail: 0,
                total: 0,
            }),
        }
    }

    /// Whether a request may proceed to the downstream right now. May
    /// transition Open -> HalfOpen as a side effect once the cooldown has
    /// elapsed.
    pub fn allow(&self) -> bool {
        let mut inner = self.inner.lock().expect("breaker mutex poisoned");
        match inner.state {
            BreakerState::Closed | BreakerState::HalfOpen => true,
            BreakerState::Open => {
                if inner.opened_at.elapsed() >= self.half_open_after {
                    inner.state = BreakerState::HalfOpen;
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn state(&self) -> BreakerState {
        self.inner.lock().expect("breaker mutex poisoned").state
    }

    /// Record a successful (non-retryable-failure) downstream outcome.
    pub fn record_success(&self) {
        let mut inner = self.inner.lock().expect("breaker mutex poisoned");
        match inner.state {
            BreakerState::HalfOpen => {
                inner.state = BreakerState::Closed;
                inner.fail = 0;
                inner.total = 0;
            }
            BreakerState::Closed => {
                inner.total += 1;
                Self::decay(&mut inner);
            }
            BreakerState::Open => {}
        }
    }

    /// Record a retryable-failure downstream outcome (5xx or transport error).
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock().expect("breaker mutex poisoned");
        match inner.state {
            BreakerState::HalfOpen => {
                inner.state = BreakerState::Open;
                inner.opened_at = Instant::now();
                inner.fail = 0;
                inner.total = 0;
            }
            BreakerState::Closed => {
                inner.total += 1;
                inner.fail += 1;
                Self::decay(&mut inner);
                if inner.total >= 1 && (inner.fail as f64 / inner.total as f64) >= self.failure_threshold {
                    inner.state = BreakerState::Open;
                    inner.opened_at = Instant::now();
                }
            }
            BreakerState::Open => {}
        }
    }

    /// Contract `(total, fail)` to `(100, round(ratio*100))` once total
    /// reaches 1000, to avoid unbounded counter growth (spec §4.4).
    fn decay(inner: &mut Inner) {
        if inner.total >= 1000 {
            let ratio = inner.fail as f64 / inner.total as f64;
            inner.total = 100;
            inner.fail = (ratio * 100.0).round() as u64;
        }
    }
}
