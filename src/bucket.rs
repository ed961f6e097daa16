//! Per-emitter token-bucket rate limiting (spec §4.3). Grounded on
//! `services/authgw/ratelimit_mw.py`'s `_Bucket`/`TokenBucketRL`: continuous
//! monotonic refill, capacity clamp, fail-open when a shared store is
//! unreachable.

use std::time::Instant;

use dashmap::DashMap;

/// A single emitter's bucket: current token count and the instant it was
/// last refilled.
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// In-process token-bucket registry keyed by emitter id. One registry per
/// `(capacity, refill_per_sec)` policy; callers needing per-emitter
/// overrides hold multiple registries.
pub struct TokenBucketRegistry {
    capacity: f64,
    refill_per_sec: f64,
    buckets: DashMap<String, Bucket>,
}

impl TokenBucketRegistry {
    pub fn new(capacity: f64, refill_per_sec: f64) -> Self {
        Self { capacity, refill_per_sec, buckets: DashMap::new() }
    }

    /// Attempt to take one token for `emitter`. Returns `true` if allowed.
    pub fn try_take(&self, emitter: &str) -> bool {
        self.try_take_n(emitter, 1.0)
    }

    /// Attempt to take `cost` tokens for `emitter`, refilling first.
    pub fn try_take_n(&self, emitter: &str, cost: f64) -> bool {
        let now = Instant::now();
        let mut entry = self.buckets.entry(emitter.to_string()).or_insert_with(|| Bucket {
            tokens: self.capacity,
            last_refill: now,
        });
        let elapsed = now.duration_since(entry.last_refill).as_secs_f64();
        entry.tokens = (entry.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        entry.last_refill = now;
        if entry.tokens >= cost {
            entry.tokens -= cost;
            true
        } else {
            false
        }
    }

    /// Remaining tokens for `emitter`, for `X-RateLimit-Remaining` reporting.
    pub fn remaining(&self, emitter: &str) -> f64 {
        match self.buckets.get(emitter) {
            Some(b) => b.tokens,
            None => self.capacity,
        }
    }
}
