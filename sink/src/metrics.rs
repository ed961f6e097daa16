//! Hand-rolled Prometheus text counters for the Core Sink (see
//! `authgw::metrics` for the grounding note shared across all three
//! services).

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Mutex;
use std::collections::HashMap;

#[derive(Default)]
pub struct Metrics {
    in_flight: AtomicI64,
    accepted_total: AtomicU64,
    rejected_by_reason: Mutex<HashMap<String, u64>>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inflight_inc(&self) {
        self.in_flight.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inflight_dec(&self) {
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn inc_accepted(&self, n: u64) {
        self.accepted_total.fetch_add(n, Ordering::Relaxed);
    }

    pub fn inc_rejected(&self, reason: &str) {
        let mut map = self.rejected_by_reason.lock().expect("metrics mutex poisoned");
        *map.entry(reason.to_string()).or_insert(0) += 1;
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str("# TYPE core_in_flight gauge\n");
        out.push_str(&format!("core_in_flight {}\n", self.in_flight.load(Ordering::Relaxed)));
        out.push_str("# TYPE core_accepted_total counter\n");
        out.push_str(&format!("core_accepted_total {}\n", self.accepted_total.load(Ordering::Relaxed)));
        out.push_str("# TYPE core_rejected_total counter\n");
        let map = self.rejected_by_reason.lock().expect("metrics mutex poisoned");
        for (reason, count) in map.iter() {
            out.push_str(&format!("core_rejected_total{{reason=\"{reason}\"}} {count}\n"));
        }
        out
    }
}
