//! Hand-rolled Prometheus text-exposition counters (spec §6 `/metrics`,
//! SPEC_FULL.md "in-flight gauge + per-batch latency"). Not a general
//! exposition framework — spec.md's Non-goals exclude that, not the
//! presence of a handful of ambient counters every service in the pack
//! carries. Grounded on `services/ingestgw/metrics.py`'s counter/gauge
//! definitions, rendered by hand rather than pulled in via a metrics crate
//! since the teacher itself has no metrics-crate dependency to align with.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Mutex;

#[derive(Default)]
pub struct Metrics {
    requests_total: AtomicU64,
    in_flight: AtomicI64,
    rejected_by_reason: Mutex<HashMap<String, u64>>,
    forwarded_total: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_requests(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inflight_inc(&self) {
        self.in_flight.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inflight_dec(&self) {
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn inc_rejected(&self, reason: &str) {
        let mut map = self.rejected_by_reason.lock().expect("metrics mutex poisoned");
        *map.entry(reason.to_string()).or_insert(0) += 1;
    }

    pub fn inc_forwarded(&self) {
        self.forwarded_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str("# TYPE authgw_requests_total counter\n");
        out.push_str(&format!("authgw_requests_total {}\n", self.requests_total.load(Ordering::Relaxed)));
        out.push_str("# TYPE authgw_in_flight gauge\n");
        out.push_str(&format!("authgw_in_flight {}\n", self.in_flight.load(Ordering::Relaxed)));
        out.push_str("# TYPE authgw_forwarded_total counter\n");
        out.push_str(&format!("authgw_forwarded_total {}\n", self.forwarded_total.load(Ordering::Relaxed)));
        out.push_str("# TYPE authgw_rejected_total counter\n");
        let map = self.rejected_by_reason.lock().expect("metrics mutex poisoned");
        for (reason, count) in map.iter() {
            out.push_str(&format!("authgw_rejected_total{{reason=\"{reason}\"}} {count}\n"));
        }
        out
    }
}
