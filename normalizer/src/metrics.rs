//! Hand-rolled Prometheus text counters (spec §6 `/metrics`; SPEC_FULL.md
//! "in-flight gauge + per-batch latency" supplement). See `authgw::metrics`
//! for the grounding note — no metrics crate, only the counters the
//! original's `services/ingestgw/metrics.py` defines, rendered by hand.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

#[derive(Default)]
pub struct Metrics {
    requests_total: AtomicU64,
    in_flight: AtomicI64,
    parse_errors_total: AtomicU64,
    forwarded_total: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inflight_inc(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        self.in_flight.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inflight_dec(&self) {
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn inc_parse_error(&self) {
        self.parse_errors_total.fetch_add(1, Ordering::Relaxed);
    }

    #[allow(dead_code)]
    pub fn inc_forwarded(&self) {
        self.forwarded_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn render(&self) -> String {
        format!(
            "# TYPE normalizer_requests_total counter\nnormalizer_requests_total {}\n\
             # TYPE normalizer_in_flight gauge\nnormalizer_in_flight {}\n\
             # TYPE normalizer_parse_errors_total counter\nnormalizer_parse_errors_total {}\n\
             # TYPE normalizer_forwarded_total counter\nnormalizer_forwarded_total {}\n",
            self.requests_total.load(Ordering::Relaxed),
            self.in_flight.load(Ordering::Relaxed),
            self.parse_errors_total.load(Ordering::Relaxed),
            self.forwarded_total.load(Ordering::Relaxed),
        )
    }
}
