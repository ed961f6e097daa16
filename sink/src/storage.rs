//! Day-partitioned NDJSON append storage plus the in-memory diagnostics
//! ring (spec §4.7). Grounded on `services/core/app.py`'s `_write_ndjson`/
//! `_ensure_core_labels`/`collections.deque(maxlen=...)` — the ring itself
//! is kept; its unauthenticated HTTP exposure (`/_debug/*`) is not (see
//! SPEC_FULL.md).

use std::collections::VecDeque;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::Utc;
use serde_json::{Map, Value};

/// Overwrite nothing; only fill in `app`/`source`/`emitter`/`scenario_id`
/// when the record does not already carry them (spec §4.7: "appending ...
/// defaults", distinct from the Normalizer's unconditional overwrite).
pub fn ensure_core_labels(record: &mut Map<String, Value>) {
    record.entry("app".to_string()).or_insert_with(|| Value::String("logops".to_string()));
    record.entry("source".to_string()).or_insert_with(|| Value::String("ingest".to_string()));
    record.entry("emitter".to_string()).or_insert_with(|| Value::String("unknown".to_string()));
    record.entry("scenario_id".to_string()).or_insert_with(|| Value::String("na".to_string()));
}

pub struct Sink {
    dir: PathBuf,
    ring: Mutex<VecDeque<Value>>,
    ring_size: usize,
}

impl Sink {
    pub fn new(dir: impl Into<PathBuf>, ring_size: usize) -> std::io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir, ring: Mutex::new(VecDeque::with_capacity(ring_size.min(1024))), ring_size })
    }

    fn today_path(&self) -> PathBuf {
        let today = Utc::now().format("%Y%m%d").to_string();
        self.dir.join(format!("{today}.ndjson"))
    }

    /// Append each record as one NDJSON line to today's file and push it
    /// onto the diagnostics ring, returning the count written.
    pub fn write_batch(&self, records: Vec<Map<String, Value>>) -> std::io::Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        let path = self.today_path();
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;

        let mut ring = self.ring.lock().expect("ring mutex poisoned");
        let mut count = 0;
        for mut record in records {
            ensure_core_labels(&mut record);
            let line = serde_json::to_string(&record)?;
            writeln!(file, "{line}")?;
            if ring.len() >= self.ring_size {
                ring.pop_front();
            }
            ring.push_back(Value::Object(record));
            count += 1;
        }
        Ok(count)
    }

    /// Most recent `n` accepted records, for internal diagnostics.
    pub fn recent(&self, n: usize) -> Vec<Value> {
        let ring = self.ring.lock().expect("ring mutex poisoned");
        ring.iter().rev().take(n).cloned().collect()
    }

    #[cfg(test)]
    pub fn dir(&self) -> &std::path::Path {
        &self.dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ensure_core_labels_does_not_overwrite_existing() {
        let mut record = Map::new();
        record.insert("emitter".to_string(), json!("csv"));
        ensure_core_labels(&mut record);
        assert_eq!(record["emitter"], "csv");
        assert_eq!(record["app"], "logops");
    }

    #[test]
    fn write_batch_appends_ndjson_lines() {
        let tmp = tempfile::tempdir().unwrap();
        let sink = Sink::new(tmp.path(), 10).unwrap();
        let mut rec = Map::new();
        rec.insert("msg".to_string(), json!("hello"));
        let n = sink.write_batch(vec![rec]).unwrap();
        assert_eq!(n, 1);

        let today = Utc::now().format("%Y%m%d").to_string();
        let contents = std::fs::read_to_string(tmp.path().join(format!("{today}.ndjson"))).unwrap();
        assert_eq!(contents.lines().count(), 1);
        assert!(contents.contains("\"app\":\"logops\""));
    }

    #[test]
    fn ring_buffer_is_bounded() {
        let tmp = tempfile::tempdir().unwrap();
        let sink = Sink::new(tmp.path(), 2).unwrap();
        for i in 0..5 {
            let mut rec = Map::new();
            rec.insert("i".to_string(), json!(i));
            sink.write_batch(vec![rec]).unwrap();
        }
        assert_eq!(sink.recent(10).len(), 2);
    }
}
