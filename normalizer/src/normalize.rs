//! Record normalization (spec §4.6). Grounded on
//! `services/ingestgw/normalize.py`'s `normalize_record`, generalized onto
//! `logops_core::record`'s level table, PII masking and label enforcement.

use chrono::Utc;
use serde_json::{Map, Value};

use logops_core::record::{enforce_labels, mask_pii, Level};

fn first_string(record: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    for key in keys {
        if let Some(value) = record.get(*key) {
            match value {
                Value::String(s) if !s.is_empty() => return Some(s.clone()),
                Value::Null => continue,
                Value::String(_) => continue,
                other => return Some(other.to_string()),
            }
        }
    }
    None
}

/// Normalize one parsed record, overwriting `emitter`/`scenario_id`/`app`/
/// `source` from the gateway-trusted context. `_missing_ts`/`_missing_level`
/// flags are included in the output (forwarded to the sink) but are not
/// part of the client-facing response.
pub fn normalize_record(raw: Map<String, Value>, emitter: &str, scenario_id: &str) -> Map<String, Value> {
    let mut out = Map::new();

    let ts = first_string(&raw, &["ts", "timestamp", "time"]);
    let missing_ts = ts.is_none();
    out.insert("ts".to_string(), Value::String(ts.unwrap_or_else(|| Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true))));

    let raw_level = first_string(&raw, &["level", "lvl", "severity"]);
    let missing_level = raw_level.is_none();
    let level = raw_level.map(|l| Level::from_raw(&l)).unwrap_or(Level::Info);
    out.insert("level".to_string(), Value::String(level.as_str().to_string()));

    let msg = first_string(&raw, &["message", "msg", "log", "raw"]).unwrap_or_default();
    out.insert("msg".to_string(), Value::String(mask_pii(&msg)));

    if missing_ts {
        out.insert("_missing_ts".to_string(), Value::Bool(true));
    }
    if missing_level {
        out.insert("_missing_level".to_string(), Value::Bool(true));
    }

    enforce_labels(&mut out, emitter, scenario_id);
    out
}
