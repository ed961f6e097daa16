//! The normalized record shape and the label-enforcement / PII-masking
//! rules applied to every record before it reaches the sink.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

/// Canonical log level enum (spec §3, §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
    Trace,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
            Level::Trace => "TRACE",
        }
    }

    /// Map a raw level string onto the canonical table; unknown strings
    /// default to `INFO` (spec §4.6).
    pub fn from_raw(raw: &str) -> Level {
        match raw.trim().to_ascii_lowercase().as_str() {
            "debug" => Level::Debug,
            "info" => Level::Info,
            "warn" | "warning" => Level::Warn,
            "error" | "fatal" => Level::Error,
            "trace" => Level::Trace,
            _ => Level::Info,
        }
    }
}

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)([A-Z0-9._%+-]+)@([A-Z0-9.-]+\.[A-Z]{2,})").unwrap());
static IPV4_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,3})\.(\d{1,3})\.(\d{1,3})\.(\d{1,3})\b").unwrap());

/// Replace email local-parts with `first-char + "***"`, leaving the domain
/// untouched (spec §4.6).
pub fn mask_email(input: &str) -> String {
    EMAIL_RE
        .replace_all(input, |caps: &regex::Captures| {
            let local = &caps[1];
            let first = local.chars().next().map(|c| c.to_string()).unwrap_or_default();
            format!("{first}***@{}", &caps[2])
        })
        .into_owned()
}

/// Replace an IPv4 address with its first two octets plus `.x.x` (spec §4.6).
pub fn mask_ipv4(input: &str) -> String {
    IPV4_RE
        .replace_all(input, |caps: &regex::Captures| format!("{}.{}.x.x", &caps[1], &caps[2]))
        .into_owned()
}

/// Apply both masks to a message string.
pub fn mask_pii(input: &str) -> String {
    mask_ipv4(&mask_email(input))
}

/// Overwrite `emitter`/`scenario_id`/`app`/`source` on a normalized record
/// with the gateway-authoritative values (spec §4.6 "Label enforcement").
/// Header values win unconditionally over any record-provided values.
pub fn enforce_labels(record: &mut Map<String, Value>, emitter: &str, scenario_id: &str) {
    record.insert("emitter".to_string(), Value::String(emitter.to_string()));
    record.insert("scenario_id".to_string(), Value::String(scenario_id.to_string()));
    record.insert("app".to_string(), Value::String("logops".to_string()));
    record.insert("source".to_string(), Value::String("ingest".to_string()));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_from_raw_maps_known_values() {
        assert_eq!(Level::from_raw("warning").as_str(), "WARN");
        assert_eq!(Level::from_raw("FATAL").as_str(), "ERROR");
        assert_eq!(Level::from_raw("  Debug ").as_str(), "DEBUG");
    }

    #[test]
    fn level_from_raw_defaults_to_info() {
        assert_eq!(Level::from_raw("weird").as_str(), "INFO");
        assert_eq!(Level::from_raw("").as_str(), "INFO");
    }

    #[test]
    fn mask_email_keeps_domain() {
        assert_eq!(mask_email("contact jane.doe@example.com please"), "contact j***@example.com please");
    }

    #[test]
    fn mask_ipv4_keeps_first_two_octets() {
        assert_eq!(mask_ipv4("client at 10.20.30.40 connected"), "client at 10.20.x.x connected");
    }

    #[test]
    fn enforce_labels_overwrites_record_values() {
        let mut rec = Map::new();
        rec.insert("emitter".to_string(), Value::String("spoofed".to_string()));
        enforce_labels(&mut rec, "csv", "scn-1");
        assert_eq!(rec.get("emitter").unwrap(), "csv");
        assert_eq!(rec.get("scenario_id").unwrap(), "scn-1");
        assert_eq!(rec.get("app").unwrap(), "logops");
        assert_eq!(rec.get("source").unwrap(), "ingest");
    }
}
