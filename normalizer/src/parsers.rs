//! Format-agnostic body parsing (spec §4.5). Grounded on
//! `services/ingestgw/parsers.py`'s `parse_syslog_line`/`parse_csv_text_body`
//! and `services/ingestgw/app.py`'s content-type dispatch, rebuilt with the
//! `csv` and `regex` crates rather than hand-rolled splitting.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

#[derive(Debug)]
pub enum ParseError {
    InvalidJson(String),
    /// No element of a JSON array was an object; carries the first 50
    /// invalid indices plus the total element count (spec §4.5).
    NoValidRecords { invalid_indices: Vec<usize>, total: usize },
}

/// Dispatch on `Content-Type`: anything other than `text/csv`/`text/plain`
/// (including no content-type) is treated as JSON, per spec §4.5.
pub fn parse_body(content_type: &str, body: &[u8]) -> Result<Vec<Map<String, Value>>, ParseError> {
    let ct = content_type.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
    match ct.as_str() {
        "text/csv" => Ok(parse_csv(body)),
        "text/plain" => Ok(parse_plain_text(body)),
        _ => parse_json(body),
    }
}

fn parse_json(body: &[u8]) -> Result<Vec<Map<String, Value>>, ParseError> {
    let value: Value = serde_json::from_slice(body).map_err(|e| ParseError::InvalidJson(e.to_string()))?;
    match value {
        Value::Object(obj) => Ok(vec![obj]),
        Value::Array(items) => {
            let total = items.len();
            let mut records = Vec::with_capacity(total);
            let mut invalid_indices = Vec::new();
            for (i, item) in items.into_iter().enumerate() {
                match item {
                    Value::Object(obj) => records.push(obj),
                    _ => invalid_indices.push(i),
                }
            }
            if records.is_empty() && total > 0 {
                invalid_indices.truncate(50);
                return Err(ParseError::NoValidRecords { invalid_indices, total });
            }
            Ok(records)
        }
        _ => Err(ParseError::InvalidJson("top-level JSON value must be an object or array".to_string())),
    }
}

static HEADER_TS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^(ts|timestamp)$").unwrap());
static HEADER_LEVEL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^(level|lvl|severity)$").unwrap());
static HEADER_MSG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^(msg|message|log|text)$").unwrap());

fn looks_like_header(record: &csv::StringRecord) -> bool {
    record.len() >= 3
        && HEADER_TS.is_match(record[0].trim())
        && HEADER_LEVEL.is_match(record[1].trim())
        && HEADER_MSG.is_match(record[2].trim())
}

fn parse_csv(body: &[u8]) -> Vec<Map<String, Value>> {
    let mut reader = csv::ReaderBuilder::new().has_headers(false).flexible(true).from_reader(body);
    let mut records = Vec::new();
    let mut first = true;
    for result in reader.records() {
        let Ok(row) = result else { continue };
        if row.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        if first {
            first = false;
            if looks_like_header(&row) {
                continue;
            }
        }
        let ts = row.get(0).unwrap_or("").to_string();
        let level = row.get(1).unwrap_or("").to_string();
        let msg = row.iter().skip(2).collect::<Vec<_>>().join(",");

        let mut map = Map::new();
        if !ts.is_empty() {
            map.insert("ts".to_string(), Value::String(ts));
        }
        if !level.is_empty() {
            map.insert("level".to_string(), Value::String(level));
        }
        map.insert("msg".to_string(), Value::String(msg));
        records.push(map);
    }
    records
}

static SYSLOG_TS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4}-\d{2}-\d{2}\s+\d{2}:\d{2}:\d{2})\s+([A-Z]+)?\s*(.*)$").unwrap());
static LEVEL_WORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(DEBUG|INFO|WARN|ERROR|TRACE|FATAL)\b").unwrap());
static HOST_APP_PID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\S+ \S+\[\d+\]:\s*").unwrap());

fn parse_plain_text(body: &[u8]) -> Vec<Map<String, Value>> {
    let text = String::from_utf8_lossy(body);
    let mut records = Vec::new();
    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let mut map = Map::new();
        if let Some(caps) = SYSLOG_TS_RE.captures(line) {
            let ts = caps.get(1).unwrap().as_str().to_string();
            let level = caps.get(2).map(|m| m.as_str().to_string());
            let rest = caps.get(3).map(|m| m.as_str()).unwrap_or("");
            let rest = HOST_APP_PID_RE.replace(rest, "").into_owned();
            map.insert("ts".to_string(), Value::String(ts));
            if let Some(level) = level {
                map.insert("level".to_string(), Value::String(level));
            }
            map.insert("msg".to_string(), Value::String(rest));
        } else {
            let level = LEVEL_WORD_RE.find(line).map(|m| m.as_str().to_string());
            if let Some(level) = level {
                map.insert("level".to_string(), Value::String(level));
            }
            map.insert("msg".to_string(), Value::String(line.to_string()));
        }
        records.push(map);
    }
    records
}
