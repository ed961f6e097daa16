//! `/v1/logs` handler for the Core Sink (spec §4.7).

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{json, Map, Value};

use crate::AppState;

pub async fn ingest_logs(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    state.metrics.inflight_inc();
    let response = handle(&state, &body);
    state.metrics.inflight_dec();
    response
}

fn handle(state: &AppState, body: &Bytes) -> Response {
    if body.len() > state.config.sink.max_body_bytes {
        state.metrics.inc_rejected("too_large");
        return (StatusCode::PAYLOAD_TOO_LARGE, axum::Json(json!({"detail": "body too large"}))).into_response();
    }

    let value: Value = match serde_json::from_slice(body) {
        Ok(v) => v,
        Err(e) => {
            state.metrics.inc_rejected("bad_json");
            return (StatusCode::BAD_REQUEST, axum::Json(json!({"detail": format!("bad json: {e}")}))).into_response();
        }
    };

    let items: Vec<Value> = match value {
        Value::Object(obj) => vec![Value::Object(obj)],
        Value::Array(items) => items,
        _ => {
            state.metrics.inc_rejected("bad_json");
            return (StatusCode::BAD_REQUEST, axum::Json(json!({"detail": "body must be a JSON object or array"}))).into_response();
        }
    };

    if items.len() > state.config.sink.max_items {
        state.metrics.inc_rejected("too_many_items");
        return (StatusCode::PAYLOAD_TOO_LARGE, axum::Json(json!({"detail": "too many items"}))).into_response();
    }

    let records: Vec<Map<String, Value>> = items
        .into_iter()
        .filter_map(|v| match v {
            Value::Object(obj) => Some(obj),
            _ => None,
        })
        .collect();

    if records.is_empty() {
        state.metrics.inc_rejected("bad_request");
        return (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(json!({"detail": "no object records in array"}))).into_response();
    }

    match state.sink.write_batch(records) {
        Ok(accepted) => {
            state.metrics.inc_accepted(accepted as u64);
            (StatusCode::OK, axum::Json(json!({"accepted": accepted}))).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to write ndjson batch");
            (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(json!({"detail": "write failed"}))).into_response()
        }
    }
}
