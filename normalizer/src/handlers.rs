//! `/v1/logs` handler (spec §4.5-§4.6, §6).

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::normalize::normalize_record;
use crate::parsers::{parse_body, ParseError};
use crate::AppState;

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn scenario_id(headers: &HeaderMap) -> String {
    header_str(headers, "X-Scenario-Id").or_else(|| header_str(headers, "X-Scenario")).unwrap_or("na").to_string()
}

fn emitter(headers: &HeaderMap) -> String {
    header_str(headers, "X-Emitter").unwrap_or("unknown").to_string()
}

pub async fn ingest_logs(State(state): State<Arc<AppState>>, headers: HeaderMap, body: Bytes) -> Response {
    state.metrics.inflight_inc();
    let response = handle(&state, &headers, &body).await;
    state.metrics.inflight_dec();
    response
}

async fn handle(state: &AppState, headers: &HeaderMap, body: &Bytes) -> Response {
    let content_type = header_str(headers, "Content-Type").unwrap_or("application/json").to_string();
    let emitter = emitter(headers);
    let scenario_id = scenario_id(headers);

    let parsed = match parse_body(&content_type, body) {
        Ok(records) => records,
        Err(ParseError::InvalidJson(msg)) => {
            state.metrics.inc_parse_error();
            return (StatusCode::BAD_REQUEST, axum::Json(json!({"detail": format!("bad json: {msg}")}))).into_response();
        }
        Err(ParseError::NoValidRecords { invalid_indices, total }) => {
            state.metrics.inc_parse_error();
            return (
                StatusCode::UNPROCESSABLE_ENTITY,
                axum::Json(json!({
                    "detail": "no valid records",
                    "invalid_indices": invalid_indices,
                    "total": total,
                })),
            )
                .into_response();
        }
    };

    let normalized: Vec<_> = parsed.into_iter().map(|r| normalize_record(r, &emitter, &scenario_id)).collect();

    crate::forwarder::forward(&state.http, &state.config.forward.url, &state.retry, &normalized).await
}
