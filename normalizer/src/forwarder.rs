//! Forwards the normalized record array to the Core Sink with retry but no
//! breaker (spec §4.6: "same retry discipline as §4.4, no breaker
//! required").

use axum::body::Bytes;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::Value;

use logops_core::forwarder::{run_with_retry_no_breaker, AttemptOutcome};
use logops_core::retry::RetryConfig;

pub async fn forward(client: &reqwest::Client, url: &str, retry: &RetryConfig, records: &[serde_json::Map<String, Value>]) -> Response {
    let body = Bytes::from(serde_json::to_vec(records).expect("records always serialize"));

    let result = run_with_retry_no_breaker(retry, |_attempt| {
        let client = client.clone();
        let url = url.to_string();
        let body = body.clone();
        async move {
            match client.post(&url).header("Content-Type", "application/json").body(body).send().await {
                Ok(resp) => {
                    let status = resp.status();
                    let bytes = resp.bytes().await.unwrap_or_default();
                    if status.is_success() || status.is_client_error() {
                        (AttemptOutcome::Success, Ok((status, bytes)))
                    } else {
                        (AttemptOutcome::RetryableFailure, Ok((status, bytes)))
                    }
                }
                Err(e) => (AttemptOutcome::RetryableFailure, Err(e.to_string())),
            }
        }
    })
    .await;

    match result {
        Some((_, Ok((status, bytes)))) => {
            let converted = StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
            match serde_json::from_slice::<Value>(&bytes) {
                Ok(json) => (converted, axum::Json(json)).into_response(),
                Err(_) => (converted, axum::Json(serde_json::json!({"downstream_text": String::from_utf8_lossy(&bytes)}))).into_response(),
            }
        }
        _ => (StatusCode::BAD_GATEWAY, axum::Json(serde_json::json!({"detail": "downstream error"}))).into_response(),
    }
}
