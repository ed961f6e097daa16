//! Downstream forwarding to the Ingest Normalizer, with retry + breaker
//! (spec §4.4). Builds on `logops_core::forwarder::run_with_retry`; this
//! module supplies the HTTP call and the gateway-specific header
//! templating and breaker wiring.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use logops_core::forwarder::{run_with_retry, AttemptOutcome};
use logops_core::retry::RetryConfig;

use crate::auth::RequestContext;
use crate::error::AuthGwError;
use crate::state::AppState;

/// Expand `{client_ip}`, `{emitter}`, `{scenario_id}`, `{api_key}`,
/// `{method}`, `{path}`, `{content_type}` placeholders in a header
/// template value. Missing placeholders are left literal (spec §4.4
/// "Forward headers").
fn expand_template(template: &str, ctx: &RequestContext, method: &str, path: &str, content_type: &str) -> String {
    template
        .replace("{client_ip}", &ctx.client_ip)
        .replace("{emitter}", &ctx.emitter)
        .replace("{scenario_id}", &ctx.scenario_id)
        .replace("{api_key}", ctx.api_key.as_deref().unwrap_or(""))
        .replace("{method}", method)
        .replace("{path}", path)
        .replace("{content_type}", content_type)
}

pub async fn forward(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    method: String,
    path: String,
    content_type: String,
    body: Bytes,
) -> Response {
    let retry = RetryConfig::new(state.config.retries.max_attempts, state.config.retries.base_delay_ms, state.config.retries.max_delay_ms);

    let result = run_with_retry(&retry, Some(&state.breaker), |_attempt| {
        let state = state.clone();
        let ctx = ctx.clone();
        let method = method.clone();
        let path = path.clone();
        let content_type = content_type.clone();
        let body = body.clone();
        async move {
            let mut req = state.http.post(&state.config.forward.url).body(body);
            req = req.header("Content-Type", content_type.clone());
            req = req.header("X-Emitter", ctx.emitter.clone());
            req = req.header("X-Scenario-Id", ctx.scenario_id.clone());
            for (name, template) in &state.config.forward.headers {
                let value = expand_template(template, &ctx, &method, &path, &content_type);
                req = req.header(name.as_str(), value);
            }

            match req.send().await {
                Ok(resp) => {
                    let status = resp.status();
                    let body = resp.bytes().await.unwrap_or_default();
                    if status.is_success() || status.is_client_error() {
                        // Spec §4.4 step 3: 2xx and 4xx are both final and
                        // count as a breaker success (client error is not a
                        // downstream fault).
                        (AttemptOutcome::Success, Ok((status, body)))
                    } else {
                        (AttemptOutcome::RetryableFailure, Ok((status, body)))
                    }
                }
                Err(e) => (AttemptOutcome::RetryableFailure, Err(e.to_string())),
            }
        }
    })
    .await;

    state.metrics.inc_forwarded();

    match result {
        None => {
            state.metrics.inc_rejected("circuit_open");
            AuthGwError::CircuitOpen.into_response()
        }
        Some((AttemptOutcome::Success, Ok((status, body)))) => build_passthrough_response(status, body),
        Some((AttemptOutcome::ClientError, Ok((status, body)))) => build_passthrough_response(status, body),
        Some((_, _)) => {
            state.metrics.inc_rejected("downstream_error");
            AuthGwError::DownstreamError.into_response()
        }
    }
}

fn build_passthrough_response(status: reqwest::StatusCode, body: Bytes) -> Response {
    let status = StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    (status, body).into_response()
}
