//! Per-emitter token-bucket rate-limit middleware (spec §4.2). Runs after
//! `auth_middleware` has populated the `RequestContext` extension, so a
//! request that fails authentication never debits a bucket (spec §5
//! ordering guarantee).

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;

use crate::auth::RequestContext;
use crate::error::AuthGwError;
use crate::state::AppState;

const BYPASS_PATHS: &[&str] = &["/healthz", "/metrics"];

pub async fn rate_limit_middleware(State(state): State<Arc<AppState>>, request: Request, next: Next) -> Response {
    if BYPASS_PATHS.contains(&request.uri().path()) {
        return next.run(request).await;
    }

    let emitter = request
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.emitter.clone())
        .unwrap_or_else(|| "unknown".to_string());

    let bucket = state.bucket_for(&emitter);
    let capacity = state.rate_limit_capacity_for(&emitter);

    if !bucket.try_take(&emitter) {
        let remaining = bucket.remaining(&emitter);
        let refill = state
            .config
            .rate_limit
            .per_emitter
            .get(&emitter)
            .map(|t| t.refill_per_sec)
            .unwrap_or(state.config.rate_limit.refill_per_sec)
            .max(0.0001);
        let retry_after = ((1.0 - remaining) / refill).ceil().max(1.0) as u64;
        state.metrics.inc_rejected("rate_limited");
        return AuthGwError::RateLimited { retry_after_secs: retry_after }.into_response_with_limit(capacity, remaining);
    }

    let remaining = bucket.remaining(&emitter);
    let mut response = next.run(request).await;
    apply_limit_headers(&mut response, capacity, remaining);
    response
}

fn apply_limit_headers(response: &mut Response, capacity: f64, remaining: f64) {
    if let Ok(v) = HeaderValue::from_str(&(capacity.floor() as i64).to_string()) {
        response.headers_mut().insert("X-RateLimit-Limit", v);
    }
    if let Ok(v) = HeaderValue::from_str(&(remaining.floor().max(0.0) as i64).to_string()) {
        response.headers_mut().insert("X-RateLimit-Remaining", v);
    }
}

use axum::response::IntoResponse;

impl AuthGwError {
    /// Like `into_response`, but also stamps the always-present
    /// `X-RateLimit-*` headers (spec §4.2: "Always emit ... regardless of
    /// admission outcome").
    pub fn into_response_with_limit(self, capacity: f64, remaining: f64) -> Response {
        let mut response = self.into_response();
        apply_limit_headers(&mut response, capacity, remaining);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::auth_middleware;
    use crate::config::{AuthConfig, AuthGwConfig, AuthMode, BackpressureConfig, BreakerConfig, ForwardConfig, RateLimitConfig, RetryConfigToml, ServerConfig};
    use axum::body::Body;
    use axum::http::{Request as HttpRequest, StatusCode};
    use axum::routing::post;
    use axum::Router;
    use tower::ServiceExt;

    fn config_with_limit(capacity: f64, refill: f64) -> AuthGwConfig {
        AuthGwConfig {
            server: ServerConfig { host: "127.0.0.1".into(), port: 0 },
            auth: AuthConfig { mode: AuthMode::None, clock_skew_sec: 30, require_nonce: false },
            clients: vec![],
            rate_limit: RateLimitConfig { capacity, refill_per_sec: refill, per_emitter: Default::default() },
            forward: ForwardConfig { url: "http://127.0.0.1:0/v1/logs".into(), timeout_sec: 5, headers: Default::default() },
            retries: RetryConfigToml { max_attempts: 1, base_delay_ms: 1, max_delay_ms: 2 },
            breaker: BreakerConfig { failure_threshold: 0.5, half_open_after_sec: 30 },
            backpressure: BackpressureConfig { enabled: true, max_body_bytes: 1024 },
            redis: Default::default(),
        }
    }

    async fn ok_handler() -> &'static str {
        "ok"
    }

    #[tokio::test]
    async fn admits_up_to_capacity_then_429s() {
        let cfg = config_with_limit(2.0, 0.0001);
        let state = Arc::new(AppState::new(cfg).await.unwrap());
        let app = Router::new()
            .route("/ingest", post(ok_handler))
            .layer(axum::middleware::from_fn_with_state(state.clone(), rate_limit_middleware))
            .layer(axum::middleware::from_fn_with_state(state.clone(), auth_middleware))
            .with_state(state);

        for _ in 0..2 {
            let req = HttpRequest::builder().method("POST").uri("/ingest").body(Body::empty()).unwrap();
            let res = app.clone().oneshot(req).await.unwrap();
            assert_eq!(res.status(), StatusCode::OK);
        }
        let req = HttpRequest::builder().method("POST").uri("/ingest").body(Body::empty()).unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(res.headers().get("Retry-After").is_some());
    }
}
