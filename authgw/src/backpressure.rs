//! Body-size backpressure (spec §4.3): rejects before the request ever
//! reaches the forwarder or the breaker.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::error::AuthGwError;
use crate::state::AppState;

fn content_length(headers: &HeaderMap) -> Option<usize> {
    headers.get("Content-Length")?.to_str().ok()?.parse().ok()
}

pub async fn backpressure_middleware(State(state): State<Arc<AppState>>, request: Request, next: Next) -> Response {
    if !state.config.backpressure.enabled {
        return next.run(request).await;
    }

    let max = state.config.backpressure.max_body_bytes;
    if let Some(len) = content_length(request.headers()) {
        if len > max {
            state.metrics.inc_rejected("too_large_hdr");
            return AuthGwError::TooLargeHeader.into_response();
        }
    }

    let (parts, body) = request.into_parts();
    let bytes = match axum::body::to_bytes(body, max + 1).await {
        Ok(b) => b,
        Err(_) => {
            state.metrics.inc_rejected("too_large");
            return AuthGwError::TooLarge.into_response();
        }
    };
    if bytes.len() > max {
        state.metrics.inc_rejected("too_large");
        return AuthGwError::TooLarge.into_response();
    }

    let request = Request::from_parts(parts, Body::from(bytes));
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AuthConfig, AuthGwConfig, AuthMode, BackpressureConfig, BreakerConfig, ForwardConfig, RateLimitConfig, RetryConfigToml, ServerConfig};
    use axum::http::{Request as HttpRequest, StatusCode};
    use axum::routing::post;
    use axum::Router;
    use tower::ServiceExt;

    fn config_with_max(max_body_bytes: usize) -> AuthGwConfig {
        AuthGwConfig {
            server: ServerConfig { host: "127.0.0.1".into(), port: 0 },
            auth: AuthConfig { mode: AuthMode::None, clock_skew_sec: 30, require_nonce: false },
            clients: vec![],
            rate_limit: RateLimitConfig { capacity: 50.0, refill_per_sec: 10.0, per_emitter: Default::default() },
            forward: ForwardConfig { url: "http://127.0.0.1:0/v1/logs".into(), timeout_sec: 5, headers: Default::default() },
            retries: RetryConfigToml { max_attempts: 1, base_delay_ms: 1, max_delay_ms: 2 },
            breaker: BreakerConfig { failure_threshold: 0.5, half_open_after_sec: 30 },
            backpressure: BackpressureConfig { enabled: true, max_body_bytes },
            redis: Default::default(),
        }
    }

    async fn ok_handler() -> &'static str {
        "ok"
    }

    #[tokio::test]
    async fn rejects_oversized_body() {
        let cfg = config_with_max(4);
        let state = Arc::new(AppState::new(cfg).await.unwrap());
        let app = Router::new()
            .route("/ingest", post(ok_handler))
            .layer(axum::middleware::from_fn_with_state(state.clone(), backpressure_middleware))
            .with_state(state);

        let req = HttpRequest::builder().method("POST").uri("/ingest").body(Body::from("way too long")).unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(res.headers().get("X-AuthGW-Reason").unwrap(), "too_large");
    }

    #[tokio::test]
    async fn admits_body_within_limit() {
        let cfg = config_with_max(1024);
        let state = Arc::new(AppState::new(cfg).await.unwrap());
        let app = Router::new()
            .route("/ingest", post(ok_handler))
            .layer(axum::middleware::from_fn_with_state(state.clone(), backpressure_middleware))
            .with_state(state);

        let req = HttpRequest::builder().method("POST").uri("/ingest").body(Body::from("short")).unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }
}
