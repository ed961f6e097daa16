//! Handler-seam error taxonomy (spec §7). Every rejection maps to exactly
//! one `(status, reason)` pair; `IntoResponse` sets `X-AuthGW-Reason` and
//! the JSON `{"detail": ...}` body in one place, matching the Design Note
//! in spec §9 ("map each failure kind to the taxonomy once, at the handler
//! seam").

use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthGwError {
    #[error("unknown client")]
    UnknownClient,
    /// `400` when the timestamp header itself is unparseable; `401` when it
    /// parses but falls outside the clock-skew window (spec §4.1 step 2).
    #[error("timestamp skew")]
    ClockSkew { parse_error: bool },
    #[error("bad nonce")]
    BadNonce,
    /// `400` when the body digest doesn't match `X-Content-SHA256`; `401`
    /// when the HMAC signature itself doesn't match (spec §4.1 steps 4-5).
    #[error("bad signature")]
    BadSignature { digest_mismatch: bool },
    #[error("request too large")]
    TooLarge,
    #[error("request too large (content-length)")]
    TooLargeHeader,
    #[error("rate limited")]
    RateLimited { retry_after_secs: u64 },
    #[error("circuit open")]
    CircuitOpen,
    #[error("downstream error")]
    DownstreamError,
    #[error("bad request: {0}")]
    BadRequest(String),
}

impl AuthGwError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthGwError::UnknownClient => StatusCode::UNAUTHORIZED,
            AuthGwError::ClockSkew { parse_error } => {
                if *parse_error {
                    StatusCode::BAD_REQUEST
                } else {
                    StatusCode::UNAUTHORIZED
                }
            }
            AuthGwError::BadNonce => StatusCode::UNAUTHORIZED,
            AuthGwError::BadSignature { digest_mismatch } => {
                if *digest_mismatch {
                    StatusCode::BAD_REQUEST
                } else {
                    StatusCode::UNAUTHORIZED
                }
            }
            AuthGwError::TooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            AuthGwError::TooLargeHeader => StatusCode::PAYLOAD_TOO_LARGE,
            AuthGwError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AuthGwError::CircuitOpen => StatusCode::SERVICE_UNAVAILABLE,
            AuthGwError::DownstreamError => StatusCode::BAD_GATEWAY,
            AuthGwError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    pub fn reason(&self) -> &'static str {
        match self {
            AuthGwError::UnknownClient => "unknown_client",
            AuthGwError::ClockSkew { .. } => "clock_skew",
            AuthGwError::BadNonce => "bad_nonce",
            AuthGwError::BadSignature { .. } => "bad_signature",
            AuthGwError::TooLarge => "too_large",
            AuthGwError::TooLargeHeader => "too_large_hdr",
            AuthGwError::RateLimited { .. } => "rate_limited",
            AuthGwError::CircuitOpen => "circuit_open",
            AuthGwError::DownstreamError => "downstream_error",
            AuthGwError::BadRequest(_) => "bad_request",
        }
    }
}

impl IntoResponse for AuthGwError {
    fn into_response(self) -> Response {
        let status = self.status();
        let reason = self.reason();
        let mut response = (status, axum::Json(json!({ "detail": self.to_string() }))).into_response();
        response
            .headers_mut()
            .insert("X-AuthGW-Reason", HeaderValue::from_static(reason));
        response
            .headers_mut()
            .insert("X-AuthGW-Counted", HeaderValue::from_static("1"));
        if let AuthGwError::RateLimited { retry_after_secs } = self {
            if let Ok(v) = HeaderValue::from_str(&retry_after_secs.to_string()) {
                response.headers_mut().insert("Retry-After", v);
            }
        }
        response
    }
}
