//! Canonical request signing for the HMAC authentication contract.
//!
//! Canonical string: `METHOD\nPATH\nBODY_SHA_HEX\nTS\nNONCE`, exactly as
//! spec'd. PATH excludes the query string; NONCE is the empty string when
//! the client omitted it.

use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::error::{CoreError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Lowercase hex SHA-256 of `body`, used for the `X-Content-SHA256` check.
pub fn sha256_hex(body: &[u8]) -> String {
    let digest = Sha256::digest(body);
    hex::encode(digest)
}

/// Build the canonical string to be signed.
pub fn canonical_string(method: &str, path: &str, body_sha_hex: &str, ts: &str, nonce: &str) -> String {
    format!("{}\n{}\n{}\n{}\n{}", method.to_ascii_uppercase(), path, body_sha_hex, ts, nonce)
}

/// Parse an ISO8601 UTC timestamp with a `Z` suffix or explicit offset,
/// seconds precision, normalized to UTC.
pub fn parse_iso8601_utc(ts: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(ts) {
        return Ok(dt.with_timezone(&Utc));
    }
    // `chrono::DateTime::parse_from_rfc3339` rejects a bare `Z` with
    // fractional-second-free input on some inputs; fall back to a manual
    // substitution the way the original's `_parse_iso8601` does.
    if let Some(stripped) = ts.strip_suffix('Z') {
        let with_offset = format!("{stripped}+00:00");
        if let Ok(dt) = DateTime::parse_from_rfc3339(&with_offset) {
            return Ok(dt.with_timezone(&Utc));
        }
    }
    Err(CoreError::InvalidTimestamp(ts.to_string()))
}

/// HMAC-SHA256 signer/verifier over a per-client secret.
pub struct HmacSigner {
    secret: Vec<u8>,
}

impl HmacSigner {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self { secret: secret.into() }
    }

    /// Base64-encoded HMAC-SHA256 of `canonical`.
    pub fn sign(&self, canonical: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(&self.secret).expect("HMAC accepts any key length");
        mac.update(canonical.as_bytes());
        STANDARD.encode(mac.finalize().into_bytes())
    }

    /// Constant-time verification of a base64-encoded signature.
    pub fn verify(&self, canonical: &str, signature_b64: &str) -> bool {
        let expected = self.sign(canonical);
        constant_time_eq(expected.as_bytes(), signature_b64.as_bytes())
    }
}

/// Constant-time byte comparison to prevent timing attacks.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
