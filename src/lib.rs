//! `logops-core`: shared signing, rate-limiting, breaker, nonce and
//! normalization primitives used by the `authgw`, `normalizer` and `sink`
//! binaries that make up the LogOps ingestion pipeline.

pub mod breaker;
pub mod bucket;
pub mod canonical;
pub mod error;
pub mod forwarder;
pub mod nonce;
pub mod record;
pub mod retry;

pub use error::{CoreError, Result};
