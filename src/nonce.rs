//! Anti-replay nonce tracking (spec §4.2). Grounded on
//! `services/authgw/hmac_mw.py`'s Redis `SETNX`+`EXPIRE` pattern, and
//! `server/src/redis_client.rs`'s `ConnectionManager` wrapper for the
//! shared-backend variant. `NonceStore` is duck-typed behind an async trait
//! per spec §9's design note, so the gateway can run with either backend
//! without the call sites caring which one is active.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::error::Result;

/// Records whether a `(emitter, nonce)` pair has been seen before within the
/// configured window. Implementations must treat "first sighting" as the
/// atomic, racy-safe operation (`SETNX`-equivalent).
#[async_trait]
pub trait NonceStore: Send + Sync {
    /// Returns `true` if this is the first time `key` has been observed
    /// within `ttl`; `false` if it is a replay.
    async fn check_and_set(&self, key: &str, ttl: Duration) -> Result<bool>;
}

/// Process-local nonce store for single-instance deployments. Expired
/// entries are reaped lazily on insert, matching the teacher's preference
/// for `dashmap` over a background sweeper thread.
pub struct MemoryNonceStore {
    seen: DashMap<String, Instant>,
}

impl MemoryNonceStore {
    pub fn new() -> Self {
        Self { seen: DashMap::new() }
    }

    fn sweep_expired(&self) {
        self.seen.retain(|_, expires_at| *expires_at > Instant::now());
    }
}

impl Default for MemoryNonceStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NonceStore for MemoryNonceStore {
    async fn check_and_set(&self, key: &str, ttl: Duration) -> Result<bool> {
        if self.seen.len() > 4096 {
            self.sweep_expired();
        }
        let expires_at = Instant::now() + ttl;
        match self.seen.entry(key.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(mut o) => {
                if *o.get() <= Instant::now() {
                    o.insert(expires_at);
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            dashmap::mapref::entry::Entry::Vacant(v) => {
                v.insert(expires_at);
                Ok(true)
            }
        }
    }
}

/// Shared nonce store backed by Redis, for multi-instance gateway
/// deployments (spec §9 "shared nonce/rate-limit backend"). Uses `SET NX
/// EX` so the check-and-set is atomic across processes.
pub struct RedisNonceStore {
    conn: ConnectionManager,
    prefix: String,
}

impl RedisNonceStore {
    pub fn new(conn: ConnectionManager, prefix: impl Into<String>) -> Self {
        Self { conn, prefix: prefix.into() }
    }
}

#[async_trait]
impl NonceStore for RedisNonceStore {
    async fn check_and_set(&self, key: &str, ttl: Duration) -> Result<bool> {
        let redis_key = format!("{}:{}", self.prefix, key);
        let mut conn = self.conn.clone();
        let set: Option<String> = redis::cmd("SET")
            .arg(&redis_key)
            .arg(1)
            .arg("NX")
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async(&mut conn)
            .await?;
        Ok(set.is_some())
    }
}

#[allow(dead_code)]
async fn _assert_async_commands_in_scope(mut conn: ConnectionManager) -> Result<()> {
    let _: Option<String> = conn.get("unused").await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_sighting_is_allowed() {
        let store = MemoryNonceStore::new();
        assert!(store.check_and_set("e1:n1", Duration::from_secs(60)).await.unwrap());
    }

    #[tokio::test]
    async fn replay_is_rejected() {
        let store = MemoryNonceStore::new();
        assert!(store.check_and_set("e1:n1", Duration::from_secs(60)).await.unwrap());
        assert!(!store.check_and_set("e1:n1", Duration::from_secs(60)).await.unwrap());
    }

    #[tokio::test]
    async fn expired_entry_is_allowed_again() {
        let store = MemoryNonceStore::new();
        assert!(store.check_and_set("e1:n1", Duration::from_millis(1)).await.unwrap());
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(store.check_and_set("e1:n1", Duration::from_secs(60)).await.unwrap());
    }
}
