//! Shared "call downstream with retry (and optionally a breaker)" helper,
//! used by both the Auth Gateway (breaker + retry) and the Ingest Normalizer
//! (retry only, per spec §4.5). Grounded on the sync client's
//! `SyncClient::sync`/`try_sync` attempt loop and
//! `services/authgw/downstream.py`'s `post_with_retry` classification of
//! 4xx-no-retry / 5xx-retry / exception-retry.

use std::time::Duration;

use crate::breaker::Breaker;
use crate::retry::RetryConfig;

/// Outcome classification for a single downstream attempt, independent of
/// the HTTP client used to make it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// 2xx: stop retrying, report success to the breaker.
    Success,
    /// 4xx other than 429: stop retrying, do not count against the breaker.
    ClientError,
    /// 429 or 5xx, or a transport-level failure: retry if attempts remain,
    /// count as a breaker failure.
    RetryableFailure,
}

/// Drive up to `retry.max_attempts` calls to `attempt`, sleeping per
/// `retry.delay_for` between them, honoring an optional breaker. `attempt`
/// performs one downstream call and classifies its own outcome.
///
/// Returns `None` if the breaker was open and no attempt was made at all.
pub async fn run_with_retry<F, Fut, T>(
    retry: &RetryConfig,
    breaker: Option<&Breaker>,
    mut attempt: F,
) -> Option<(AttemptOutcome, T)>
where
    F: FnMut(u32) -> Fut,
    Fut: std::future::Future<Output = (AttemptOutcome, T)>,
{
    if let Some(b) = breaker {
        if !b.allow() {
            return None;
        }
    }

    let mut last: Option<(AttemptOutcome, T)> = None;
    for n in 1..=retry.max_attempts {
        let (outcome, value) = attempt(n).await;
        match outcome {
            AttemptOutcome::Success => {
                if let Some(b) = breaker {
                    b.record_success();
                }
                return Some((outcome, value));
            }
            AttemptOutcome::ClientError => {
                return Some((outcome, value));
            }
            AttemptOutcome::RetryableFailure => {
                if let Some(b) = breaker {
                    b.record_failure();
                }
                last = Some((outcome, value));
                if retry.should_retry(n) {
                    tokio::time::sleep(retry.delay_for(n)).await;
                    continue;
                }
                break;
            }
        }
    }
    last
}

/// Convenience wrapper for the no-breaker case (Normalizer -> Sink).
pub async fn run_with_retry_no_breaker<F, Fut, T>(retry: &RetryConfig, attempt: F) -> Option<(AttemptOutcome, T)>
where
    F: FnMut(u32) -> Fut,
    Fut: std::future::Future<Output = (AttemptOutcome, T)>,
{
    run_with_retry(retry, None, attempt).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn stops_after_success() {
        let retry = RetryConfig::new(5, 1, 5);
        let calls = AtomicU32::new(0);
        let result = run_with_retry_no_breaker(&retry, |_n| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { (AttemptOutcome::Success, 200) }
        })
        .await;
        assert_eq!(result.unwrap().1, 200);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn does_not_retry_client_errors() {
        let retry = RetryConfig::new(5, 1, 5);
        let calls = AtomicU32::new(0);
        let result = run_with_retry_no_breaker(&retry, |_n| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { (AttemptOutcome::ClientError, 422) }
        })
        .await;
        assert_eq!(result.unwrap().1, 422);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_up_to_max_attempts() {
        let retry = RetryConfig::new(3, 1, 2);
        let calls = AtomicU32::new(0);
        let result = run_with_retry_no_breaker(&retry, |_n| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { (AttemptOutcome::RetryableFailure, 503) }
        })
        .await;
        assert_eq!(result.unwrap().1, 503);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn open_breaker_short_circuits_without_calling() {
        let retry = RetryConfig::new(3, 1, 2);
        let breaker = Breaker::new(0.1, Duration::from_secs(60));
        breaker.record_failure();
        assert!(!breaker.allow());
        let calls = AtomicU32::new(0);
        let result = run_with_retry(&retry, Some(&breaker), |_n| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { (AttemptOutcome::Success, 200) }
        })
        .await;
        assert!(result.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
