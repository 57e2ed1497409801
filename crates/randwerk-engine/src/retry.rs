// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Retry policy for document reads: exponential backoff with jitter.
//
// Only transient errors (locked or briefly unreadable files) are retried.
// Permanent content errors and internal faults are recorded straight away.

use std::time::Duration;

use rand::Rng;
use randwerk_core::config::RetrySettings;
use randwerk_core::error::{RandwerkError, Result};
use randwerk_core::types::ErrorCategory;
use tracing::{debug, warn};

/// Result of evaluating whether to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after this delay.
    RetryAfter(Duration),
    /// Do not retry, the error is not transient.
    GiveUp(ErrorCategory),
    /// Maximum retries exhausted.
    Exhausted,
}

/// Decide whether to retry after `attempt` earlier retries.
pub fn should_retry(err: &RandwerkError, attempt: u32, settings: &RetrySettings) -> RetryDecision {
    match err.category() {
        ErrorCategory::Transient => {
            if attempt >= settings.max_retries {
                warn!(attempt, max = settings.max_retries, "retry limit exhausted");
                RetryDecision::Exhausted
            } else {
                let delay = compute_delay(attempt, settings);
                debug!(attempt, delay_ms = delay.as_millis() as u64, "scheduling retry");
                RetryDecision::RetryAfter(delay)
            }
        }
        other => RetryDecision::GiveUp(other),
    }
}

/// Exponential backoff with jitter.
///
/// delay = min(base * 2^attempt + jitter, max_delay), jitter in [0, base / 2).
pub fn compute_delay(attempt: u32, settings: &RetrySettings) -> Duration {
    let base_ms = settings.base_delay_ms;
    let exp_ms = base_ms.saturating_mul(1u64 << attempt.min(10));
    let jitter_ms = if base_ms >= 2 {
        rand::thread_rng().gen_range(0..base_ms / 2)
    } else {
        0
    };
    let capped_ms = exp_ms.saturating_add(jitter_ms).min(settings.max_delay_ms);
    Duration::from_millis(capped_ms)
}

/// Run `op`, retrying transient failures with backoff.
///
/// Returns the final outcome and whether any retry happened.
pub fn with_retry<T>(
    settings: &RetrySettings,
    mut op: impl FnMut() -> Result<T>,
) -> (Result<T>, bool) {
    let mut attempt = 0;
    loop {
        match op() {
            Ok(value) => return (Ok(value), attempt > 0),
            Err(err) => match should_retry(&err, attempt, settings) {
                RetryDecision::RetryAfter(delay) => {
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                RetryDecision::GiveUp(_) | RetryDecision::Exhausted => {
                    return (Err(err), attempt > 0);
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    fn quick() -> RetrySettings {
        RetrySettings {
            max_retries: 1,
            base_delay_ms: 1,
            max_delay_ms: 5,
        }
    }

    fn locked() -> RandwerkError {
        RandwerkError::Io(io::Error::new(io::ErrorKind::WouldBlock, "locked"))
    }

    #[test]
    fn transient_error_retried_once() {
        let settings = RetrySettings::default();
        assert!(matches!(
            should_retry(&locked(), 0, &settings),
            RetryDecision::RetryAfter(_)
        ));
        assert_eq!(should_retry(&locked(), 1, &settings), RetryDecision::Exhausted);
    }

    #[test]
    fn permanent_error_never_retries() {
        let err = RandwerkError::PdfError("bad xref".into());
        assert_eq!(
            should_retry(&err, 0, &RetrySettings::default()),
            RetryDecision::GiveUp(ErrorCategory::Permanent)
        );
    }

    #[test]
    fn delay_increases_with_attempts() {
        let settings = RetrySettings {
            max_retries: 5,
            base_delay_ms: 100,
            max_delay_ms: 10_000,
        };
        let d0 = compute_delay(0, &settings);
        let d1 = compute_delay(1, &settings);
        let d2 = compute_delay(2, &settings);
        assert!(d1 > d0);
        assert!(d2 > d1);
    }

    #[test]
    fn delay_capped_at_max() {
        let settings = RetrySettings::default();
        assert!(compute_delay(20, &settings) <= settings.max_delay());
    }

    #[test]
    fn with_retry_recovers_from_one_transient_failure() {
        let mut calls = 0;
        let (result, retried) = with_retry(&quick(), || {
            calls += 1;
            if calls == 1 { Err(locked()) } else { Ok(calls) }
        });
        assert_eq!(result.unwrap(), 2);
        assert!(retried);
    }

    #[test]
    fn with_retry_gives_up_after_limit() {
        let mut calls = 0;
        let (result, retried) = with_retry(&quick(), || -> Result<()> {
            calls += 1;
            Err(locked())
        });
        assert!(result.is_err());
        assert!(retried);
        assert_eq!(calls, 2);
    }

    #[test]
    fn with_retry_does_not_repeat_permanent_failures() {
        let mut calls = 0;
        let (result, retried) = with_retry(&quick(), || -> Result<()> {
            calls += 1;
            Err(RandwerkError::Encrypted("locked.pdf".into()))
        });
        assert!(result.is_err());
        assert!(!retried);
        assert_eq!(calls, 1);
    }
}
