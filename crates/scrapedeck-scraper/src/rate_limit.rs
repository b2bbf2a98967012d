//! Pacing and retry for the Fetcher.
//!
//! Every attempt is preceded by a randomized pacing sleep. A failed attempt
//! sleeps again for a window picked by failure class (throttling status,
//! other status, transport error) before the next try. Non-retriable errors
//! propagate immediately.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use scrapedeck_core::{DelayRange, FetchPolicy};

use crate::error::ScraperError;

fn is_retriable(err: &ScraperError) -> bool {
    matches!(
        err,
        ScraperError::Http(_)
            | ScraperError::Throttled { .. }
            | ScraperError::UnexpectedStatus { .. }
    )
}

/// The backoff window for a failed attempt.
pub(crate) fn backoff_window(err: &ScraperError, policy: &FetchPolicy) -> DelayRange {
    match err {
        ScraperError::Throttled { status, .. } => policy.throttle_window(*status),
        ScraperError::UnexpectedStatus { .. } => policy.other_status,
        _ => policy.transport_error,
    }
}

/// Picks a uniformly random duration from `range`, multiplied by `scale`.
pub(crate) fn jittered(range: DelayRange, scale: f64) -> Duration {
    let lo = (range.min_secs * scale).max(0.0);
    let hi = (range.max_secs * scale).max(0.0);
    if !hi.is_finite() || hi <= 0.0 {
        return Duration::ZERO;
    }
    let secs = if hi > lo {
        rand::rng().random_range(lo..=hi)
    } else {
        lo
    };
    Duration::from_secs_f64(secs)
}

pub(crate) async fn pause(range: DelayRange, scale: f64) {
    let delay = jittered(range, scale);
    if !delay.is_zero() {
        tracing::debug!(delay_ms = delay.as_millis(), "pacing");
        tokio::time::sleep(delay).await;
    }
}

/// Runs `operation` up to `max_attempts` times (at least once).
///
/// `operation` receives the zero-based attempt index so callers can vary the
/// request on retries. When every attempt fails with a retriable error the
/// result is [`ScraperError::MaxRetriesExceeded`] carrying the last error.
pub(crate) async fn retry_paced<T, F, Fut>(
    url: &str,
    max_attempts: u32,
    policy: &FetchPolicy,
    scale: f64,
    mut operation: F,
) -> Result<T, ScraperError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, ScraperError>>,
{
    let attempts = max_attempts.max(1);
    let mut last_error = String::new();

    for attempt in 0..attempts {
        pause(policy.pacing, scale).await;

        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) if !is_retriable(&err) => return Err(err),
            Err(err) => {
                tracing::warn!(
                    url,
                    attempt = attempt + 1,
                    max_attempts = attempts,
                    error = %err,
                    "fetch attempt failed"
                );
                if attempt + 1 < attempts {
                    pause(backoff_window(&err, policy), scale).await;
                }
                last_error = err.to_string();
            }
        }
    }

    Err(ScraperError::MaxRetriesExceeded {
        url: url.to_owned(),
        attempts,
        last_error,
    })
}
