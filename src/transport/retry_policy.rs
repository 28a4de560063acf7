use std::time::Duration;

/// Fixed small retry budget for supplementary metadata fetches.
pub(crate) const RETRY_MAX_ATTEMPTS: u32 = 3;
const RETRY_BACKOFF_STEP_MS: u64 = 500;

/// Linear backoff: 500ms after the first failure, 1000ms after the second.
#[inline]
pub(crate) fn linear_backoff_delay(attempt: u32) -> Duration {
    Duration::from_millis(RETRY_BACKOFF_STEP_MS.saturating_mul(u64::from(attempt)))
}
