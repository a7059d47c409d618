use std::time::Duration;

use crate::session::error::BoundaryError;

/// Re-fetch rule for the session boundary. Only `fetch_next` is ever retried,
/// and only once: a verdict may already have been applied upstream when
/// `submit_verdict` fails, so resubmitting could count it twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FetchRetry {
    backoff: Duration,
}

impl FetchRetry {
    pub const MAX_RETRIES: u32 = 1;

    pub fn new(backoff: Duration) -> Self {
        Self { backoff }
    }

    pub fn can_retry(&self, err: &BoundaryError, attempt: u32) -> bool {
        err.retryable && attempt < Self::MAX_RETRIES
    }

    pub fn backoff(&self) -> Duration {
        self.backoff
    }
}
