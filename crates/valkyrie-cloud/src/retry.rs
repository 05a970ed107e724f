//! Retry engine
//!
//! Remote provisioning calls fail transiently: IAM changes take seconds to
//! propagate, and freshly created resources are not immediately visible to
//! dependent calls. Every facade call runs through [`retry`] with a fixed
//! delay and a bounded retry budget. The final error is propagated unchanged
//! so callers can still tell throttling from permission problems.

use crate::error::ApiError;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const DEFAULT_DELAY: Duration = Duration::from_secs(1);

/// How often to retry a failing call before giving up
///
/// `max_retries` counts additional attempts after the first; zero means a
/// single attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    /// Budget for provisioning calls, sized for IAM propagation delays
    pub fn provisioning() -> Self {
        Self {
            max_retries: 10,
            delay: DEFAULT_DELAY,
        }
    }

    /// Budget for generic operations
    pub fn standard() -> Self {
        Self {
            max_retries: 3,
            delay: DEFAULT_DELAY,
        }
    }

    /// Single attempt, no retries
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::standard()
    }
}

/// Run `action` until it succeeds or the retry budget is spent
///
/// The cancellation token is observed while the action is in flight and
/// during the inter-attempt delay; cancellation yields
/// [`ApiError::Cancelled`].
pub async fn retry<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut action: F,
) -> std::result::Result<T, ApiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, ApiError>>,
{
    let mut remaining = policy.max_retries;
    loop {
        if cancel.is_cancelled() {
            return Err(ApiError::Cancelled);
        }

        let result = tokio::select! {
            _ = cancel.cancelled() => return Err(ApiError::Cancelled),
            result = action() => result,
        };

        match result {
            Ok(value) => return Ok(value),
            Err(err) if remaining == 0 => return Err(err),
            Err(err) => {
                remaining -= 1;
                tracing::debug!(error = %err, remaining, "Call failed, retrying after delay");
                tokio::select! {
                    _ = cancel.cancelled() => return Err(ApiError::Cancelled),
                    _ = tokio::time::sleep(policy.delay) => {}
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            delay: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn test_success_passes_through() {
        let calls = AtomicU32::new(0);
        let result = retry(&fast(3), &CancellationToken::new(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, ApiError>(42) }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fails_twice_then_succeeds() {
        let calls = AtomicU32::new(0);
        let result = retry(&fast(3), &CancellationToken::new(), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(ApiError::CommandFailed("flaky".to_string()))
                } else {
                    Ok("done")
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_zero_retries_propagates_original_error() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry(&fast(0), &CancellationToken::new(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ApiError::AccessDenied("nope".to_string())) }
        })
        .await;
        assert!(matches!(result, Err(ApiError::AccessDenied(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_budget_exhausted_returns_final_error() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry(&fast(2), &CancellationToken::new(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ApiError::Throttled("slow down".to_string())) }
        })
        .await;
        assert!(matches!(result, Err(ApiError::Throttled(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_cancelled_token_short_circuits() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry(&fast(3), &cancel, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(()) }
        })
        .await;
        assert!(matches!(result, Err(ApiError::Cancelled)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
