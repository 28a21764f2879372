//! Timeout and retry wrapper for external calls.

use std::future::Future;
use std::time::Duration;

use crate::config::RetryPolicy;
use crate::error::{ChannelError, SinkError};

/// Errors that can say whether another attempt might succeed.
pub trait Retryable: std::fmt::Display {
    fn is_retryable(&self) -> bool;
}

impl Retryable for SinkError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Http(_) | Self::Timeout { .. } | Self::Unavailable(_) => true,
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            Self::Credentials(_) | Self::AuthFailed(_) | Self::HeaderMismatch { .. } => false,
        }
    }
}

impl Retryable for ChannelError {
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::SendFailed { .. } | Self::ApiFailed { .. } | Self::Timeout { .. }
        )
    }
}

/// Delay before attempt `attempt + 1`: backoff, 2×backoff, 4×backoff, …
fn retry_delay(backoff: Duration, attempt: u32) -> Duration {
    backoff.saturating_mul(1 << (attempt - 1).min(16))
}

/// Run `op` with a per-attempt `timeout`, retrying retryable failures up to
/// the policy's attempt limit. An elapsed timeout becomes `on_timeout()`.
pub async fn with_retry<T, E, F, Fut>(
    policy: RetryPolicy,
    timeout: Duration,
    what: &str,
    mut op: F,
    on_timeout: impl Fn() -> E,
) -> Result<T, E>
where
    E: Retryable,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 1;
    loop {
        let result = match tokio::time::timeout(timeout, op()).await {
            Ok(result) => result,
            Err(_) => Err(on_timeout()),
        };

        match result {
            Ok(value) => return Ok(value),
            Err(e) if attempt < policy.max_attempts && e.is_retryable() => {
                let delay = retry_delay(policy.backoff, attempt);
                tracing::warn!(what, attempt, ?delay, error = %e, "Call failed, retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
