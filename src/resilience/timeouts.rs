//! Timeout enforcement.
//!
//! # Responsibilities
//! - Bound each upstream attempt with a deadline
//! - Cancel the in-flight call through its token when the deadline fires
//!
//! # Design Decisions
//! - Cancellation goes through the attempt's `CancellationToken`; the guard then
//!   waits for the call to unwind so its connection is released
//! - A guard-fired cancellation is reported as `Timeout` (retryable), any other
//!   cancellation stays `Cancelled`

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::upstream::TransportError;

/// Run `call` with a deadline, cancelling `token` when it expires.
pub async fn with_deadline<T, Fut>(
    limit: Duration,
    token: CancellationToken,
    call: Fut,
) -> Result<T, TransportError>
where
    Fut: Future<Output = Result<T, TransportError>>,
{
    tokio::pin!(call);
    let outcome = tokio::time::timeout(limit, &mut call).await;
    match outcome {
        Ok(result) => result,
        Err(_) => {
            token.cancel();
            let _ = call.await;
            tracing::debug!(timeout = ?limit, "Upstream attempt cancelled by deadline");
            Err(TransportError::Timeout(limit))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn deadline_cancels_the_call() {
        let token = CancellationToken::new();
        let observed = Arc::new(AtomicBool::new(false));

        let call_token = token.clone();
        let flag = observed.clone();
        let started = tokio::time::Instant::now();
        let result: Result<(), _> = with_deadline(Duration::from_secs(30), token, async move {
            call_token.cancelled().await;
            flag.store(true, Ordering::SeqCst);
            Err(TransportError::Cancelled)
        })
        .await;

        assert_eq!(result, Err(TransportError::Timeout(Duration::from_secs(30))));
        assert!(observed.load(Ordering::SeqCst));
        assert_eq!(started.elapsed(), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn fast_call_passes_through() {
        let token = CancellationToken::new();
        let result = with_deadline(Duration::from_secs(30), token.clone(), async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            Ok::<_, TransportError>(7)
        })
        .await;
        assert_eq!(result, Ok(7));
        assert!(!token.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn outside_cancellation_is_not_a_timeout() {
        let token = CancellationToken::new();
        let call_token = token.clone();
        token.cancel();
        let result: Result<(), _> = with_deadline(Duration::from_secs(30), token, async move {
            call_token.cancelled().await;
            Err(TransportError::Cancelled)
        })
        .await;
        assert_eq!(result, Err(TransportError::Cancelled));
    }
}
