// Races a future against a deadline and the caller's cancellation token.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Why a bounded future did not finish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Interrupted {
    Cancelled,
    TimedOut,
}

/// Run `fut` until it completes, `limit` elapses, or `cancel` fires.
/// Cancellation wins ties so a cancelled caller never sees a late result.
pub(crate) async fn run_bounded<F: Future>(
    cancel: &CancellationToken,
    limit: Duration,
    fut: F,
) -> Result<F::Output, Interrupted> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(Interrupted::Cancelled),
        result = tokio::time::timeout(limit, fut) => result.map_err(|_| Interrupted::TimedOut),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn deadline_interrupts_slow_future() {
        let cancel = CancellationToken::new();
        let slow = tokio::time::sleep(Duration::from_secs(60));
        let result = run_bounded(&cancel, Duration::from_secs(1), slow).await;
        assert_eq!(result, Err(Interrupted::TimedOut));
    }

    #[tokio::test]
    async fn cancelled_token_wins() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = run_bounded(&cancel, Duration::from_secs(1), async { 7 }).await;
        assert_eq!(result, Err(Interrupted::Cancelled));
    }

    #[tokio::test]
    async fn completed_future_passes_through() {
        let cancel = CancellationToken::new();
        let result = run_bounded(&cancel, Duration::from_secs(1), async { 7 }).await;
        assert_eq!(result, Ok(7));
    }
}
