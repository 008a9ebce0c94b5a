use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Why a bounded call did not produce a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Interrupted {
    #[error("timed out after {0:?}")]
    TimedOut(Duration),
    #[error("cancelled")]
    Cancelled,
}

/// Runs `fut` until it completes, `timeout` elapses, or `cancel` fires.
///
/// Every outbound call in the crate (feed fetch, article fetch, model call)
/// goes through here so the same policy applies everywhere. Cancellation
/// wins over a simultaneously ready result.
pub async fn bounded<F>(
    timeout: Duration,
    cancel: &CancellationToken,
    fut: F,
) -> Result<F::Output, Interrupted>
where
    F: Future,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Interrupted::Cancelled),
        res = tokio::time::timeout(timeout, fut) => res.map_err(|_| Interrupted::TimedOut(timeout)),
    }
}
