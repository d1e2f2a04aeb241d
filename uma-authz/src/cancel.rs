use std::future::Future;
use tokio_util::sync::CancellationToken;

/// Marker returned when a [`cancellable`] future lost the race against its token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

/// Runs `future` until it completes or `cancel` fires.
///
/// On cancellation the future is dropped, which aborts any in-flight HTTP
/// request it owns.
pub async fn cancellable<F>(cancel: &CancellationToken, future: F) -> Result<F::Output, Cancelled>
where
    F: Future,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Cancelled),
        output = future => Ok(output),
    }
}
