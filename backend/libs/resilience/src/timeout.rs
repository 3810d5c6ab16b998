/// Timeout wrappers for async operations
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

/// Per-call deadline carried by a preset
#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    pub duration: Duration,
}

#[derive(Debug, thiserror::Error)]
pub enum TimeoutError {
    #[error("Operation timed out after {0:?}")]
    Elapsed(Duration),
}

/// Execute a future with timeout
///
/// The future is dropped when the deadline passes, so it must be safe to
/// abandon at any await point.
pub async fn with_timeout<F, T>(duration: Duration, future: F) -> Result<T, TimeoutError>
where
    F: Future<Output = T>,
{
    timeout(duration, future)
        .await
        .map_err(|_| TimeoutError::Elapsed(duration))
}
