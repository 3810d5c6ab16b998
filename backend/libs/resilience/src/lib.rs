/// Resilience helpers for calls that leave the process
///
/// This library provides the two patterns the poller relies on:
/// - **Timeout**: Enforces time limits on external calls and on whole runs
/// - **Retry**: Exponential backoff with jitter, restricted to errors the caller
///   classifies as transient
/// - **Preset Configurations**: Pre-tuned settings for external HTTP APIs
///
/// # Example: Retry only transient failures
///
/// ```rust,no_run
/// use resilience::{presets, with_retry_if};
///
/// #[tokio::main]
/// async fn main() {
///     let config = presets::http_external_config();
///
///     let result = with_retry_if(
///         config.retry.unwrap_or_default(),
///         |status: &u16| *status == 429 || *status >= 500,
///         || async {
///             // Your HTTP call here
///             Ok::<_, u16>(())
///         },
///     )
///     .await;
/// }
/// ```
///
/// # Example: Bound a whole run with a wall-clock ceiling
///
/// ```rust,no_run
/// use resilience::timeout::with_timeout;
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() {
///     let outcome = with_timeout(Duration::from_secs(240), async {
///         // One poll-and-notify cycle
///     })
///     .await;
/// }
/// ```

pub mod presets;
pub mod retry;
pub mod timeout;

// Re-export main types for convenience
pub use presets::{http_enrichment_config, http_external_config, ServiceConfig};
pub use retry::{with_retry_if, RetryConfig, RetryError};
pub use timeout::{with_timeout, TimeoutConfig, TimeoutError};
