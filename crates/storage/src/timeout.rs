//! Per-operation time limits for durable store calls.
//!
//! Every durable lookup on the admission path is bounded. There are no
//! retries: when the limit fires, the operation fails with
//! [`StorageError::Timeout`] and the request is denied.

use std::{future::Future, time::Duration};

use crate::error::{StorageError, StorageResult};

/// Default time limit for a single durable store operation.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// Runs `operation` with an upper bound of `limit` on its wall-clock time.
///
/// The inner future is dropped when the limit fires; nothing is propagated
/// to the store beyond that.
///
/// # Errors
///
/// Returns whatever `operation` returns, or [`StorageError::Timeout`] if it
/// did not complete within `limit`.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use gatekeeper_storage::{StorageError, timeout::with_timeout};
///
/// # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
/// let value = with_timeout(Duration::from_secs(1), "lookup", async { Ok::<_, StorageError>(7) }).await;
/// assert_eq!(value.unwrap(), 7);
/// # });
/// ```
#[tracing::instrument(skip(operation), fields(timeout_ms = limit.as_millis() as u64))]
pub async fn with_timeout<Fut, T>(
    limit: Duration,
    operation_name: &str,
    operation: Fut,
) -> StorageResult<T>
where
    Fut: Future<Output = StorageResult<T>>,
{
    match tokio::time::timeout(limit, operation).await {
        Ok(result) => result,
        Err(_elapsed) => {
            tracing::warn!(operation = operation_name, "store operation timed out");
            Err(StorageError::timeout())
        },
    }
}
