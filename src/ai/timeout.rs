//! Timeout and Cancellation Guards
//!
//! Every suspension point of a run (schema fetch, completion, decision
//! prompt, apply) is wrapped here so that:
//! - an operator interrupt aborts it promptly with `AssistError::Cancelled`
//! - a hung call fails after its own deadline with an operation-specific error
//!
//! ## Usage
//!
//! ```ignore
//! use crate::ai::timeout::{TimeoutConfig, guarded};
//!
//! let config = TimeoutConfig::default();
//! let text = guarded(
//!     &cancel,
//!     config.completion,
//!     backend.complete(&request),
//!     "completion request",
//!     AssistError::backend_timeout,
//! ).await?;
//! ```

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::constants;
use crate::types::{AssistError, Result};

/// Per-operation deadlines
#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    /// Timeout for completion requests (default: 2 minutes)
    pub completion: Duration,
    /// Timeout for schema fetches (default: 30 seconds)
    pub schema: Duration,
    /// Timeout for cluster apply calls (default: 30 seconds)
    pub apply: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            completion: Duration::from_secs(constants::llm::DEFAULT_TIMEOUT_SECS),
            schema: Duration::from_secs(constants::schema::DEFAULT_TIMEOUT_SECS),
            apply: Duration::from_secs(constants::cluster::DEFAULT_TIMEOUT_SECS),
        }
    }
}

/// Execute an async operation with a timeout
///
/// `on_timeout` builds the error reported when the deadline passes, so each
/// caller surfaces its own error kind.
pub async fn with_timeout<T, F, E>(timeout: Duration, future: F, on_timeout: E) -> Result<T>
where
    F: Future<Output = Result<T>>,
    E: FnOnce(Duration) -> AssistError,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => result,
        Err(_) => Err(on_timeout(timeout)),
    }
}

/// Execute an async operation with a timeout, aborting on cancellation
///
/// Cancellation wins over completion when both are ready.
pub async fn guarded<T, F, E>(
    cancel: &CancellationToken,
    timeout: Duration,
    future: F,
    operation_name: &str,
    on_timeout: E,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
    E: FnOnce(Duration) -> AssistError,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(AssistError::Cancelled(operation_name.to_string())),
        result = with_timeout(timeout, future, on_timeout) => result,
    }
}

/// Await an operation that has no deadline (operator input), aborting on cancellation
pub async fn cancellable<T, F>(cancel: &CancellationToken, future: F, operation_name: &str) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(AssistError::Cancelled(operation_name.to_string())),
        result = future => result,
    }
}
