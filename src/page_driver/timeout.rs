//! Timeout utilities for page operations

use std::future::Future;
use std::time::Duration;

use super::{DriverError, DriverResult};

/// Wrap one driver operation with an explicit timeout.
///
/// Distinguishes a timeout from the operation's own failure so callers can
/// tell a hung page from a missing element.
pub async fn with_page_timeout<F, T>(
    operation: F,
    timeout: Duration,
    operation_name: &str,
) -> DriverResult<T>
where
    F: Future<Output = DriverResult<T>>,
{
    match tokio::time::timeout(timeout, operation).await {
        Ok(result) => result,
        Err(_) => Err(DriverError::Timeout {
            operation: operation_name.to_string(),
            secs: timeout.as_secs(),
        }),
    }
}
