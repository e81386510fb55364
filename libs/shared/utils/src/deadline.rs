use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

/// An operation did not finish before its deadline.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{operation} timed out after {} ms", .limit.as_millis())]
pub struct DeadlineExceeded {
    pub operation: &'static str,
    pub limit: Duration,
}

/// Runs `operation` with a deadline. The future is dropped on timeout; for a
/// submitted write that means the outcome is unknown to the caller.
pub async fn within<F, T>(limit: Duration, operation: &'static str, fut: F) -> Result<T, DeadlineExceeded>
where
    F: Future<Output = T>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(value) => Ok(value),
        Err(_) => {
            warn!("{} exceeded its {} ms deadline", operation, limit.as_millis());
            Err(DeadlineExceeded { operation, limit })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn returns_value_before_deadline() {
        let value = within(Duration::from_millis(100), "fast", async { 7 }).await;
        assert_eq!(value, Ok(7));
    }

    #[tokio::test(start_paused = true)]
    async fn reports_operation_on_timeout() {
        let result = within(Duration::from_millis(100), "slow", async {
            tokio::time::sleep(Duration::from_secs(10)).await;
        })
        .await;

        let err = result.unwrap_err();
        assert_eq!(err.operation, "slow");
        assert_eq!(err.to_string(), "slow timed out after 100 ms");

        let boxed: Box<dyn std::error::Error + Send + Sync> = Box::new(err);
        assert!(boxed.source().is_none());
    }
}
