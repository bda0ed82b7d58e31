//! Retry helper for recoverable storage conditions
//!
//! A stale rotation snapshot or an idempotent schedule reinsert is retried
//! locally exactly once; every other error surfaces immediately.

use std::future::Future;
use tracing::{debug, warn};

use crate::error::EngineResult;

/// Run an operation, retrying once when it fails with a recoverable error
pub async fn retry_once_recoverable<T, F, Fut>(operation_name: &str, mut op: F) -> EngineResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = EngineResult<T>>,
{
    match op().await {
        Ok(value) => Ok(value),
        Err(err) if err.is_recoverable() => {
            warn!(
                operation = operation_name,
                error = %err,
                "recoverable failure, retrying once"
            );
            let retried = op().await;
            if retried.is_ok() {
                debug!(operation = operation_name, "retry succeeded");
            }
            retried
        }
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_success_passes_through() {
        let calls = AtomicU32::new(0);
        let result: EngineResult<u32> = retry_once_recoverable("op", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(7) }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_recoverable_error_retried_once() {
        let calls = AtomicU32::new(0);
        let result: EngineResult<u32> = retry_once_recoverable("op", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(EngineError::stale_snapshot("version raced"))
                } else {
                    Ok(9)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 9);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_fatal_error_not_retried() {
        let calls = AtomicU32::new(0);
        let result: EngineResult<u32> = retry_once_recoverable("op", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(EngineError::config("bad region")) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_second_failure_surfaces() {
        let calls = AtomicU32::new(0);
        let result: EngineResult<u32> = retry_once_recoverable("op", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(EngineError::stale_snapshot("still racing")) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
