//! Linear-backoff retry for transient IO failures, per spec §7: ENOENT,
//! EACCES, EMFILE, ETIMEDOUT classified by message substring, retried up
//! to 3 times at 100/200/300 ms before the error is surfaced unchanged.

use std::time::Duration;

use workflow_core::error::{Result, WorkflowError};

const BACKOFF_MS: [u64; 3] = [100, 200, 300];

fn is_transient(err: &WorkflowError) -> bool {
    let WorkflowError::Io(msg) = err else {
        return false;
    };
    ["ENOENT", "EACCES", "EMFILE", "ETIMEDOUT", "timed out", "No such file"]
        .iter()
        .any(|needle| msg.contains(needle))
}

/// Retry `f` up to 3 additional times with linear backoff when it fails
/// with a transient IO error; any other error (or exhaustion) is returned
/// unchanged.
pub async fn with_retry<F, Fut, T>(mut f: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut last_err = None;
    for delay_ms in BACKOFF_MS.iter().copied() {
        match f().await {
            Ok(v) => return Ok(v),
            Err(e) if is_transient(&e) => {
                last_err = Some(e);
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
            Err(e) => return Err(e),
        }
    }
    match f().await {
        Ok(v) => Ok(v),
        Err(e) => Err(last_err.unwrap_or(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_transient_errors_then_succeeds() {
        let attempts = AtomicU32::new(0);
        let result: Result<i32> = with_retry(|| async {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err(WorkflowError::Io("ENOENT: not found yet".into()))
            } else {
                Ok(42)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_transient_errors_are_not_retried() {
        let attempts = AtomicU32::new(0);
        let result: Result<i32> = with_retry(|| async {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(WorkflowError::Validation("bad goal".into()))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
