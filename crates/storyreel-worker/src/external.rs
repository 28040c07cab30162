//! Gated calls to generative services.

use std::future::Future;
use std::time::Instant;

use storyreel_ml_client::MlClientResult;
use tokio::sync::Semaphore;

use crate::error::{WorkerError, WorkerResult};
use crate::metrics;
use crate::retry::{call_with_backoff, RetryConfig};

/// Run `call` under the retry policy, holding one of `permits` per attempt.
///
/// The permit is released when an attempt finishes, so backoff sleeps do
/// not occupy a slot of the shared call budget.
pub(crate) async fn call_external<F, Fut, T>(
    retry: &RetryConfig,
    permits: &Semaphore,
    mut call: F,
) -> WorkerResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = MlClientResult<T>>,
{
    let started = Instant::now();
    let mut attempts = 0u32;

    let result = call_with_backoff(retry, || {
        attempts += 1;
        let attempt = call();
        async move {
            let _permit = permits.acquire().await?;
            attempt.await.map_err(WorkerError::from)
        }
    })
    .await;

    metrics::record_generation(
        &retry.operation_name,
        attempts,
        result.is_success(),
        started.elapsed().as_secs_f64(),
    );
    result.into_result()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use storyreel_ml_client::MlClientError;

    #[tokio::test(start_paused = true)]
    async fn test_permit_is_not_held_during_backoff() {
        let permits = Arc::new(Semaphore::new(1));
        let retry = RetryConfig::new("test").with_max_attempts(2);
        let calls = AtomicUsize::new(0);

        let observer = {
            let permits = Arc::clone(&permits);
            tokio::spawn(async move {
                // Mid-backoff, the single permit must be free.
                tokio::time::sleep(Duration::from_millis(500)).await;
                permits.available_permits()
            })
        };

        let result = call_external(&retry, &permits, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(MlClientError::request_failed("busy"))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 1);
        assert_eq!(observer.await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_exhaustion_returns_last_generation_error() {
        let permits = Semaphore::new(1);
        let retry = RetryConfig::new("test")
            .with_max_attempts(3)
            .with_base_delay(Duration::from_millis(1));

        let err = call_external(&retry, &permits, || async {
            Err::<(), _>(MlClientError::request_failed("down"))
        })
        .await
        .unwrap_err();

        assert!(matches!(err, WorkerError::Generation(_)));
        assert_eq!(permits.available_permits(), 1);
    }
}
