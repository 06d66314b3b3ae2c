//! Bounded retry on a fixed schedule.

use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::GeneratorError;

/// Retry schedule: one delay per retry, so `delays.len()` retries follow the
/// first attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    delays: Vec<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(vec![
            Duration::from_secs(2),
            Duration::from_secs(4),
            Duration::from_secs(8),
        ])
    }
}

impl RetryPolicy {
    pub fn new(delays: Vec<Duration>) -> Self {
        Self { delays }
    }

    /// A single attempt, no retries.
    pub fn none() -> Self {
        Self::new(Vec::new())
    }

    pub fn max_retries(&self) -> usize {
        self.delays.len()
    }

    pub fn delays(&self) -> &[Duration] {
        &self.delays
    }

    /// Run `operation` until it succeeds, fails with a non-retryable error, or
    /// the schedule is exhausted. The attempt number (starting at 0) is passed
    /// in. Cancelling the token aborts both the pending attempt and any
    /// backoff sleep with [`GeneratorError::Cancelled`].
    pub async fn run<T, F, Fut>(
        &self,
        operation_name: &str,
        cancel: &CancellationToken,
        mut operation: F,
    ) -> Result<T, GeneratorError>
    where
        F: FnMut(usize) -> Fut,
        Fut: Future<Output = Result<T, GeneratorError>>,
    {
        let mut attempt = 0;
        loop {
            if cancel.is_cancelled() {
                return Err(GeneratorError::Cancelled);
            }

            let result = tokio::select! {
                result = operation(attempt) => result,
                _ = cancel.cancelled() => Err(GeneratorError::Cancelled),
            };

            let error = match result {
                Ok(value) => {
                    if attempt > 0 {
                        tracing::info!(
                            attempt = attempt + 1,
                            operation = operation_name,
                            "Generation succeeded after retry"
                        );
                    }
                    return Ok(value);
                }
                Err(GeneratorError::Cancelled) => return Err(GeneratorError::Cancelled),
                Err(error) => error,
            };

            if !error.is_retryable() {
                tracing::error!(error = %error, operation = operation_name, "Generation failed with non-retryable error");
                return Err(error);
            }

            let Some(delay) = self.delays.get(attempt).copied() else {
                tracing::error!(
                    attempts = attempt + 1,
                    error = %error,
                    operation = operation_name,
                    "Generation failed after all retry attempts"
                );
                return Err(error);
            };

            tracing::warn!(
                attempt = attempt + 1,
                max_retries = self.max_retries(),
                delay_ms = delay.as_millis() as u64,
                error = %error,
                operation = operation_name,
                "Generation failed, retrying..."
            );

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancel.cancelled() => return Err(GeneratorError::Cancelled),
            }
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn flaky(failures: usize, calls: Arc<AtomicUsize>) -> impl FnMut(usize) -> std::future::Ready<Result<&'static str, GeneratorError>> {
        move |_| {
            let call = calls.fetch_add(1, Ordering::SeqCst);
            std::future::ready(if call < failures {
                Err(GeneratorError::Timeout)
            } else {
                Ok("ok")
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_retries() {
        let calls = Arc::new(AtomicUsize::new(0));
        let started = tokio::time::Instant::now();

        let result = RetryPolicy::default()
            .run("test", &CancellationToken::new(), flaky(2, calls.clone()))
            .await;

        assert_eq!(result, Ok("ok"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(6) && elapsed < Duration::from_secs(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_schedule() {
        let calls = Arc::new(AtomicUsize::new(0));
        let started = tokio::time::Instant::now();

        let result = RetryPolicy::default()
            .run("test", &CancellationToken::new(), flaky(10, calls.clone()))
            .await;

        assert_eq!(result, Err(GeneratorError::Timeout));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(14) && elapsed < Duration::from_secs(15));
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_stops_immediately() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let result: Result<(), _> = RetryPolicy::default()
            .run("test", &CancellationToken::new(), move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                std::future::ready(Err(GeneratorError::Rejected("policy".into())))
            })
            .await;

        assert!(matches!(result, Err(GeneratorError::Rejected(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_backoff() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let result = RetryPolicy::default()
            .run("test", &cancel, flaky(10, calls.clone()))
            .await;

        assert_eq!(result, Err(GeneratorError::Cancelled));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_already_cancelled() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = RetryPolicy::none()
            .run("test", &cancel, |_| std::future::ready(Ok(())))
            .await;
        assert_eq!(result, Err(GeneratorError::Cancelled));
    }
}
