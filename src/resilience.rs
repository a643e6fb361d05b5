//! Retry with exponential backoff for a single task thunk
//!
//! Retrying is layered around one operation and never done by the batch
//! executor itself. [`with_retry`] turns a repeatable operation into a
//! one-shot thunk that can be handed to [`run_batch`](crate::run_batch).

use std::future::Future;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, instrument, warn};

/// Errors that can occur in retry operations
#[derive(Error, Debug)]
pub enum RetryError<E> {
    /// Every permitted attempt failed
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted {
        /// Attempts made, including the first
        attempts: usize,
        /// Error from the final attempt
        #[source]
        last: E,
    },

    /// The operation failed with an error the predicate refused to retry
    #[error("attempt {attempt} failed with a non-retryable error: {source}")]
    NotRetryable {
        /// Attempt on which the error occurred
        attempt: usize,
        /// The error itself
        source: E,
    },

    /// Retry configuration cannot run any attempt
    #[error("invalid retry configuration: {0}")]
    InvalidConfig(String),
}

impl<E> RetryError<E> {
    /// The underlying operation error, if one was recorded
    pub fn into_inner(self) -> Option<E> {
        match self {
            RetryError::Exhausted { last, .. } => Some(last),
            RetryError::NotRetryable { source, .. } => Some(source),
            RetryError::InvalidConfig(_) => None,
        }
    }
}

/// Retry configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first
    pub max_attempts: usize,
    /// Initial delay between retries
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Backoff multiplier
    pub backoff_multiplier: f64,
    /// Add up to 10% jitter to prevent thundering herd
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

/// Retry executor
#[derive(Debug, Clone, Default)]
pub struct RetryExecutor {
    config: RetryConfig,
}

impl RetryExecutor {
    /// Create an executor with the given policy
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Active configuration
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Execute an operation, retrying every failure
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        self.execute_if(operation, |_| true).await
    }

    /// Execute an operation, retrying only errors accepted by `should_retry`
    #[instrument(skip_all, fields(max_attempts = self.config.max_attempts))]
    pub async fn execute_if<F, Fut, T, E, P>(
        &self,
        mut operation: F,
        should_retry: P,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
        P: Fn(&E) -> bool,
    {
        if self.config.max_attempts == 0 {
            return Err(RetryError::InvalidConfig(
                "max_attempts must be at least 1".to_string(),
            ));
        }

        let mut attempt = 0;
        let mut delay = self.config.initial_delay;

        loop {
            attempt += 1;

            match operation().await {
                Ok(result) => {
                    if attempt > 1 {
                        info!("Operation succeeded after {} attempts", attempt);
                    }
                    return Ok(result);
                }
                Err(err) if !should_retry(&err) => {
                    warn!(attempt, "Operation failed with non-retryable error: {}", err);
                    return Err(RetryError::NotRetryable { attempt, source: err });
                }
                Err(err) => {
                    if attempt >= self.config.max_attempts {
                        error!("Max retry attempts exceeded: {}", err);
                        return Err(RetryError::Exhausted {
                            attempts: attempt,
                            last: err,
                        });
                    }

                    let actual_delay = self.jittered(delay);
                    warn!("Attempt {} failed: {}, retrying in {:?}", attempt, err, actual_delay);
                    tokio::time::sleep(actual_delay).await;

                    delay = self.next_delay(delay);
                }
            }
        }
    }

    fn jittered(&self, delay: Duration) -> Duration {
        if !self.config.jitter {
            return delay;
        }
        let jitter_ms = (delay.as_millis() as f64 * rand::random::<f64>() * 0.1) as u64;
        delay + Duration::from_millis(jitter_ms)
    }

    fn next_delay(&self, delay: Duration) -> Duration {
        Duration::from_millis((delay.as_millis() as f64 * self.config.backoff_multiplier) as u64)
            .min(self.config.max_delay)
    }
}

/// Wrap a repeatable operation into a one-shot thunk that retries it.
///
/// The result plugs straight into the batch executor:
///
/// ```
/// use bounded_batch::{run_batch, with_retry, RetryConfig};
///
/// # tokio_test::block_on(async {
/// let tasks: Vec<_> = (0..3)
///     .map(|i| with_retry(RetryConfig::default(), move || async move {
///         Ok::<_, std::io::Error>(i)
///     }))
///     .collect();
/// assert_eq!(run_batch(tasks, 2).await.unwrap(), vec![0, 1, 2]);
/// # });
/// ```
pub fn with_retry<F, Fut, T, E>(
    config: RetryConfig,
    operation: F,
) -> impl FnOnce() -> BoxFuture<'static, Result<T, RetryError<E>>>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    move || async move { RetryExecutor::new(config).execute(operation).await }.boxed()
}
