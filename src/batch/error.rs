//! Batch execution errors

use thiserror::Error;

/// Errors raised while loading or validating batch configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Concurrency limit was zero or negative
    #[error("concurrency limit must be a positive integer, got {0}")]
    InvalidConcurrencyLimit(i64),

    /// An environment variable held a value that could not be parsed
    #[error("invalid value {value:?} for {key}")]
    InvalidValue {
        /// Variable name
        key: String,
        /// Raw value as found in the environment
        value: String,
    },
}

/// Failure of a whole batch.
///
/// `E` is the error type produced by the individual task thunks. A batch
/// fails on the first task error it observes; results of the other tasks
/// are never surfaced.
#[derive(Error, Debug)]
pub enum BatchError<E> {
    /// Malformed batch configuration, reported before any task is dispatched
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The task at `index` failed
    #[error("task {index} failed: {source}")]
    TaskFailure {
        /// Position of the failing task in the submitted sequence
        index: usize,
        /// Error returned by the task
        source: E,
    },

    /// A spawned task was torn down by the runtime before it finished
    #[error("task {index} was aborted before completing")]
    Aborted {
        /// Position of the aborted task in the submitted sequence
        index: usize,
    },
}

impl<E> BatchError<E> {
    /// Index of the task that brought the batch down, if any
    pub fn task_index(&self) -> Option<usize> {
        match self {
            BatchError::InvalidArgument(_) => None,
            BatchError::TaskFailure { index, .. } | BatchError::Aborted { index } => Some(*index),
        }
    }

    /// Unwrap the task's own error, discarding the index
    pub fn into_task_error(self) -> Option<E> {
        match self {
            BatchError::TaskFailure { source, .. } => Some(source),
            _ => None,
        }
    }

    /// True when the batch was rejected before running anything
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, BatchError::InvalidArgument(_))
    }
}

impl<E> From<ConfigError> for BatchError<E> {
    fn from(err: ConfigError) -> Self {
        BatchError::InvalidArgument(err.to_string())
    }
}
