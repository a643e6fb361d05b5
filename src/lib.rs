//! # Bounded Batch
//!
//! Fan out many independent asynchronous operations, typically per-item
//! network requests, without overwhelming the server or the connection pool.
//!
//! ## Quick Start
//!
//! ```rust
//! use bounded_batch::run_batch;
//!
//! # async fn fetch(id: u32) -> Result<String, std::io::Error> { Ok(format!("video-{id}")) }
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let ids = vec![11, 12, 13, 14];
//! let tasks = ids.into_iter().map(|id| move || fetch(id));
//!
//! // At most two requests in flight; results come back in input order
//! let videos = run_batch(tasks, 2).await?;
//! assert_eq!(videos[0], "video-11");
//! # Ok(())
//! # }
//! ```
//!
//! ## Key Features
//!
//! - **Hard concurrency cap**: never more than `concurrency_limit` tasks in flight
//! - **Index-stable results**: `results[i]` belongs to `tasks[i]`
//! - **Fail fast**: the first error settles the batch and stops new dispatches
//! - **Composable retry**: backoff wraps single thunks, not the batch
//! - **Strict envelopes**: backend responses decode through one schema
//!
//! ## Modules
//!
//! - [`batch`]: Bounded-concurrency executor
//! - [`resilience`]: Retry with exponential backoff
//! - [`envelope`]: Response envelope and request-failure classification
//! - [`telemetry`]: Logging setup

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

use thiserror::Error;

/// Result type for crate-level operations
pub type Result<T> = std::result::Result<T, Error>;

/// Crate-level error for configuration and response handling
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid or unparseable configuration
    #[error("Configuration error: {0}")]
    Config(#[from] batch::ConfigError),

    /// Backend response could not be unwrapped
    #[error("Envelope error: {0}")]
    Envelope(#[from] envelope::EnvelopeError),

    /// Request failed before a response envelope arrived
    #[error("Request failed: {0}")]
    Request(#[from] envelope::RequestFailure),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Bounded-concurrency batch execution
pub mod batch;

/// Retry policies for single operations
pub mod resilience;

/// Backend response envelope
pub mod envelope;

/// Logging setup
pub mod telemetry;

pub use batch::{
    run_batch, run_batch_detached, BatchConfig, BatchError, BatchExecutor, BatchStats,
    InFlightPolicy,
};
pub use envelope::{decode_envelope, ApiEnvelope, RequestFailure, RequestProfile};
pub use resilience::{with_retry, RetryConfig, RetryError, RetryExecutor};

#[cfg(test)]
mod tests {
    use super::*;

    fn load_and_decode(config_json: &str, body: &[u8]) -> Result<(BatchConfig, u32)> {
        let config = BatchConfig::from_json(config_json)?;
        let value = decode_envelope::<u32>(body)?;
        Ok((config, value))
    }

    #[test]
    fn test_errors_aggregate_into_crate_error() {
        let (config, value) =
            load_and_decode(r#"{"concurrency_limit": 8}"#, br#"{"data": 4}"#).unwrap();
        assert_eq!(config.concurrency_limit, 8);
        assert_eq!(value, 4);

        let err = load_and_decode("{}", br#"{"success": false, "message": "nope"}"#).unwrap_err();
        assert!(matches!(err, Error::Envelope(envelope::EnvelopeError::Rejected(_))));
        assert_eq!(err.to_string(), "Envelope error: request rejected: nope");
    }

    #[test]
    fn test_request_failure_converts() {
        let err: Error = RequestFailure::from_status(503, None).into();
        assert_eq!(err.to_string(), "Request failed: service unavailable");
    }
}
