//! Bounded-concurrency batch execution

pub mod error;
pub mod executor;
pub mod types;

pub use error::*;
pub use executor::*;
pub use types::*;
