use std::env;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::batch::ConfigError;
use crate::Result;

/// Concurrency limit used when the caller does not pick one
pub const DEFAULT_CONCURRENCY_LIMIT: usize = 5;

/// Environment variable overriding [`BatchConfig::concurrency_limit`]
pub const ENV_CONCURRENCY_LIMIT: &str = "BOUNDED_BATCH_CONCURRENCY_LIMIT";

/// Environment variable overriding [`BatchConfig::in_flight`]
pub const ENV_IN_FLIGHT: &str = "BOUNDED_BATCH_IN_FLIGHT";

/// What happens to already-dispatched tasks once a sibling has failed.
///
/// Either way no further task is dispatched after the first failure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InFlightPolicy {
    /// Drop outstanding tasks, cancelling them at their next await point
    #[default]
    Cancel,
    /// Leave outstanding tasks running on the runtime and ignore their outcomes
    Detach,
}

impl FromStr for InFlightPolicy {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cancel" => Ok(InFlightPolicy::Cancel),
            "detach" => Ok(InFlightPolicy::Detach),
            _ => Err(()),
        }
    }
}

/// Batch execution configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Maximum number of tasks in flight at once
    pub concurrency_limit: usize,
    /// Treatment of in-flight tasks after the first failure
    pub in_flight: InFlightPolicy,
}

/// On-disk shape of [`BatchConfig`] before validation
#[derive(Deserialize)]
struct ConfigDocument {
    concurrency_limit: Option<i64>,
    in_flight: Option<InFlightPolicy>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: DEFAULT_CONCURRENCY_LIMIT,
            in_flight: InFlightPolicy::default(),
        }
    }
}

impl BatchConfig {
    /// Build a config from a signed limit, rejecting zero and negatives
    pub fn try_from_signed(limit: i64) -> std::result::Result<Self, ConfigError> {
        if limit <= 0 {
            return Err(ConfigError::InvalidConcurrencyLimit(limit));
        }
        let concurrency_limit =
            usize::try_from(limit).map_err(|_| ConfigError::InvalidConcurrencyLimit(limit))?;
        Ok(Self {
            concurrency_limit,
            ..Default::default()
        })
    }

    /// Parse a JSON document; missing fields fall back to defaults.
    ///
    /// The limit is read as a signed integer so that zero and negative
    /// values are reported as [`ConfigError::InvalidConcurrencyLimit`], the
    /// same way the environment loader reports them.
    pub fn from_json(json: &str) -> Result<Self> {
        let document: ConfigDocument = serde_json::from_str(json)?;

        let mut config = match document.concurrency_limit {
            Some(limit) => Self::try_from_signed(limit)?,
            None => Self::default(),
        };
        if let Some(policy) = document.in_flight {
            config.in_flight = policy;
        }

        config.validate()?;
        Ok(config)
    }

    /// Read overrides from `BOUNDED_BATCH_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub(crate) fn from_lookup<L>(lookup: L) -> Result<Self>
    where
        L: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_CONCURRENCY_LIMIT) {
            let limit: i64 = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: ENV_CONCURRENCY_LIMIT.to_string(),
                value: raw.clone(),
            })?;
            config.concurrency_limit = Self::try_from_signed(limit)?.concurrency_limit;
        }

        if let Some(raw) = lookup(ENV_IN_FLIGHT) {
            config.in_flight = raw.parse().map_err(|_| ConfigError::InvalidValue {
                key: ENV_IN_FLIGHT.to_string(),
                value: raw.clone(),
            })?;
        }

        Ok(config)
    }

    /// Reject configurations no batch could run under
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.concurrency_limit == 0 {
            return Err(ConfigError::InvalidConcurrencyLimit(0));
        }
        Ok(())
    }
}

/// Progress callback, invoked with `(completed, total)` after each success
pub type ProgressCallback = Box<dyn Fn(usize, usize) + Send + Sync>;

/// Statistics for one batch execution
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchStats {
    /// Size of the submitted batch
    pub total_tasks: usize,
    /// Thunks actually invoked
    pub dispatched: usize,
    /// Tasks that finished successfully
    pub completed: usize,
    /// Highest number of tasks in flight at any point
    pub peak_in_flight: usize,
    /// Wall time from first dispatch to the batch settling
    pub duration: Duration,
}
