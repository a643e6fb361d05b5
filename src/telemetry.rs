//! Structured logging setup
//!
//! The library only emits `tracing` events; binaries and tests that want to
//! see them install a subscriber through [`init_logging`].

use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Configuration for structured logging.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Whether to use JSON format (true) or text format (false)
    pub json_format: bool,
    /// The default log level if RUST_LOG is not set
    pub default_level: Level,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            json_format: false,
            default_level: Level::INFO,
        }
    }
}

impl LoggingConfig {
    /// JSON output, for log shipping
    pub fn json() -> Self {
        Self {
            json_format: true,
            ..Default::default()
        }
    }

    /// Human-readable output
    pub fn text() -> Self {
        Self::default()
    }

    /// Set the default log level.
    pub fn with_level(mut self, level: Level) -> Self {
        self.default_level = level;
        self
    }
}

/// Install a global subscriber.
///
/// `RUST_LOG` takes precedence over `config.default_level`. Returns `false`
/// if a global subscriber was already installed, in which case nothing changes.
pub fn init_logging(config: LoggingConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.default_level.to_string()));

    let registry = tracing_subscriber::registry().with(filter);
    let installed = if config.json_format {
        registry
            .with(fmt::layer().json().with_current_span(true).with_target(true))
            .try_init()
    } else {
        registry.with(fmt::layer().with_target(true)).try_init()
    };

    installed.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builders() {
        let config = LoggingConfig::json().with_level(Level::DEBUG);
        assert!(config.json_format);
        assert_eq!(config.default_level, Level::DEBUG);

        assert!(!LoggingConfig::text().json_format);
    }

    #[test]
    fn test_second_init_is_a_no_op() {
        let _ = init_logging(LoggingConfig::text());
        assert!(!init_logging(LoggingConfig::json()));
    }
}
