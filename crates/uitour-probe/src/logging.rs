//! Log subscriber setup
//!
//! The harness only emits `tracing` events; installing a subscriber is left
//! to the embedding test binary. These helpers cover the common cases.

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter directives
pub const LOG_ENV_VAR: &str = "UITOUR_PROBE_LOG";

/// Filter used when [`LOG_ENV_VAR`] is unset or invalid
pub const DEFAULT_FILTER: &str = "warn";

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

/// Build the filter from [`LOG_ENV_VAR`], falling back to `default_directives`
#[must_use]
pub fn env_filter(default_directives: &str) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV_VAR)
        .or_else(|_| EnvFilter::try_new(default_directives))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install a subscriber writing through the test harness's capture
///
/// Returns `false` if a global subscriber was already installed, so it is
/// safe to call from every test.
pub fn init_test_logging() -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(DEFAULT_FILTER))
        .with_target(true)
        .with_test_writer()
        .try_init()
        .is_ok()
}

/// Install a global subscriber writing to stderr in `format`
///
/// Returns `false` if a global subscriber was already installed.
pub fn init_logging(format: LogFormat) -> bool {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter(DEFAULT_FILTER))
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Pretty => builder.with_target(true).try_init().is_ok(),
        LogFormat::Json => builder.json().try_init().is_ok(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        let _ = init_test_logging();
        assert!(!init_test_logging());
        assert!(!init_logging(LogFormat::Json));
    }

    #[test]
    fn test_invalid_default_falls_back() {
        // Malformed directives fall back instead of panicking
        let filter = env_filter("[[[");
        assert!(!filter.to_string().is_empty());
    }

    #[test]
    fn test_format_serde() {
        let json = serde_json::to_string(&LogFormat::Json).unwrap();
        assert_eq!(json, "\"Json\"");
        assert_eq!(LogFormat::default(), LogFormat::Pretty);
    }
}
