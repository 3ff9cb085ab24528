//! Tracing subscriber setup
//!
//! `RUST_LOG` wins over the configured level when it is set. Identifiers in
//! log fields are redacted by the callers through `PiiRedactor`, so the
//! subscriber needs no filtering of its own.

use tokenflow_common::CommonError;
use tokenflow_domain::{LoggingConfig, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber: an `EnvFilter` plus a plain or JSON fmt
/// layer.
///
/// # Errors
/// Returns a `Config` error when the level directive does not parse or a
/// global subscriber is already installed.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let filter_layer = build_filter(&config.level)?;

    let json_layer = config.json.then(|| {
        fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(true)
            .with_line_number(true)
            .flatten_event(true)
    });
    let plain_layer = (!config.json).then(|| fmt::layer().with_target(true));

    tracing_subscriber::registry()
        .with(json_layer)
        .with(plain_layer)
        .with(filter_layer)
        .try_init()
        .map_err(|e| CommonError::config_field("logging", e.to_string()))?;

    tracing::info!(
        level = %config.level,
        json = config.json,
        pii_logging_enabled = config.pii_logging_enabled,
        "Logging initialized"
    );
    Ok(())
}

fn build_filter(level: &str) -> Result<EnvFilter> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| CommonError::config_field("logging.level", e.to_string()).into())
}

/// Initialize logging for tests (with simpler output).
#[cfg(test)]
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt().with_test_writer().with_env_filter("debug").try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_test_logging_does_not_panic() {
        init_test_logging();
        init_test_logging();
    }

    #[test]
    fn invalid_level_is_a_config_error() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let err = build_filter("tokenflow=verbose").unwrap_err();
        assert_eq!(err.code(), "config");
    }
}
