//! Integration tests for `tokenflow_common::error`.
//!
//! Crate errors embed `CommonError` and delegate its classification; these
//! suites check that the delegation keeps the shared semantics.

use std::time::Duration;

use thiserror::Error;
use tokenflow_common::error::{CommonError, CommonResult, ErrorClassification, ErrorSeverity};

/// Validates the classification of every `CommonError` variant.
///
/// Assertions:
/// - Confirms no variant is retryable or carries a retry delay.
/// - Confirms only `Internal` is critical.
#[test]
fn classification_matrix_matches_expected_contract() {
    let cases = vec![
        (CommonError::config("missing client id"), ErrorSeverity::Error, false),
        (CommonError::serialization_format("json", "trailing comma"), ErrorSeverity::Error, false),
        (CommonError::persistence_op("after_access", "disk full"), ErrorSeverity::Error, false),
        (CommonError::internal("flight gate poisoned"), ErrorSeverity::Critical, true),
    ];

    for (err, severity, critical) in cases {
        assert!(!err.is_retryable(), "{err} should not be retryable");
        assert_eq!(err.severity(), severity, "severity mismatch for {err}");
        assert_eq!(err.is_critical(), critical, "critical mismatch for {err}");
        assert_eq!(err.retry_after(), None);
    }
}

#[derive(Debug, Error)]
enum ExchangeError {
    #[error("endpoint throttled")]
    Throttled(Duration),

    #[error(transparent)]
    Common(#[from] CommonError),
}

impl ErrorClassification for ExchangeError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Throttled(_) => true,
            Self::Common(e) => e.is_retryable(),
        }
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Throttled(_) => ErrorSeverity::Warning,
            Self::Common(e) => e.severity(),
        }
    }

    fn is_critical(&self) -> bool {
        match self {
            Self::Throttled(_) => false,
            Self::Common(e) => e.is_critical(),
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Throttled(delay) => Some(*delay),
            Self::Common(e) => e.retry_after(),
        }
    }
}

#[test]
fn embedded_variant_keeps_common_classification() {
    let throttled = ExchangeError::Throttled(Duration::from_secs(2));
    assert!(throttled.is_retryable());
    assert_eq!(throttled.retry_after(), Some(Duration::from_secs(2)));

    let embedded: ExchangeError = CommonError::internal("cache state missing").into();
    assert!(!embedded.is_retryable());
    assert!(embedded.is_critical());
    assert_eq!(embedded.severity(), ErrorSeverity::Critical);
}

#[test]
fn question_mark_lifts_decode_failures() {
    fn load_snapshot(raw: &str) -> CommonResult<serde_json::Value> {
        Ok(serde_json::from_str(raw)?)
    }

    fn restore(raw: &str) -> Result<serde_json::Value, ExchangeError> {
        Ok(load_snapshot(raw)?)
    }

    let err = restore("{\"AccessToken\":").unwrap_err();
    assert!(matches!(
        err,
        ExchangeError::Common(CommonError::Serialization { format: Some(ref f), .. }) if f == "json"
    ));
    assert!(err.to_string().starts_with("cannot decode json: "));
    assert!(restore("{}").is_ok());
}

#[test]
fn io_failures_become_persistence_errors() {
    fn read_cache_file(path: &std::path::Path) -> CommonResult<String> {
        Ok(std::fs::read_to_string(path)?)
    }

    let dir = std::env::temp_dir().join("tokenflow-missing-cache-dir");
    let err = read_cache_file(&dir.join("cache.json")).unwrap_err();
    assert_eq!(err.error_type_name(), "persistence");
}
