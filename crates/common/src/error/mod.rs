//! Errors shared by every tokenflow crate
//!
//! `CommonError` covers the failures that are not specific to token
//! acquisition: bad configuration, undecodable payloads, persistence hooks
//! that fail, and broken internal invariants. Crate errors embed it through a
//! `#[from]` variant:
//!
//! ```rust,ignore
//! #[derive(Debug, Error)]
//! pub enum AuthError {
//!     #[error("state mismatch")]
//!     StateMismatch,
//!
//!     #[error(transparent)]
//!     Common(#[from] CommonError),
//! }
//! ```
//!
//! Every workspace error implements [`ErrorClassification`] so retries and
//! log levels are decided the same way everywhere.

use std::fmt;
use std::time::Duration;

pub type CommonResult<T> = Result<T, CommonError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommonError {
    /// Client configuration that cannot be used
    Config { message: String, field: Option<String> },

    /// Payload or snapshot that does not decode
    Serialization { message: String, format: Option<String> },

    /// Cache persistence hook failure
    Persistence { message: String, operation: Option<String> },

    /// Broken invariant inside the library
    Internal { message: String },
}

impl fmt::Display for CommonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config { message, field: Some(field) } => {
                write!(f, "invalid configuration for '{field}': {message}")
            }
            Self::Config { message, field: None } => write!(f, "invalid configuration: {message}"),
            Self::Serialization { message, format: Some(format) } => {
                write!(f, "cannot decode {format}: {message}")
            }
            Self::Serialization { message, format: None } => write!(f, "cannot decode: {message}"),
            Self::Persistence { message, operation: Some(operation) } => {
                write!(f, "cache persistence failed in {operation}: {message}")
            }
            Self::Persistence { message, operation: None } => {
                write!(f, "cache persistence failed: {message}")
            }
            Self::Internal { message } => write!(f, "internal error: {message}"),
        }
    }
}

impl std::error::Error for CommonError {}

impl ErrorClassification for CommonError {
    fn is_retryable(&self) -> bool {
        false
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Internal { .. } => ErrorSeverity::Critical,
            Self::Config { .. } | Self::Serialization { .. } | Self::Persistence { .. } => {
                ErrorSeverity::Error
            }
        }
    }

    fn is_critical(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }

    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

impl CommonError {
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into(), field: None }
    }

    pub fn config_field<S: Into<String>, F: Into<String>>(field: F, message: S) -> Self {
        Self::Config { message: message.into(), field: Some(field.into()) }
    }

    /// `format` names the encoding, e.g. `json` or `toml`.
    pub fn serialization_format<S: Into<String>, F: Into<String>>(format: F, message: S) -> Self {
        Self::Serialization { message: message.into(), format: Some(format.into()) }
    }

    pub fn persistence<S: Into<String>>(message: S) -> Self {
        Self::Persistence { message: message.into(), operation: None }
    }

    /// `operation` is the hook that failed, e.g. `before_access`.
    pub fn persistence_op<S: Into<String>, O: Into<String>>(operation: O, message: S) -> Self {
        Self::Persistence { message: message.into(), operation: Some(operation.into()) }
    }

    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal { message: message.into() }
    }

    /// Short name used as the error code of wrapping errors.
    pub fn error_type_name(&self) -> &'static str {
        match self {
            Self::Config { .. } => "config",
            Self::Serialization { .. } => "serialization",
            Self::Persistence { .. } => "persistence",
            Self::Internal { .. } => "internal",
        }
    }
}

pub trait ErrorClassification {
    /// Transient failures worth another attempt.
    fn is_retryable(&self) -> bool;

    fn severity(&self) -> ErrorSeverity;

    fn is_critical(&self) -> bool;

    /// Delay the server asked for, if any.
    fn retry_after(&self) -> Option<Duration>;
}

/// Log level an error should be reported at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Info => "INFO",
            Self::Warning => "WARN",
            Self::Error => "ERROR",
            Self::Critical => "CRITICAL",
        })
    }
}

impl From<serde_json::Error> for CommonError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization_format("json", err.to_string())
    }
}

impl From<std::io::Error> for CommonError {
    fn from(err: std::io::Error) -> Self {
        Self::persistence(err.to_string())
    }
}

impl From<toml::de::Error> for CommonError {
    fn from(err: toml::de::Error) -> Self {
        Self::serialization_format("toml", err.to_string())
    }
}
