//! Modular common utilities shared across tokenflow crates.
//!
//! # Feature Tiers
//!
//! Enable cargo features to opt into the tiers you need:
//! - `foundation`: errors, PKCE/state generation, privacy hashing
//! - `runtime`: clock abstraction and PII redaction with diagnostics
//! - `observability`: optional tracing (not included by default)

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Foundation tier
// -----------------------------------------------------------------
#[cfg(feature = "foundation")]
pub mod auth;
#[cfg(feature = "foundation")]
pub mod error;

// Runtime tier
// --------------------------------------------------------------------
#[cfg(feature = "runtime")]
pub mod privacy;
#[cfg(feature = "runtime")]
pub mod time;

// Re-export commonly used types and traits for convenience
// ------------------------
#[cfg(feature = "foundation")]
pub use auth::pkce::PkceChallenge;
#[cfg(feature = "foundation")]
pub use error::{CommonError, CommonResult, ErrorClassification, ErrorSeverity};
#[cfg(feature = "runtime")]
pub use privacy::{PiiRedactor, SecureHasher};
#[cfg(feature = "runtime")]
pub use time::{Clock, MockClock, SystemClock};
