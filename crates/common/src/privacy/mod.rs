//! Privacy helpers for diagnostic logging
//!
//! Identifiers such as usernames, login hints and home account ids must not
//! reach logs in clear text unless the application opted into PII logging.
//! [`PiiRedactor`] is the single gate every log statement goes through.

pub mod hash;
pub mod redactor;

// Re-export commonly used types
pub use hash::{HashConfig, HashError, HashResult, SecureHasher};
pub use redactor::PiiRedactor;
