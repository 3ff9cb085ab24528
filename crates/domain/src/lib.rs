//! # tokenflow domain
//!
//! Data model for the token acquisition engine.
//!
//! This crate contains:
//! - Scope sets and their normalisation rules
//! - Authority parsing, client info and ID token decoding
//! - Cache items, composite keys and accounts
//! - Wire types exchanged with the identity provider
//! - The [`AuthError`] taxonomy and configuration structures
//!
//! ## Architecture
//! - Depends only on `tokenflow-common` (foundation tier)
//! - No I/O, no async
//! - Pure domain models and data structures

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use config::{CacheOptions, ClientConfig, HttpOptions, LoggingConfig};
pub use errors::{AuthError, ErrorCategory, Result};
pub use types::*;
