//! Salted hashing of personal identifiers

pub mod config;
pub mod error;
pub mod hasher;

pub use config::HashConfig;
pub use error::{HashError, HashResult};
pub use hasher::SecureHasher;
