use rand::{thread_rng, Rng};
use serde::{Deserialize, Serialize};

use super::error::{HashError, HashResult};

const DEFAULT_SALT_LENGTH: usize = 16;

/// Salt applied to every hashed identifier.
///
/// A fresh salt is generated per process by default, so hashes correlate log
/// lines within one run without being reversible across runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HashConfig {
    pub salt: String,
}

impl Default for HashConfig {
    fn default() -> Self {
        Self { salt: generate_secure_salt(DEFAULT_SALT_LENGTH) }
    }
}

impl HashConfig {
    /// Use a fixed salt, e.g. to correlate hashes across processes.
    pub fn with_salt(salt: impl Into<String>) -> HashResult<Self> {
        let salt = salt.into();
        if salt.is_empty() {
            return Err(HashError::InvalidInput("Salt cannot be empty".to_string()));
        }
        Ok(Self { salt })
    }
}

fn generate_secure_salt(length: usize) -> String {
    let mut rng = thread_rng();
    let salt: Vec<u8> = (0..length).map(|_| rng.gen()).collect();
    hex::encode(salt)
}
