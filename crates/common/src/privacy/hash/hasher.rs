use sha2::{Digest, Sha256};

use super::config::HashConfig;
use super::error::{HashError, HashResult};

#[derive(Debug, Clone)]
pub struct SecureHasher {
    config: HashConfig,
}

impl Default for SecureHasher {
    fn default() -> Self {
        Self { config: HashConfig::default() }
    }
}

impl SecureHasher {
    pub fn with_config(config: HashConfig) -> HashResult<Self> {
        if config.salt.is_empty() {
            return Err(HashError::ConfigurationError("Salt must be set".to_string()));
        }
        Ok(Self { config })
    }

    /// Hex-encoded SHA-256 of `value` concatenated with the salt.
    pub fn hash_value(&self, value: &str) -> HashResult<String> {
        if value.is_empty() {
            return Err(HashError::InvalidInput("Value cannot be empty".to_string()));
        }

        let mut hasher = Sha256::new();
        hasher.update(value.as_bytes());
        hasher.update(self.config.salt.as_bytes());
        Ok(format!("{:x}", hasher.finalize()))
    }

    pub fn config(&self) -> &HashConfig {
        &self.config
    }
}
