use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HashError {
    InvalidInput(String),
    ConfigurationError(String),
}

impl fmt::Display for HashError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HashError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            HashError::ConfigurationError(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for HashError {}

pub type HashResult<T> = Result<T, HashError>;
