use std::fmt;

use serde::{Deserialize, Serialize};

/// Token material that must never reach a log line.
///
/// Serializes transparently so cache snapshots and wire payloads keep their
/// plain string shape; `Debug` and `Display` print a placeholder.
#[derive(Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret([REDACTED])")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_never_prints_value() {
        let secret = Secret::new("eyJ0eXAi.payload.sig");
        assert!(!format!("{secret:?}").contains("eyJ"));
        assert!(!secret.to_string().contains("eyJ"));
        assert_eq!(secret.expose(), "eyJ0eXAi.payload.sig");
    }

    #[test]
    fn serializes_as_plain_string() {
        let json = serde_json::to_string(&Secret::new("rt")).unwrap();
        assert_eq!(json, "\"rt\"");
        let back: Secret = serde_json::from_str(&json).unwrap();
        assert_eq!(back.expose(), "rt");
    }
}
