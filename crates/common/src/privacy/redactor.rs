use std::sync::Arc;

use super::hash::SecureHasher;

const HASH_PREFIX_LEN: usize = 12;

/// Gate between identifiers and log output.
///
/// With PII logging disabled (the default) values are replaced by a short
/// salted hash so log lines about the same user still correlate. With PII
/// logging enabled values pass through untouched.
#[derive(Debug, Clone)]
pub struct PiiRedactor {
    pii_enabled: bool,
    hasher: Arc<SecureHasher>,
}

impl Default for PiiRedactor {
    fn default() -> Self {
        Self::new(false)
    }
}

impl PiiRedactor {
    pub fn new(pii_enabled: bool) -> Self {
        Self { pii_enabled, hasher: Arc::new(SecureHasher::default()) }
    }

    pub fn with_hasher(pii_enabled: bool, hasher: SecureHasher) -> Self {
        Self { pii_enabled, hasher: Arc::new(hasher) }
    }

    pub fn pii_enabled(&self) -> bool {
        self.pii_enabled
    }

    /// Render `value` for the diagnostic channel.
    pub fn redact(&self, value: &str) -> String {
        if value.is_empty() {
            return String::new();
        }
        if self.pii_enabled {
            return value.to_string();
        }
        match self.hasher.hash_value(value) {
            Ok(hash) => format!("hash:{}", &hash[..HASH_PREFIX_LEN]),
            Err(_) => "hash:unavailable".to_string(),
        }
    }

    /// Same as [`redact`](Self::redact) for optional identifiers.
    pub fn redact_opt(&self, value: Option<&str>) -> String {
        value.map(|v| self.redact(v)).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::privacy::HashConfig;

    #[test]
    fn redacts_when_pii_disabled() {
        let redactor = PiiRedactor::new(false);
        let output = redactor.redact("alice@contoso.com");
        assert!(output.starts_with("hash:"));
        assert!(!output.contains("alice"));
        assert_eq!(output.len(), "hash:".len() + HASH_PREFIX_LEN);
    }

    #[test]
    fn passes_through_when_pii_enabled() {
        let redactor = PiiRedactor::new(true);
        assert_eq!(redactor.redact("alice@contoso.com"), "alice@contoso.com");
    }

    #[test]
    fn same_value_correlates_under_one_salt() {
        let hasher = SecureHasher::with_config(HashConfig::with_salt("fixed").unwrap()).unwrap();
        let redactor = PiiRedactor::with_hasher(false, hasher);
        assert_eq!(redactor.redact("bob"), redactor.redact("bob"));
        assert_ne!(redactor.redact("bob"), redactor.redact("carol"));
    }

    #[test]
    fn optional_and_empty_values() {
        let redactor = PiiRedactor::default();
        assert_eq!(redactor.redact_opt(None), "");
        assert_eq!(redactor.redact(""), "");
    }
}
