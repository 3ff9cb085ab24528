//! Client configuration structures
//!
//! Loaded by `tokenflow-infra`'s config loader from the environment or a
//! TOML/JSON file; every section has defaults so partial files work.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::constants::DEFAULT_EXPIRATION_BUFFER_SECS;
use crate::errors::{AuthError, Result};
use crate::types::authority::AuthorityInfo;

const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com/common/";

/// Top-level configuration for one client application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub client_id: String,
    #[serde(default = "default_authority")]
    pub authority: String,
    #[serde(default)]
    pub redirect_uri: Option<String>,
    /// Overrides the tenant segment of `authority` when set.
    #[serde(default)]
    pub tenant: Option<String>,
    /// Refuse authorities that instance discovery does not know.
    #[serde(default = "default_true")]
    pub validate_authority: bool,
    #[serde(default)]
    pub cache: CacheOptions,
    #[serde(default)]
    pub http: HttpOptions,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_authority() -> String {
    DEFAULT_AUTHORITY.to_string()
}

fn default_true() -> bool {
    true
}

impl ClientConfig {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            authority: default_authority(),
            redirect_uri: None,
            tenant: None,
            validate_authority: true,
            cache: CacheOptions::default(),
            http: HttpOptions::default(),
            logging: LoggingConfig::default(),
        }
    }

    /// Authority with the tenant override applied.
    ///
    /// # Errors
    /// `InvalidAuthority` when the configured authority does not parse.
    pub fn authority_info(&self) -> Result<AuthorityInfo> {
        let authority = AuthorityInfo::parse(&self.authority)?;
        match self.tenant.as_deref() {
            Some(tenant) if !tenant.is_empty() => {
                let url = format!("https://{}/{}/", authority.host(), tenant);
                AuthorityInfo::parse(&url)
            }
            _ => Ok(authority),
        }
    }

    /// # Errors
    /// - `MissingArgument` for an empty client id
    /// - `InvalidAuthority` for a malformed authority
    /// - `RedirectUriHasFragment` / `Common(Config)` for a bad redirect URI
    pub fn validate(&self) -> Result<()> {
        if self.client_id.trim().is_empty() {
            return Err(AuthError::MissingArgument("client_id"));
        }
        self.authority_info()?;
        if let Some(redirect) = &self.redirect_uri {
            let url = Url::parse(redirect).map_err(|e| {
                tokenflow_common::CommonError::config_field("redirect_uri", e.to_string())
            })?;
            if url.fragment().is_some() {
                return Err(AuthError::RedirectUriHasFragment(redirect.clone()));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheOptions {
    /// Access tokens expiring within this many seconds are not served.
    #[serde(default = "default_buffer")]
    pub expiration_buffer_seconds: i64,
    /// Serve tokens inside their extended lifetime when the issuer is down.
    #[serde(default)]
    pub extended_lifetime_enabled: bool,
    /// Mirror refresh tokens into the legacy single-token layout.
    #[serde(default = "default_true")]
    pub legacy_cache_compatibility: bool,
}

fn default_buffer() -> i64 {
    DEFAULT_EXPIRATION_BUFFER_SECS
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            expiration_buffer_seconds: DEFAULT_EXPIRATION_BUFFER_SECS,
            extended_lifetime_enabled: false,
            legacy_cache_compatibility: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpOptions {
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    /// Total attempts including the first one.
    #[serde(default = "default_attempts")]
    pub max_attempts: usize,
    #[serde(default = "default_backoff")]
    pub base_backoff_millis: u64,
}

fn default_timeout() -> u64 {
    30
}

fn default_attempts() -> usize {
    3
}

fn default_backoff() -> u64 {
    200
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout(),
            max_attempts: default_attempts(),
            base_backoff_millis: default_backoff(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
    /// Log usernames and account ids in clear text.
    #[serde(default)]
    pub pii_logging_enabled: bool,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_level(), json: false, pii_logging_enabled: false }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_json_gets_defaults() {
        let config: ClientConfig = serde_json::from_str(r#"{"client_id":"abc"}"#).unwrap();
        assert_eq!(config.authority, DEFAULT_AUTHORITY);
        assert!(config.validate_authority);
        assert_eq!(config.cache.expiration_buffer_seconds, 300);
        assert!(!config.logging.pii_logging_enabled);
        assert_eq!(config.http.max_attempts, 3);
    }

    #[test]
    fn tenant_override_replaces_authority_tenant() {
        let mut config = ClientConfig::new("abc");
        config.tenant = Some("contoso.onmicrosoft.com".into());
        let authority = config.authority_info().unwrap();
        assert_eq!(authority.tenant(), "contoso.onmicrosoft.com");
        assert!(!authority.is_tenantless());
    }

    /// Validates configuration validation failures.
    ///
    /// Assertions:
    /// - Ensures an empty client id is rejected.
    /// - Ensures a redirect URI with a fragment is rejected.
    #[test]
    fn validate_rejects_bad_values() {
        assert_eq!(ClientConfig::new(" ").validate(), Err(AuthError::MissingArgument("client_id")));

        let mut config = ClientConfig::new("abc");
        config.redirect_uri = Some("http://localhost/cb#frag".into());
        assert!(matches!(config.validate(), Err(AuthError::RedirectUriHasFragment(_))));

        config.redirect_uri = Some("http://localhost/cb".into());
        assert!(config.validate().is_ok());
    }
}
