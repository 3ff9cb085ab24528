//! Configuration loader
//!
//! Loads client configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. Reads a `.env` file from the working directory, if present
//! 2. Attempts to load from environment variables
//! 3. If `TOKENFLOW_CLIENT_ID` is missing, falls back to loading from file
//! 4. Searches the standard locations for a config file
//! 5. Supports JSON and TOML formats
//!
//! ## Environment Variables
//! - `TOKENFLOW_CLIENT_ID`: Application (client) id, required
//! - `TOKENFLOW_AUTHORITY`: Authority URL
//! - `TOKENFLOW_REDIRECT_URI`: Redirect URI for interactive flows
//! - `TOKENFLOW_TENANT`: Tenant override for the authority
//! - `TOKENFLOW_VALIDATE_AUTHORITY`: Whether unknown hosts are refused (true/false)
//! - `TOKENFLOW_PII_LOGGING`: Log usernames and account ids in clear (true/false)
//! - `TOKENFLOW_LOG_LEVEL`: Default `EnvFilter` directive
//!
//! ## File Locations
//! The loader searches the following paths (in order):
//! 1. `./tokenflow.toml` or `./tokenflow.json` (current working directory)
//! 2. `./config.toml` or `./config.json` (current working directory)
//! 3. The same names relative to the executable location

use std::path::{Path, PathBuf};

use tokenflow_common::CommonError;
use tokenflow_domain::{AuthError, ClientConfig, Result};

use crate::errors::InfraError;

const ENV_CLIENT_ID: &str = "TOKENFLOW_CLIENT_ID";
const ENV_AUTHORITY: &str = "TOKENFLOW_AUTHORITY";
const ENV_REDIRECT_URI: &str = "TOKENFLOW_REDIRECT_URI";
const ENV_TENANT: &str = "TOKENFLOW_TENANT";
const ENV_VALIDATE_AUTHORITY: &str = "TOKENFLOW_VALIDATE_AUTHORITY";
const ENV_PII_LOGGING: &str = "TOKENFLOW_PII_LOGGING";
const ENV_LOG_LEVEL: &str = "TOKENFLOW_LOG_LEVEL";

const CONFIG_FILE_NAMES: [&str; 4] =
    ["tokenflow.toml", "tokenflow.json", "config.toml", "config.json"];

/// Load configuration with automatic fallback strategy
///
/// Reads `.env` first, then the environment. If the client id is not in
/// the environment, falls back to a config file.
///
/// # Errors
/// Returns a `Config` error if:
/// - Configuration cannot be loaded from either source
/// - File format is invalid
/// - The loaded configuration fails [`ClientConfig::validate`]
pub fn load() -> Result<ClientConfig> {
    if let Ok(path) = dotenvy::dotenv() {
        tracing::debug!(path = %path.display(), "Loaded .env file");
    }

    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// Only `TOKENFLOW_CLIENT_ID` is required; every other setting keeps its
/// default when unset.
///
/// # Errors
/// Returns a `Config` error if the client id is missing or a value is
/// invalid.
pub fn load_from_env() -> Result<ClientConfig> {
    let mut config = ClientConfig::new(env_var(ENV_CLIENT_ID)?);

    if let Some(authority) = optional_env(ENV_AUTHORITY) {
        config.authority = authority;
    }
    config.redirect_uri = optional_env(ENV_REDIRECT_URI);
    config.tenant = optional_env(ENV_TENANT);
    config.validate_authority = env_bool(ENV_VALIDATE_AUTHORITY, true);
    config.logging.pii_logging_enabled = env_bool(ENV_PII_LOGGING, false);
    if let Some(level) = optional_env(ENV_LOG_LEVEL) {
        config.logging.level = level;
    }

    config.validate()?;
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, searches the standard locations for a config file.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Errors
/// Returns a `Config` error if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
/// - The loaded configuration fails validation
pub fn load_from_file(path: Option<PathBuf>) -> Result<ClientConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(CommonError::config(format!(
                    "Config file not found: {}",
                    p.display()
                ))
                .into());
            }
            p
        }
        None => find_config_file().ok_or_else(|| {
            CommonError::config("No config file found in any of the standard locations")
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents =
        std::fs::read_to_string(&config_path).map_err(|e| AuthError::from(InfraError::from(e)))?;

    let config = parse_config(&contents, &config_path)?;
    config.validate()?;
    Ok(config)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
fn parse_config(contents: &str, path: &Path) -> Result<ClientConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents).map_err(|e| InfraError::from(e).into()),
        "json" => serde_json::from_str(contents).map_err(|e| InfraError::from(e).into()),
        _ => Err(CommonError::config(format!("Unsupported config format: {}", extension)).into()),
    }
}

/// First configuration file found in the standard locations
///
/// Searches the current working directory first, then the directory of
/// the running executable.
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn find_config_file() -> Option<PathBuf> {
    let mut dirs = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        dirs.push(cwd);
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            dirs.push(exe_dir.to_path_buf());
        }
    }

    dirs.iter()
        .flat_map(|dir| CONFIG_FILE_NAMES.iter().map(move |name| dir.join(name)))
        .find(|path| path.exists())
}

/// Get required environment variable
///
/// # Errors
/// Returns a `Config` error if the variable is not set or empty.
fn env_var(key: &str) -> Result<String> {
    optional_env(key).ok_or_else(|| {
        CommonError::config_field(key, format!("Missing required environment variable: {}", key))
            .into()
    })
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}
