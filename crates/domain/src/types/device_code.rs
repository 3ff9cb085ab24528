//! Device authorization grant (RFC 8628) payloads

use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::response::{de_seconds, offset_from};
use super::scope::ScopeSet;
use super::secret::Secret;
use crate::errors::AuthError;

/// Polling interval when the server does not send one.
pub const DEFAULT_POLLING_INTERVAL_SECS: i64 = 5;

fn default_interval() -> i64 {
    DEFAULT_POLLING_INTERVAL_SECS
}

/// Device authorization endpoint response.
///
/// Older endpoints send `verification_url` and encode the numbers as
/// strings; both forms are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceCodeResponse {
    pub user_code: String,
    pub device_code: Secret,
    #[serde(alias = "verification_url")]
    pub verification_uri: String,
    #[serde(deserialize_with = "de_seconds")]
    pub expires_in: i64,
    #[serde(default = "default_interval", deserialize_with = "de_seconds")]
    pub interval: i64,
    #[serde(default)]
    pub message: Option<String>,
}

/// What the application shows the user so they can finish signing in on
/// another device.
#[derive(Debug, Clone)]
pub struct DeviceCodeResult {
    pub user_code: String,
    pub device_code: Secret,
    pub verification_uri: String,
    pub expires_on: DateTime<Utc>,
    pub interval: StdDuration,
    /// Ready-to-display sign-in instructions.
    pub message: String,
    pub client_id: String,
    pub scopes: ScopeSet,
}

impl DeviceCodeResult {
    /// # Errors
    /// `invalid_response` when the lifetime or interval is negative or does
    /// not fit a timestamp.
    pub fn from_response(
        response: DeviceCodeResponse,
        client_id: impl Into<String>,
        scopes: ScopeSet,
        now: DateTime<Utc>,
    ) -> Result<Self, AuthError> {
        let expires_on = offset_from(now, response.expires_in, "expires_in")?;
        let interval = u64::try_from(response.interval).map_err(|_| {
            AuthError::service("invalid_response", format!("interval is negative: {}", response.interval))
        })?;
        let message = response.message.unwrap_or_else(|| {
            format!(
                "To sign in, use a web browser to open the page {} and enter the code {} to authenticate.",
                response.verification_uri, response.user_code
            )
        });

        Ok(Self {
            user_code: response.user_code,
            device_code: response.device_code,
            verification_uri: response.verification_uri,
            expires_on,
            interval: StdDuration::from_secs(interval),
            message,
            client_id: client_id.into(),
            scopes,
        })
    }
}
