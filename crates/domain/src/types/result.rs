use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::account::Account;
use super::scope::ScopeSet;
use super::secret::Secret;

/// Where the returned access token came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenSource {
    Cache,
    IdentityProvider,
}

/// Outcome of a successful token acquisition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticationResult {
    pub access_token: Secret,
    pub token_type: String,
    pub expires_on: DateTime<Utc>,
    pub extended_expires_on: DateTime<Utc>,
    /// The token is past `expires_on` but inside its extended lifetime.
    pub is_extended_lifetime: bool,
    pub tenant_id: Option<String>,
    /// Object id of the signed-in user
    pub unique_id: Option<String>,
    pub id_token: Option<Secret>,
    pub account: Option<Account>,
    pub scopes: ScopeSet,
    pub correlation_id: Uuid,
    pub source: TokenSource,
}

impl AuthenticationResult {
    /// `Authorization` header value.
    pub fn authorization_header(&self) -> String {
        format!("{} {}", self.token_type, self.access_token.expose())
    }
}
