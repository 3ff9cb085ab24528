//! Cache items and their composite keys
//!
//! Every credential is stored under
//! `{home_account_id}-{environment}-{credential_type}-{client_id}-{realm}-{target}`
//! (lower-cased). Access tokens use the tenant as realm and the canonical
//! scope string as target; refresh tokens are neither tenant- nor
//! scope-partitioned; ID tokens are tenant-partitioned only.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::account::Account;
use super::scope::ScopeSet;
use super::secret::Secret;
use crate::constants::MSA_TENANT_ID;
use crate::impl_domain_enum_conversions;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialType {
    AccessToken,
    RefreshToken,
    IdToken,
}

impl_domain_enum_conversions!(CredentialType {
    AccessToken => "accesstoken",
    RefreshToken => "refreshtoken",
    IdToken => "idtoken",
});

/// Where an account lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountKind {
    WorkOrSchool,
    Personal,
    B2C,
    Adfs,
}

impl_domain_enum_conversions!(AccountKind {
    WorkOrSchool => "work_or_school",
    Personal => "personal",
    B2C => "b2c",
    Adfs => "adfs",
});

impl AccountKind {
    /// AAD accounts homed in the consumer directory are personal accounts.
    pub fn for_aad_tenant(tenant_id: &str) -> Self {
        if tenant_id.eq_ignore_ascii_case(MSA_TENANT_ID) {
            Self::Personal
        } else {
            Self::WorkOrSchool
        }
    }
}

/// Build a credential cache key.
pub fn credential_key(
    home_account_id: &str,
    environment: &str,
    credential_type: CredentialType,
    client_id: &str,
    realm: &str,
    target: &str,
) -> String {
    [home_account_id, environment, &credential_type.to_string(), client_id, realm, target]
        .join("-")
        .to_lowercase()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTokenItem {
    pub environment: String,
    pub client_id: String,
    /// `None` for app-only tokens.
    pub home_account_id: Option<String>,
    pub tenant_id: String,
    pub secret: Secret,
    pub token_type: String,
    pub scopes: ScopeSet,
    pub cached_at: DateTime<Utc>,
    pub expires_on: DateTime<Utc>,
    pub extended_expires_on: DateTime<Utc>,
    /// Hash of the incoming assertion for on-behalf-of tokens.
    #[serde(default)]
    pub user_assertion_hash: Option<String>,
    #[serde(default)]
    pub is_adfs: bool,
}

impl AccessTokenItem {
    /// Account, assertion or app-only partition this token belongs to.
    pub fn partition(&self) -> &str {
        self.home_account_id
            .as_deref()
            .or(self.user_assertion_hash.as_deref())
            .unwrap_or_default()
    }

    pub fn key(&self) -> String {
        credential_key(
            self.partition(),
            &self.environment,
            CredentialType::AccessToken,
            &self.client_id,
            &self.tenant_id,
            &self.scopes.as_single_string(),
        )
    }

    /// Unusable once `expires_on` falls inside the buffer window.
    pub fn is_expired(&self, now: DateTime<Utc>, buffer: Duration) -> bool {
        self.expires_on <= now + buffer
    }

    /// Still inside the extended lifetime granted for outage resilience.
    pub fn is_within_extended_lifetime(&self, now: DateTime<Utc>, buffer: Duration) -> bool {
        self.extended_expires_on > now + buffer
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshTokenItem {
    pub environment: String,
    pub client_id: String,
    pub home_account_id: String,
    pub secret: Secret,
    #[serde(default)]
    pub raw_client_info: Option<String>,
}

impl RefreshTokenItem {
    pub fn key(&self) -> String {
        Self::key_for(&self.home_account_id, &self.environment, &self.client_id)
    }

    pub fn key_for(home_account_id: &str, environment: &str, client_id: &str) -> String {
        credential_key(
            home_account_id,
            environment,
            CredentialType::RefreshToken,
            client_id,
            "",
            "",
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdTokenItem {
    pub environment: String,
    pub client_id: String,
    pub home_account_id: String,
    pub tenant_id: String,
    pub secret: Secret,
}

impl IdTokenItem {
    pub fn key(&self) -> String {
        credential_key(
            &self.home_account_id,
            &self.environment,
            CredentialType::IdToken,
            &self.client_id,
            &self.tenant_id,
            "",
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountItem {
    pub home_account_id: String,
    pub environment: String,
    /// Tenant the account signed in to.
    pub realm: String,
    /// Object id inside `realm`.
    pub local_account_id: String,
    pub username: String,
    #[serde(default)]
    pub name: Option<String>,
    pub kind: AccountKind,
}

impl AccountItem {
    pub fn key(&self) -> String {
        [self.home_account_id.as_str(), &self.environment, &self.realm].join("-").to_lowercase()
    }

    pub fn to_account(&self) -> Account {
        let username = (!self.username.is_empty()).then(|| self.username.clone());
        Account::new(self.home_account_id.clone(), self.environment.clone(), username)
    }
}

/// Refresh token in the single-token-per-user legacy layout.
///
/// Older clients sharing the same persisted blob only understand this
/// shape, so it is written alongside the unified items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyRefreshTokenItem {
    pub authority: String,
    pub client_id: String,
    /// Object id of the user
    pub unique_id: String,
    /// Username of the user
    pub displayable_id: String,
    pub home_account_id: String,
    pub environment: String,
    pub secret: Secret,
    #[serde(default)]
    pub raw_client_info: Option<String>,
    pub scopes: ScopeSet,
}

impl LegacyRefreshTokenItem {
    pub fn key(&self) -> String {
        [self.authority.as_str(), &self.client_id, &self.unique_id, &self.displayable_id]
            .join("|")
            .to_lowercase()
    }
}
