//! Authority URLs and the metadata resolved for them

use serde::{Deserialize, Serialize};
use url::Url;

use crate::constants::TENANTLESS_TENANTS;
use crate::errors::{AuthError, Result};
use crate::impl_domain_enum_conversions;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthorityType {
    Aad,
    Adfs,
    B2C,
}

impl_domain_enum_conversions!(AuthorityType {
    Aad => "aad",
    Adfs => "adfs",
    B2C => "b2c",
});

/// Parsed, canonicalised authority.
///
/// Canonical forms:
/// - AAD: `https://{host}/{tenant}/`
/// - ADFS: `https://{host}/adfs/`
/// - B2C: `https://{host}/tfp/{tenant}/{policy}/`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AuthorityInfo {
    host: String,
    tenant: String,
    policy: Option<String>,
    authority_type: AuthorityType,
    canonical: String,
}

impl AuthorityInfo {
    /// Parse and canonicalise an authority URL.
    ///
    /// # Errors
    /// `InvalidAuthority` for non-https URLs, missing tenant segments, query
    /// strings or fragments.
    pub fn parse(authority: &str) -> Result<Self> {
        let url = Url::parse(authority.trim())
            .map_err(|e| AuthError::invalid_authority(authority, e.to_string()))?;

        if url.scheme() != "https" {
            return Err(AuthError::invalid_authority(authority, "authority must use https"));
        }
        if url.query().is_some() || url.fragment().is_some() {
            return Err(AuthError::invalid_authority(
                authority,
                "authority must not contain a query or fragment",
            ));
        }

        let host = match url.host_str() {
            Some(host) => match url.port() {
                Some(port) => format!("{}:{}", host.to_lowercase(), port),
                None => host.to_lowercase(),
            },
            None => return Err(AuthError::invalid_authority(authority, "missing host")),
        };

        let segments: Vec<String> = url
            .path_segments()
            .map(|segments| {
                segments.filter(|s| !s.is_empty()).map(str::to_lowercase).collect()
            })
            .unwrap_or_default();

        let Some(first) = segments.first() else {
            return Err(AuthError::invalid_authority(authority, "missing tenant segment"));
        };

        match first.as_str() {
            "adfs" => Ok(Self::build(host, "adfs".to_string(), None, AuthorityType::Adfs)),
            "tfp" => {
                if segments.len() < 3 {
                    return Err(AuthError::invalid_authority(
                        authority,
                        "B2C authority must be https://host/tfp/{tenant}/{policy}/",
                    ));
                }
                Ok(Self::build(
                    host,
                    segments[1].clone(),
                    Some(segments[2].clone()),
                    AuthorityType::B2C,
                ))
            }
            tenant => Ok(Self::build(host, tenant.to_string(), None, AuthorityType::Aad)),
        }
    }

    fn build(
        host: String,
        tenant: String,
        policy: Option<String>,
        authority_type: AuthorityType,
    ) -> Self {
        let canonical = match (&authority_type, &policy) {
            (AuthorityType::B2C, Some(policy)) => format!("https://{host}/tfp/{tenant}/{policy}/"),
            _ => format!("https://{host}/{tenant}/"),
        };
        Self { host, tenant, policy, authority_type, canonical }
    }

    /// Host name, also the cache "environment".
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    pub fn policy(&self) -> Option<&str> {
        self.policy.as_deref()
    }

    pub fn authority_type(&self) -> AuthorityType {
        self.authority_type
    }

    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    /// `common`, `organizations` and `consumers` do not pin a directory.
    pub fn is_tenantless(&self) -> bool {
        self.authority_type == AuthorityType::Aad
            && TENANTLESS_TENANTS.iter().any(|t| *t == self.tenant)
    }

    /// Same authority pinned to `tenant_id`; only tenantless AAD authorities
    /// change.
    #[must_use]
    pub fn with_tenant(&self, tenant_id: &str) -> Self {
        if !self.is_tenantless() || tenant_id.is_empty() {
            return self.clone();
        }
        Self::build(self.host.clone(), tenant_id.to_lowercase(), None, AuthorityType::Aad)
    }

    /// Same authority on a different host (used for alias lookups).
    #[must_use]
    pub fn with_host(&self, host: &str) -> Self {
        Self::build(host.to_lowercase(), self.tenant.clone(), self.policy.clone(), self.authority_type)
    }
}

/// Endpoints resolved for an authority by discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorityEndpoints {
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    /// Audience for self-signed client assertions.
    pub self_signed_jwt_audience: String,
}

impl AuthorityEndpoints {
    /// Device authorization endpoint, a sibling of the token endpoint.
    pub fn device_code_endpoint(&self) -> String {
        let base = self.token_endpoint.trim_end_matches('/');
        match base.strip_suffix("/token") {
            Some(prefix) => format!("{prefix}/devicecode"),
            None => format!("{base}/devicecode"),
        }
    }
}

/// Alias group for one cloud instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceMetadata {
    pub preferred_network: String,
    /// Host under which new cache entries are written.
    pub preferred_cache: String,
    pub aliases: Vec<String>,
}

impl InstanceMetadata {
    /// Metadata for an unknown host: it aliases only itself.
    pub fn self_aliased(host: &str) -> Self {
        let host = host.to_lowercase();
        Self { preferred_network: host.clone(), preferred_cache: host.clone(), aliases: vec![host] }
    }

    pub fn is_alias(&self, environment: &str) -> bool {
        self.aliases.iter().any(|a| a.eq_ignore_ascii_case(environment))
            || self.preferred_cache.eq_ignore_ascii_case(environment)
    }

    /// `preferred_cache` first, then the remaining aliases.
    pub fn lookup_order(&self) -> Vec<String> {
        let mut order = vec![self.preferred_cache.clone()];
        for alias in &self.aliases {
            if !order.iter().any(|o| o.eq_ignore_ascii_case(alias)) {
                order.push(alias.clone());
            }
        }
        order
    }
}
