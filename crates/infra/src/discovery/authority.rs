//! OIDC authority resolution
//!
//! Validates the authority host, then reads the endpoints from the
//! authority's OpenID configuration document.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::Method;
use serde::Deserialize;
use tokenflow_core::cache::is_known_host;
use tokenflow_core::ports::AuthorityResolver;
use tokenflow_domain::{AuthError, AuthorityEndpoints, AuthorityInfo, AuthorityType, Result};
use tracing::{debug, info};
use url::Url;

use super::instance::HttpInstanceDiscovery;
use super::origin;
use crate::http::HttpClient;

const B2C_HOST_SUFFIX: &str = ".b2clogin.com";

#[derive(Debug, Deserialize)]
struct OpenIdConfiguration {
    authorization_endpoint: String,
    token_endpoint: String,
}

#[derive(Debug, Clone)]
pub struct HttpAuthorityResolver {
    http: HttpClient,
    instance_discovery: Arc<HttpInstanceDiscovery>,
    validate_authority: bool,
    origin_override: Option<String>,
}

impl HttpAuthorityResolver {
    pub fn new(
        http: HttpClient,
        instance_discovery: Arc<HttpInstanceDiscovery>,
        validate_authority: bool,
    ) -> Self {
        Self { http, instance_discovery, validate_authority, origin_override: None }
    }

    #[must_use]
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin_override = Some(origin.into());
        self
    }

    /// `{authority}v2.0/.well-known/openid-configuration`, or the v1 path
    /// for ADFS.
    fn configuration_url(&self, authority: &AuthorityInfo) -> Result<String> {
        let canonical = Url::parse(authority.canonical())
            .map_err(|e| AuthError::invalid_authority(authority.canonical(), e.to_string()))?;
        let version = match authority.authority_type() {
            AuthorityType::Adfs => "",
            AuthorityType::Aad | AuthorityType::B2C => "v2.0/",
        };
        Ok(format!(
            "{}{}{}.well-known/openid-configuration",
            origin(self.origin_override.as_deref(), authority.host()),
            canonical.path(),
            version
        ))
    }

    async fn validate(&self, authority: &AuthorityInfo) -> Result<()> {
        if !self.validate_authority || is_known_host(authority.host()) {
            return Ok(());
        }
        match authority.authority_type() {
            AuthorityType::Aad => {
                self.instance_discovery.discover(authority).await?;
                Ok(())
            }
            AuthorityType::B2C if authority.host().ends_with(B2C_HOST_SUFFIX) => Ok(()),
            AuthorityType::B2C => {
                Err(AuthError::UntrustedAuthority(authority.canonical().to_string()))
            }
            // ADFS validation needs a per-domain WebFinger lookup; the
            // configured authority is taken as given.
            AuthorityType::Adfs => Ok(()),
        }
    }
}

#[async_trait]
impl AuthorityResolver for HttpAuthorityResolver {
    async fn resolve_endpoints(
        &self,
        authority: &AuthorityInfo,
        _login_hint: Option<&str>,
    ) -> Result<AuthorityEndpoints> {
        self.validate(authority).await?;

        let url = self.configuration_url(authority)?;
        debug!(authority = authority.canonical(), %url, "fetching openid configuration");

        let request = self.http.request(Method::GET, &url).header(ACCEPT, "application/json");
        let response = self
            .http
            .send(request)
            .await
            .map_err(|e| AuthError::TenantDiscoveryFailed(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::TenantDiscoveryFailed(format!(
                "openid configuration for {} returned HTTP {}",
                authority.canonical(),
                status.as_u16()
            )));
        }

        let document: OpenIdConfiguration = response.json().await.map_err(|e| {
            AuthError::TenantDiscoveryFailed(format!("unreadable openid configuration: {e}"))
        })?;

        info!(
            authority = authority.canonical(),
            token_endpoint = %document.token_endpoint,
            "authority endpoints resolved"
        );
        Ok(AuthorityEndpoints {
            authorization_endpoint: document.authorization_endpoint,
            self_signed_jwt_audience: document.token_endpoint.clone(),
            token_endpoint: document.token_endpoint,
        })
    }
}
