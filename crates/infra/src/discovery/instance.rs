//! Cloud instance discovery
//!
//! Known clouds are answered from the built-in alias table. Other AAD hosts
//! are looked up at the trusted host's `/common/discovery/instance`
//! endpoint, which also decides whether the host is a valid instance.

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::Method;
use serde::Deserialize;
use tokenflow_core::cache::known_metadata;
use tokenflow_core::ports::InstanceDiscovery;
use tokenflow_domain::{
    AuthError, AuthorityInfo, AuthorityType, InstanceMetadata, OAuthErrorResponse, Result,
};
use tracing::{debug, warn};

use super::{origin, DEFAULT_TRUSTED_HOST};
use crate::errors::InfraError;
use crate::http::HttpClient;

const INSTANCE_DISCOVERY_API_VERSION: &str = "1.1";
const INVALID_INSTANCE: &str = "invalid_instance";

/// Body of a successful instance discovery call.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InstanceDiscoveryResponse {
    #[serde(default)]
    pub tenant_discovery_endpoint: Option<String>,
    #[serde(default)]
    pub metadata: Vec<InstanceMetadata>,
}

impl InstanceDiscoveryResponse {
    /// Alias group that contains `host`.
    pub fn metadata_for(&self, host: &str) -> Option<InstanceMetadata> {
        self.metadata.iter().find(|m| m.is_alias(host)).cloned()
    }
}

#[derive(Debug, Clone)]
pub struct HttpInstanceDiscovery {
    http: HttpClient,
    origin_override: Option<String>,
}

impl HttpInstanceDiscovery {
    pub fn new(http: HttpClient) -> Self {
        Self { http, origin_override: None }
    }

    #[must_use]
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin_override = Some(origin.into());
        self
    }

    /// Query the trusted host about `authority`.
    ///
    /// # Errors
    /// - `UntrustedAuthority` when the service answers `invalid_instance`
    /// - `TenantDiscoveryFailed` for any other failure
    pub async fn discover(&self, authority: &AuthorityInfo) -> Result<InstanceDiscoveryResponse> {
        let authorize = format!("{}oauth2/v2.0/authorize", authority.canonical());
        let url = format!(
            "{}/common/discovery/instance?api-version={}&authorization_endpoint={}",
            origin(self.origin_override.as_deref(), DEFAULT_TRUSTED_HOST),
            INSTANCE_DISCOVERY_API_VERSION,
            urlencoding::encode(&authorize),
        );
        debug!(host = authority.host(), "querying instance discovery");

        let request = self.http.request(Method::GET, &url).header(ACCEPT, "application/json");
        let response = self
            .http
            .send(request)
            .await
            .map_err(|e| AuthError::TenantDiscoveryFailed(e.to_string()))?;
        let status = response.status();
        let body = response.text().await.map_err(|e| {
            AuthError::TenantDiscoveryFailed(AuthError::from(InfraError::from(e)).to_string())
        })?;

        if !status.is_success() {
            if let Ok(error) = serde_json::from_str::<OAuthErrorResponse>(&body) {
                if error.error == INVALID_INSTANCE {
                    return Err(AuthError::UntrustedAuthority(authority.canonical().to_string()));
                }
                return Err(AuthError::TenantDiscoveryFailed(format!(
                    "{}: {}",
                    error.error,
                    error.error_description.unwrap_or_default()
                )));
            }
            return Err(AuthError::TenantDiscoveryFailed(format!(
                "instance discovery returned HTTP {}",
                status.as_u16()
            )));
        }

        serde_json::from_str(&body).map_err(|e| {
            AuthError::TenantDiscoveryFailed(format!("unreadable instance discovery response: {e}"))
        })
    }
}

#[async_trait]
impl InstanceDiscovery for HttpInstanceDiscovery {
    async fn metadata(&self, authority: &AuthorityInfo) -> Result<InstanceMetadata> {
        if let Some(known) = known_metadata(authority.host()) {
            return Ok(known);
        }
        if authority.authority_type() != AuthorityType::Aad {
            return Ok(InstanceMetadata::self_aliased(authority.host()));
        }

        match self.discover(authority).await {
            Ok(response) => Ok(response
                .metadata_for(authority.host())
                .unwrap_or_else(|| InstanceMetadata::self_aliased(authority.host()))),
            Err(error @ AuthError::UntrustedAuthority(_)) => Err(error),
            Err(error) => {
                // Aliasing only widens cache lookups; fall back to the host alone.
                warn!(host = authority.host(), %error, "instance discovery failed");
                Ok(InstanceMetadata::self_aliased(authority.host()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn discovery(server: &MockServer) -> HttpInstanceDiscovery {
        HttpInstanceDiscovery::new(HttpClient::builder().max_attempts(1).build().unwrap())
            .with_origin(server.uri())
    }

    #[tokio::test]
    async fn known_clouds_skip_the_network() {
        let server = MockServer::start().await;
        let authority = AuthorityInfo::parse("https://login.windows.net/common/").unwrap();

        let metadata = discovery(&server).metadata(&authority).await.unwrap();

        assert_eq!(metadata.preferred_cache, "login.windows.net");
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn private_cloud_aliases_come_from_discovery() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/common/discovery/instance"))
            .and(query_param("api-version", "1.1"))
            .and(query_param(
                "authorization_endpoint",
                "https://login.sovereign.example/tenant/oauth2/v2.0/authorize",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "tenant_discovery_endpoint": "https://login.sovereign.example/tenant/v2.0/.well-known/openid-configuration",
                "api-version": "1.1",
                "metadata": [{
                    "preferred_network": "login.sovereign.example",
                    "preferred_cache": "login.sovereign.example",
                    "aliases": ["login.sovereign.example", "sts.sovereign.example"]
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let authority = AuthorityInfo::parse("https://login.sovereign.example/tenant/").unwrap();
        let metadata = discovery(&server).metadata(&authority).await.unwrap();

        assert!(metadata.is_alias("sts.sovereign.example"));
    }

    #[tokio::test]
    async fn invalid_instance_is_untrusted() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_instance",
                "error_description": "AADSTS50049: Unknown or invalid instance."
            })))
            .mount(&server)
            .await;

        let authority = AuthorityInfo::parse("https://login.evil.example/tenant/").unwrap();
        let err = discovery(&server).metadata(&authority).await.unwrap_err();

        assert!(matches!(err, AuthError::UntrustedAuthority(_)));
    }

    #[tokio::test]
    async fn discovery_outage_falls_back_to_self_alias() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let authority = AuthorityInfo::parse("https://login.sovereign.example/tenant/").unwrap();
        let metadata = discovery(&server).metadata(&authority).await.unwrap();

        assert_eq!(metadata, InstanceMetadata::self_aliased("login.sovereign.example"));
    }
}
