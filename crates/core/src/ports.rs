//! Port interfaces for token acquisition
//!
//! These traits define the boundaries between the acquisition engine and
//! the network, the user agent and persistent storage. Infrastructure
//! implementations live in `tokenflow-infra`; in-memory fakes live in
//! [`crate::testing`].

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokenflow_domain::{
    AuthorityEndpoints, AuthorityInfo, AuthorizationResult, DeviceCodeResponse, InstanceMetadata,
    Result, SamlAssertion, Secret, TokenResponse, UserRealm,
};
use tokio_util::sync::CancellationToken;
use url::Url;

/// Resolves the endpoints of an authority (OIDC discovery)
#[async_trait]
pub trait AuthorityResolver: Send + Sync {
    /// Resolve authorization and token endpoints for `authority`.
    ///
    /// Fails with `UntrustedAuthority` when the host is not a known instance
    /// and validation is on, or `TenantDiscoveryFailed` when the discovery
    /// document cannot be fetched.
    async fn resolve_endpoints(
        &self,
        authority: &AuthorityInfo,
        login_hint: Option<&str>,
    ) -> Result<AuthorityEndpoints>;
}

/// Resolves the alias group of a cloud instance
#[async_trait]
pub trait InstanceDiscovery: Send + Sync {
    /// Metadata for the host of `authority`. Unknown hosts alias only
    /// themselves.
    async fn metadata(&self, authority: &AuthorityInfo) -> Result<InstanceMetadata>;
}

/// Posts grant requests to a token endpoint
#[async_trait]
pub trait TokenEndpointClient: Send + Sync {
    /// POST `form` as `application/x-www-form-urlencoded`.
    ///
    /// OAuth error bodies come back as `AuthError::Service`.
    async fn exchange(
        &self,
        token_endpoint: &str,
        form: &BTreeMap<String, String>,
    ) -> Result<TokenResponse>;
}

/// Starts a device authorization grant
#[async_trait]
pub trait DeviceAuthorizationClient: Send + Sync {
    /// POST `form` to the device authorization endpoint.
    ///
    /// OAuth error bodies come back as `AuthError::Service`.
    async fn request_device_code(
        &self,
        device_code_endpoint: &str,
        form: &BTreeMap<String, String>,
    ) -> Result<DeviceCodeResponse>;
}

/// Context handed to the persistence hooks around every cache access
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheNotificationArgs {
    pub client_id: String,
    /// Home account id of the account being read or written, if any.
    pub home_account_id: Option<String>,
    pub is_write: bool,
    /// Only meaningful in `after_access`.
    pub has_state_changed: bool,
}

/// Application-supplied persistence for the token cache
#[async_trait]
pub trait CachePersistence: Send + Sync {
    /// Called with the cache lock held, before the cache is read or written.
    ///
    /// Return a snapshot to replace the in-memory state, or `None` to keep
    /// it.
    async fn before_access(&self, args: &CacheNotificationArgs) -> Result<Option<Vec<u8>>>;

    /// Called with the cache lock held, exactly once after every access.
    ///
    /// `snapshot` carries the serialized state when it changed.
    async fn after_access(
        &self,
        args: &CacheNotificationArgs,
        snapshot: Option<Vec<u8>>,
    ) -> Result<()>;
}

/// Drives the user agent through the authorization step
#[async_trait]
pub trait WebUi: Send + Sync {
    /// Navigate to `authorization_uri` and wait for a redirect to
    /// `redirect_uri`.
    ///
    /// Implementations must stop and release their resources when `cancel`
    /// fires.
    async fn acquire_authorization(
        &self,
        authorization_uri: Url,
        redirect_uri: Url,
        cancel: CancellationToken,
    ) -> Result<AuthorizationResult>;
}

/// Home realm discovery for a username
#[async_trait]
pub trait RealmDiscovery: Send + Sync {
    async fn user_realm(&self, authority: &AuthorityInfo, username: &str) -> Result<UserRealm>;
}

/// WS-Trust exchange against a federated identity provider
#[async_trait]
pub trait WsTrustClient: Send + Sync {
    /// Trade username and password for a SAML assertion at the realm's
    /// federation endpoint.
    async fn acquire_saml_assertion(
        &self,
        realm: &UserRealm,
        username: &str,
        password: &Secret,
    ) -> Result<SamlAssertion>;
}
