//! Shared collaborators for every request of one client

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use tokenflow_common::{Clock, PiiRedactor, SystemClock};
use tokenflow_domain::{AuthorityEndpoints, AuthorityInfo, Result};
use tracing::debug;

use crate::cache::TokenCache;
use crate::ports::{
    AuthorityResolver, DeviceAuthorizationClient, RealmDiscovery, TokenEndpointClient, WebUi,
    WsTrustClient,
};

/// Explicit replacement for process-wide state: the ports, the cache, the
/// clock and the resolved-endpoint memo of one client application.
pub struct ClientContext {
    client_id: String,
    pub(crate) authority_resolver: Arc<dyn AuthorityResolver>,
    pub(crate) token_endpoint: Arc<dyn TokenEndpointClient>,
    pub(crate) cache: Option<Arc<TokenCache>>,
    pub(crate) web_ui: Option<Arc<dyn WebUi>>,
    pub(crate) realm_discovery: Option<Arc<dyn RealmDiscovery>>,
    pub(crate) ws_trust: Option<Arc<dyn WsTrustClient>>,
    pub(crate) device_authorization: Option<Arc<dyn DeviceAuthorizationClient>>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) redactor: PiiRedactor,
    endpoints: DashMap<String, AuthorityEndpoints>,
}

impl fmt::Debug for ClientContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientContext")
            .field("client_id", &self.client_id)
            .field("cache", &self.cache)
            .field("has_web_ui", &self.web_ui.is_some())
            .field("resolved_authorities", &self.endpoints.len())
            .finish_non_exhaustive()
    }
}

impl ClientContext {
    pub fn new(
        client_id: impl Into<String>,
        authority_resolver: Arc<dyn AuthorityResolver>,
        token_endpoint: Arc<dyn TokenEndpointClient>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            authority_resolver,
            token_endpoint,
            cache: None,
            web_ui: None,
            realm_discovery: None,
            ws_trust: None,
            device_authorization: None,
            clock: Arc::new(SystemClock),
            redactor: PiiRedactor::default(),
            endpoints: DashMap::new(),
        }
    }

    #[must_use]
    pub fn with_cache(mut self, cache: Arc<TokenCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    #[must_use]
    pub fn with_web_ui(mut self, web_ui: Arc<dyn WebUi>) -> Self {
        self.web_ui = Some(web_ui);
        self
    }

    #[must_use]
    pub fn with_realm_discovery(mut self, realm_discovery: Arc<dyn RealmDiscovery>) -> Self {
        self.realm_discovery = Some(realm_discovery);
        self
    }

    #[must_use]
    pub fn with_ws_trust(mut self, ws_trust: Arc<dyn WsTrustClient>) -> Self {
        self.ws_trust = Some(ws_trust);
        self
    }

    #[must_use]
    pub fn with_device_authorization(
        mut self,
        device_authorization: Arc<dyn DeviceAuthorizationClient>,
    ) -> Self {
        self.device_authorization = Some(device_authorization);
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_redactor(mut self, redactor: PiiRedactor) -> Self {
        self.redactor = redactor;
        self
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn cache(&self) -> Option<&Arc<TokenCache>> {
        self.cache.as_ref()
    }

    pub fn redactor(&self) -> &PiiRedactor {
        &self.redactor
    }

    /// Endpoints for `authority`, resolved once per canonical authority.
    pub async fn resolve_endpoints(
        &self,
        authority: &AuthorityInfo,
        login_hint: Option<&str>,
    ) -> Result<AuthorityEndpoints> {
        if let Some(cached) = self.endpoints.get(authority.canonical()) {
            return Ok(cached.clone());
        }

        debug!(authority = authority.canonical(), "resolving authority endpoints");
        let endpoints = self.authority_resolver.resolve_endpoints(authority, login_hint).await?;
        self.endpoints.insert(authority.canonical().to_string(), endpoints.clone());
        Ok(endpoints)
    }
}
