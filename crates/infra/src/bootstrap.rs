//! Wires the HTTP adapters, the token cache and the configuration into a
//! [`TokenClient`]

use std::sync::Arc;

use tokenflow_common::PiiRedactor;
use tokenflow_core::ports::{CachePersistence, WebUi, WsTrustClient};
use tokenflow_core::{ClientContext, ClientCredential, TokenCache, TokenClient};
use tokenflow_domain::{ClientConfig, Result};
use tokio_util::sync::CancellationToken;

use crate::discovery::{HttpAuthorityResolver, HttpInstanceDiscovery, HttpRealmDiscovery};
use crate::http::{HttpClient, HttpDeviceAuthorization, HttpTokenEndpoint};

/// Builder for a [`TokenClient`] backed by the HTTP adapters.
///
/// The user agent and WS-Trust client are platform specific and must be
/// supplied by the application for interactive and federated flows.
pub struct ClientBuilder {
    config: ClientConfig,
    credential: Option<ClientCredential>,
    persistence: Option<Arc<dyn CachePersistence>>,
    web_ui: Option<Arc<dyn WebUi>>,
    ws_trust: Option<Arc<dyn WsTrustClient>>,
    origin_override: Option<String>,
    shutdown: Option<CancellationToken>,
}

impl ClientBuilder {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            credential: None,
            persistence: None,
            web_ui: None,
            ws_trust: None,
            origin_override: None,
            shutdown: None,
        }
    }

    #[must_use]
    pub fn client_credential(mut self, credential: ClientCredential) -> Self {
        self.credential = Some(credential);
        self
    }

    #[must_use]
    pub fn persistence(mut self, persistence: Arc<dyn CachePersistence>) -> Self {
        self.persistence = Some(persistence);
        self
    }

    #[must_use]
    pub fn web_ui(mut self, web_ui: Arc<dyn WebUi>) -> Self {
        self.web_ui = Some(web_ui);
        self
    }

    #[must_use]
    pub fn ws_trust(mut self, ws_trust: Arc<dyn WsTrustClient>) -> Self {
        self.ws_trust = Some(ws_trust);
        self
    }

    /// Send every discovery request to `origin` instead of the authority
    /// host.
    #[must_use]
    pub fn discovery_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin_override = Some(origin.into());
        self
    }

    /// Stop waiting between HTTP retries once `token` is cancelled.
    #[must_use]
    pub fn shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = Some(token);
        self
    }

    /// # Errors
    /// Configuration validation failures, or a TLS backend that cannot be
    /// initialised.
    pub fn build(self) -> Result<TokenClient> {
        let config = self.config;
        config.validate()?;

        let mut http = HttpClient::builder().options(&config.http);
        if let Some(token) = self.shutdown {
            http = http.shutdown(token);
        }
        let http = http.build()?;
        let redactor = PiiRedactor::new(config.logging.pii_logging_enabled);

        let mut instance_discovery = HttpInstanceDiscovery::new(http.clone());
        let mut resolver_origin = None;
        let mut realm_discovery = HttpRealmDiscovery::new(http.clone(), redactor.clone());
        if let Some(origin) = self.origin_override {
            instance_discovery = instance_discovery.with_origin(origin.clone());
            realm_discovery = realm_discovery.with_origin(origin.clone());
            resolver_origin = Some(origin);
        }
        let instance_discovery = Arc::new(instance_discovery);

        let mut resolver = HttpAuthorityResolver::new(
            http.clone(),
            instance_discovery.clone(),
            config.validate_authority,
        );
        if let Some(origin) = resolver_origin {
            resolver = resolver.with_origin(origin);
        }

        let mut cache = TokenCache::new(config.client_id.clone())
            .with_options(config.cache.clone())
            .with_instance_discovery(instance_discovery);
        if let Some(persistence) = self.persistence {
            cache = cache.with_persistence(persistence);
        }

        let mut context = ClientContext::new(
            config.client_id.clone(),
            Arc::new(resolver),
            Arc::new(HttpTokenEndpoint::new(http.clone())),
        )
        .with_device_authorization(Arc::new(HttpDeviceAuthorization::new(http)))
        .with_cache(Arc::new(cache))
        .with_realm_discovery(Arc::new(realm_discovery))
        .with_redactor(redactor);
        if let Some(web_ui) = self.web_ui {
            context = context.with_web_ui(web_ui);
        }
        if let Some(ws_trust) = self.ws_trust {
            context = context.with_ws_trust(ws_trust);
        }

        let client = TokenClient::new(config, context)?;
        Ok(match self.credential {
            Some(credential) => client.with_client_credential(credential),
            None => client,
        })
    }
}

/// [`TokenClient`] for `config` with the default HTTP adapters.
///
/// # Errors
/// See [`ClientBuilder::build`].
pub fn build_client(config: ClientConfig) -> Result<TokenClient> {
    ClientBuilder::new(config).build()
}
