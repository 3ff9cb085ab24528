//! # tokenflow core
//!
//! Token acquisition engine - no network or platform code.
//!
//! This crate contains:
//! - The shared token cache with its persistence hooks
//! - Grant flows and the request orchestrator that drives them
//! - Client credentials and user assertions
//! - Port interfaces (traits) for discovery, the token endpoint and the UI
//!
//! ## Architecture Principles
//! - Only depends on `tokenflow-common` and `tokenflow-domain`
//! - No HTTP, storage or browser code
//! - All external collaborators via traits in [`ports`]
//! - Every request is cancellable through a `CancellationToken`

pub mod cache;
pub mod client;
pub mod credential;
pub mod flows;
pub mod ports;
pub mod request;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use cache::{
    CacheCounts, CacheLookup, CacheState, FlightGuard, SavedTokens, StaticInstanceDiscovery,
    TokenCache, TokenQuery, TokenWrite,
};
pub use client::TokenClient;
pub use credential::{CertificateCredential, ClientCredential, UserAssertion};
pub use flows::{
    AuthorizationCodeFlow, ClientCredentialsFlow, DeviceCodeCallback, DeviceCodeFlow,
    FederatedFlow, FlowKind, GrantFlow, InteractiveFlow, OnBehalfOfFlow, SilentFlow,
};
pub use ports::{
    AuthorityResolver, CacheNotificationArgs, CachePersistence, DeviceAuthorizationClient,
    InstanceDiscovery, RealmDiscovery, TokenEndpointClient, WebUi, WsTrustClient,
};
pub use request::{
    ClientContext, RequestFlags, RequestOrchestrator, RequestParameters, RequestState,
    TELEMETRY_TARGET,
};
