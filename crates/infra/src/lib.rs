//! # tokenflow infrastructure
//!
//! Infrastructure implementations of the `tokenflow-core` ports.
//!
//! This crate contains:
//! - The retrying `reqwest` HTTP client and the token endpoint adapter
//! - OIDC authority resolution, instance discovery and home realm discovery
//! - Configuration loading (environment, `.env`, TOML/JSON files)
//! - Tracing subscriber initialisation
//!
//! ## Architecture
//! - Implements traits defined in `tokenflow-core`
//! - Depends on `tokenflow-domain` and `tokenflow-core`
//! - Contains all "impure" code (network, filesystem, environment)

pub mod bootstrap;
pub mod config;
pub mod discovery;
pub mod errors;
pub mod http;
pub mod logging;

// Re-export commonly used items
pub use bootstrap::{build_client, ClientBuilder};
pub use discovery::{HttpAuthorityResolver, HttpInstanceDiscovery, HttpRealmDiscovery};
pub use errors::InfraError;
pub use http::{HttpClient, HttpClientBuilder, HttpDeviceAuthorization, HttpTokenEndpoint};
pub use logging::init_tracing;
