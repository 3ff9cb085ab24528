//! HTTP transport and the token endpoint adapter

pub mod client;
pub mod token_endpoint;

pub use client::{HttpClient, HttpClientBuilder};
pub use token_endpoint::{HttpDeviceAuthorization, HttpTokenEndpoint};
