//! Token and device authorization endpoint adapters
//!
//! Both post forms and decode either the success payload or an OAuth error
//! body. Response bodies carry secrets and are never logged.

use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::Method;
use serde::de::DeserializeOwned;
use tokenflow_core::ports::{DeviceAuthorizationClient, TokenEndpointClient};
use tokenflow_domain::constants::oauth_error;
use tokenflow_domain::{AuthError, DeviceCodeResponse, OAuthErrorResponse, Result, TokenResponse};
use tracing::{debug, warn};

use super::client::HttpClient;
use crate::errors::InfraError;

#[derive(Debug, Clone)]
pub struct HttpTokenEndpoint {
    http: HttpClient,
}

impl HttpTokenEndpoint {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }
}

#[async_trait]
impl TokenEndpointClient for HttpTokenEndpoint {
    async fn exchange(
        &self,
        token_endpoint: &str,
        form: &BTreeMap<String, String>,
    ) -> Result<TokenResponse> {
        let grant_type = form.get("grant_type").map_or("", String::as_str);
        post_form(&self.http, token_endpoint, form, grant_type).await
    }
}

/// Starts device code sign-ins against the device authorization endpoint.
#[derive(Debug, Clone)]
pub struct HttpDeviceAuthorization {
    http: HttpClient,
}

impl HttpDeviceAuthorization {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }
}

#[async_trait]
impl DeviceAuthorizationClient for HttpDeviceAuthorization {
    async fn request_device_code(
        &self,
        device_code_endpoint: &str,
        form: &BTreeMap<String, String>,
    ) -> Result<DeviceCodeResponse> {
        post_form(&self.http, device_code_endpoint, form, "device_code").await
    }
}

/// POST `form` and decode either `T` or an OAuth error body.
async fn post_form<T: DeserializeOwned>(
    http: &HttpClient,
    endpoint: &str,
    form: &BTreeMap<String, String>,
    grant_type: &str,
) -> Result<T> {
    let request =
        http.request(Method::POST, endpoint).header(ACCEPT, "application/json").form(form);

    let response = http.send(request).await?;
    let status = response.status();
    let body = response.text().await.map_err(|e| AuthError::from(InfraError::from(e)))?;
    debug!(endpoint, grant_type, status = status.as_u16(), "identity provider responded");

    if let Ok(error) = serde_json::from_str::<OAuthErrorResponse>(&body) {
        // Polling answers are expected while the user signs in elsewhere.
        if error.error == oauth_error::AUTHORIZATION_PENDING || error.error == oauth_error::SLOW_DOWN {
            debug!(endpoint, grant_type, error = %error.error, "authorization not complete yet");
        } else {
            warn!(
                endpoint,
                grant_type,
                status = status.as_u16(),
                error = %error.error,
                correlation_id = error.correlation_id.as_deref().unwrap_or(""),
                "identity provider returned an OAuth error"
            );
        }
        return Err(error.into_auth_error(Some(status.as_u16())));
    }

    if status.is_success() {
        return serde_json::from_str::<T>(&body).map_err(|e| AuthError::from(InfraError::from(e)));
    }

    Err(AuthError::Service {
        code: "http_error".into(),
        description: format!(
            "HTTP {} {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("unknown status")
        ),
        status: Some(status.as_u16()),
        suberror: None,
        correlation_id: None,
    })
}
