//! Home realm discovery

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::Method;
use tokenflow_common::PiiRedactor;
use tokenflow_core::ports::RealmDiscovery;
use tokenflow_domain::{AuthError, AuthorityInfo, Result, UserRealm};
use tracing::debug;

use super::origin;
use crate::errors::InfraError;
use crate::http::HttpClient;

const USER_REALM_API_VERSION: &str = "1.0";

/// Looks up `/common/userrealm/{username}` on the authority host.
#[derive(Debug, Clone)]
pub struct HttpRealmDiscovery {
    http: HttpClient,
    redactor: PiiRedactor,
    origin_override: Option<String>,
}

impl HttpRealmDiscovery {
    pub fn new(http: HttpClient, redactor: PiiRedactor) -> Self {
        Self { http, redactor, origin_override: None }
    }

    #[must_use]
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin_override = Some(origin.into());
        self
    }
}

#[async_trait]
impl RealmDiscovery for HttpRealmDiscovery {
    async fn user_realm(&self, authority: &AuthorityInfo, username: &str) -> Result<UserRealm> {
        let url = format!(
            "{}/common/userrealm/{}?api-version={}",
            origin(self.origin_override.as_deref(), authority.host()),
            urlencoding::encode(username),
            USER_REALM_API_VERSION
        );
        debug!(
            host = authority.host(),
            username = %self.redactor.redact(username),
            "querying user realm"
        );

        let request = self.http.request(Method::GET, &url).header(ACCEPT, "application/json");
        let response = self.http.send(request).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::Service {
                code: "user_realm_discovery_failed".into(),
                description: format!("user realm endpoint returned HTTP {}", status.as_u16()),
                status: Some(status.as_u16()),
                suberror: None,
                correlation_id: None,
            });
        }

        let realm: UserRealm =
            response.json().await.map_err(|e| AuthError::from(InfraError::from(e)))?;
        debug!(account_type = ?realm.account_type, "user realm resolved");
        Ok(realm)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tokenflow_domain::UserRealmType;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn discovery(server: &MockServer) -> HttpRealmDiscovery {
        HttpRealmDiscovery::new(
            HttpClient::builder().max_attempts(1).build().unwrap(),
            PiiRedactor::new(false),
        )
        .with_origin(server.uri())
    }

    fn authority() -> AuthorityInfo {
        AuthorityInfo::parse("https://login.microsoftonline.com/common/").unwrap()
    }

    #[tokio::test]
    async fn federated_realm_is_decoded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/common/userrealm/user%40contoso.com"))
            .and(query_param("api-version", "1.0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ver": "1.0",
                "account_type": "Federated",
                "domain_name": "contoso.com",
                "federation_protocol": "WSTrust",
                "federation_metadata_url": "https://fs.contoso.com/adfs/services/trust/mex",
                "federation_active_auth_url": "https://fs.contoso.com/adfs/services/trust/2005/usernamemixed",
                "cloud_audience_urn": "urn:federation:MicrosoftOnline"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let realm = discovery(&server).user_realm(&authority(), "user@contoso.com").await.unwrap();

        assert_eq!(realm.account_type, UserRealmType::Federated);
        assert_eq!(realm.cloud_audience_urn.as_deref(), Some("urn:federation:MicrosoftOnline"));
    }

    #[tokio::test]
    async fn unrecognised_account_type_is_unknown() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "account_type": "Pending" })),
            )
            .mount(&server)
            .await;

        let realm = discovery(&server).user_realm(&authority(), "user@new.com").await.unwrap();
        assert_eq!(realm.account_type, UserRealmType::Unknown);
    }

    #[tokio::test]
    async fn http_failure_is_a_service_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET")).respond_with(ResponseTemplate::new(404)).mount(&server).await;

        let err = discovery(&server).user_realm(&authority(), "user@x.com").await.unwrap_err();
        assert_eq!(err.code(), "user_realm_discovery_failed");
    }
}
