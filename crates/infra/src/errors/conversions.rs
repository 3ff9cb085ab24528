//! Conversions from external infrastructure errors into domain errors.

use std::io::Error as IoError;

use reqwest::Error as HttpError;
use tokenflow_common::CommonError;
use tokenflow_domain::AuthError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub AuthError);

impl From<InfraError> for AuthError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<AuthError> for InfraError {
    fn from(value: AuthError) -> Self {
        InfraError(value)
    }
}

/// Extension trait to make the conversion logic explicit in tests and within
/// this module.
trait IntoAuthError {
    fn into_auth(self) -> AuthError;
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → AuthError */
/* -------------------------------------------------------------------------- */

impl IntoAuthError for HttpError {
    fn into_auth(self) -> AuthError {
        if self.is_timeout() {
            return AuthError::Network("HTTP request timed out".into());
        }

        #[cfg(not(target_arch = "wasm32"))]
        if self.is_connect() {
            return AuthError::Network("HTTP connection failure".into());
        }

        if self.is_decode() {
            return CommonError::serialization_format("json", self.to_string()).into();
        }

        if let Some(status) = self.status() {
            let code = status.as_u16();
            let message =
                format!("HTTP {} {}", code, status.canonical_reason().unwrap_or("unknown status"));

            return match code {
                429 | 500..=599 => AuthError::Network(message),
                _ => AuthError::Service {
                    code: "http_error".into(),
                    description: message,
                    status: Some(code),
                    suberror: None,
                    correlation_id: None,
                },
            };
        }

        if self.is_builder() {
            return CommonError::config_field("url", self.to_string()).into();
        }

        AuthError::Network(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_auth())
    }
}

/* -------------------------------------------------------------------------- */
/* Config file errors → AuthError */
/* -------------------------------------------------------------------------- */

impl IntoAuthError for IoError {
    fn into_auth(self) -> AuthError {
        CommonError::config(format!("failed to read config file: {self}")).into()
    }
}

impl From<IoError> for InfraError {
    fn from(value: IoError) -> Self {
        InfraError(value.into_auth())
    }
}

impl IntoAuthError for toml::de::Error {
    fn into_auth(self) -> AuthError {
        CommonError::serialization_format("toml", format!("invalid TOML config: {self}")).into()
    }
}

impl From<toml::de::Error> for InfraError {
    fn from(value: toml::de::Error) -> Self {
        InfraError(value.into_auth())
    }
}

impl IntoAuthError for serde_json::Error {
    fn into_auth(self) -> AuthError {
        CommonError::serialization_format("json", format!("invalid JSON: {self}")).into()
    }
}

impl From<serde_json::Error> for InfraError {
    fn from(value: serde_json::Error) -> Self {
        InfraError(value.into_auth())
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */

#[cfg(test)]
mod tests {
    use reqwest::{Client, StatusCode};
    use tokenflow_domain::ErrorCategory;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    async fn status_error(status: StatusCode) -> HttpError {
        let server = MockServer::start().await;
        Mock::given(method("GET")).respond_with(ResponseTemplate::new(status)).mount(&server).await;

        let client = Client::builder().no_proxy().build().unwrap();
        client.get(server.uri()).send().await.unwrap().error_for_status().unwrap_err()
    }

    #[tokio::test]
    async fn http_status_401_maps_to_service_error() {
        let mapped: AuthError = InfraError::from(status_error(StatusCode::UNAUTHORIZED).await).into();
        match mapped {
            AuthError::Service { status, description, .. } => {
                assert_eq!(status, Some(401));
                assert!(description.contains("401"));
            }
            other => panic!("expected service error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn http_status_503_maps_to_network_error() {
        let mapped: AuthError =
            InfraError::from(status_error(StatusCode::SERVICE_UNAVAILABLE).await).into();
        assert_eq!(mapped.category(), ErrorCategory::Transport);
    }

    #[test]
    fn invalid_toml_maps_to_serialization_error() {
        let err = toml::from_str::<toml::Value>("client_id = ").unwrap_err();
        let mapped: AuthError = InfraError::from(err).into();
        assert_eq!(mapped.code(), "serialization");
    }

    #[test]
    fn io_error_maps_to_config_error() {
        let err = IoError::new(std::io::ErrorKind::PermissionDenied, "denied");
        let mapped: AuthError = InfraError::from(err).into();
        assert_eq!(mapped.code(), "config");
        assert!(mapped.to_string().contains("denied"));
    }
}
