//! Payloads exchanged with the identity provider and its collaborators

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use url::Url;

use super::secret::Secret;
use crate::constants::{grant_type, param, DEFAULT_TOKEN_TYPE};
use crate::errors::AuthError;

/// Successful token endpoint response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: Secret,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Seconds until expiry; some servers send it as a string.
    #[serde(default, deserialize_with = "de_seconds")]
    pub expires_in: i64,
    #[serde(default, deserialize_with = "de_opt_seconds", skip_serializing_if = "Option::is_none")]
    pub ext_expires_in: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<Secret>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<Secret>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_info: Option<String>,
}

impl TokenResponse {
    /// Absolute expiry and extended expiry of the access token, counted
    /// from `now`. The extended expiry is never earlier than the expiry.
    ///
    /// # Errors
    /// `invalid_response` when a lifetime is negative or does not fit a
    /// timestamp.
    pub fn expiry_from(
        &self,
        now: DateTime<Utc>,
    ) -> Result<(DateTime<Utc>, DateTime<Utc>), AuthError> {
        let expires_on = offset_from(now, self.expires_in, "expires_in")?;
        let extended_expires_on = match self.ext_expires_in {
            Some(ext) => offset_from(now, ext, "ext_expires_in")?.max(expires_on),
            None => expires_on,
        };
        Ok((expires_on, extended_expires_on))
    }
}

pub(crate) fn offset_from(now: DateTime<Utc>, seconds: i64, field: &str) -> Result<DateTime<Utc>, AuthError> {
    if seconds < 0 {
        return Err(AuthError::service("invalid_response", format!("{field} is negative: {seconds}")));
    }
    Duration::try_seconds(seconds)
        .and_then(|lifetime| now.checked_add_signed(lifetime))
        .ok_or_else(|| AuthError::service("invalid_response", format!("{field} is out of range: {seconds}")))
}

fn default_token_type() -> String {
    DEFAULT_TOKEN_TYPE.to_string()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawSeconds {
    Number(i64),
    Text(String),
}

impl RawSeconds {
    fn into_seconds<E: serde::de::Error>(self) -> Result<i64, E> {
        match self {
            Self::Number(n) => Ok(n),
            Self::Text(s) => s.trim().parse().map_err(E::custom),
        }
    }
}

pub(crate) fn de_seconds<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    RawSeconds::deserialize(deserializer)?.into_seconds()
}

fn de_opt_seconds<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    Option::<RawSeconds>::deserialize(deserializer)?.map(RawSeconds::into_seconds).transpose()
}

/// OAuth error body (RFC 6749 §5.2 plus the common vendor extensions).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthErrorResponse {
    pub error: String,
    #[serde(default)]
    pub error_description: Option<String>,
    #[serde(default)]
    pub suberror: Option<String>,
    #[serde(default)]
    pub error_codes: Vec<i64>,
    #[serde(default)]
    pub correlation_id: Option<String>,
}

impl OAuthErrorResponse {
    pub fn into_auth_error(self, status: Option<u16>) -> AuthError {
        AuthError::Service {
            code: self.error,
            description: self.error_description.unwrap_or_default(),
            status,
            suberror: self.suberror,
            correlation_id: self.correlation_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationStatus {
    Success,
    UserCancel,
    ProtocolError,
    UnknownError,
}

/// What the interactive UI hands back after the redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationResult {
    pub status: AuthorizationStatus,
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

impl AuthorizationResult {
    pub fn success(code: impl Into<String>, state: Option<String>) -> Self {
        Self {
            status: AuthorizationStatus::Success,
            code: Some(code.into()),
            state,
            error: None,
            error_description: None,
        }
    }

    pub fn user_cancel() -> Self {
        Self {
            status: AuthorizationStatus::UserCancel,
            code: None,
            state: None,
            error: None,
            error_description: None,
        }
    }

    pub fn protocol_error(error: impl Into<String>, description: Option<String>) -> Self {
        Self {
            status: AuthorizationStatus::ProtocolError,
            code: None,
            state: None,
            error: Some(error.into()),
            error_description: description,
        }
    }

    /// Interpret the URI the browser was redirected to.
    ///
    /// Parameters are read from the query, or from the fragment for
    /// `response_mode=fragment`.
    pub fn from_redirect_uri(uri: &Url) -> Self {
        let mut pairs: Vec<(String, String)> =
            uri.query_pairs().map(|(k, v)| (k.into_owned(), v.into_owned())).collect();
        if pairs.is_empty() {
            if let Some(fragment) = uri.fragment() {
                pairs = url::form_urlencoded::parse(fragment.as_bytes())
                    .map(|(k, v)| (k.into_owned(), v.into_owned()))
                    .collect();
            }
        }

        let get = |name: &str| pairs.iter().find(|(k, _)| k == name).map(|(_, v)| v.clone());
        let state = get(param::STATE);

        if let Some(code) = get(param::CODE) {
            return Self::success(code, state);
        }
        if let Some(error) = get(param::ERROR) {
            let mut result = Self::protocol_error(error, get(param::ERROR_DESCRIPTION));
            result.state = state;
            return result;
        }

        Self {
            status: AuthorizationStatus::UnknownError,
            code: None,
            state,
            error: Some("authorization_response_empty".to_string()),
            error_description: Some("redirect carried neither a code nor an error".to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserRealmType {
    Federated,
    Managed,
    #[serde(other)]
    Unknown,
}

/// Home realm discovery answer for a username.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRealm {
    pub account_type: UserRealmType,
    #[serde(default)]
    pub domain_name: Option<String>,
    #[serde(default)]
    pub federation_protocol: Option<String>,
    #[serde(default)]
    pub federation_metadata_url: Option<String>,
    #[serde(default)]
    pub federation_active_auth_url: Option<String>,
    #[serde(default)]
    pub cloud_audience_urn: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamlAssertionType {
    Saml1,
    Saml2,
}

impl SamlAssertionType {
    pub fn grant_type(self) -> &'static str {
        match self {
            Self::Saml1 => grant_type::SAML11_BEARER,
            Self::Saml2 => grant_type::SAML20_BEARER,
        }
    }
}

/// Token issued by a federated identity provider over WS-Trust.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamlAssertion {
    pub assertion_type: SamlAssertionType,
    /// Raw XML of the assertion
    pub assertion: Secret,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_response_accepts_string_expiry() {
        let json = r#"{"access_token":"at","expires_in":"3599","ext_expires_in":7200,"token_type":"Bearer"}"#;
        let response: TokenResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.expires_in, 3599);
        assert_eq!(response.ext_expires_in, Some(7200));
        assert!(response.refresh_token.is_none());
    }

    #[test]
    fn expiry_is_checked_against_the_timestamp_range() {
        let now = chrono::TimeZone::with_ymd_and_hms(&Utc, 2024, 5, 1, 12, 0, 0).unwrap();
        let response = TokenResponse {
            expires_in: 3600,
            ext_expires_in: Some(60),
            ..TokenResponse::default()
        };
        let (expires_on, extended) = response.expiry_from(now).unwrap();
        assert_eq!(expires_on, now + Duration::hours(1));
        assert_eq!(extended, expires_on);

        let huge = TokenResponse { expires_in: 10_i64.pow(16), ..TokenResponse::default() };
        let err = huge.expiry_from(now).unwrap_err();
        assert_eq!(err.code(), "invalid_response");

        let negative = TokenResponse { ext_expires_in: Some(-5), ..response };
        assert_eq!(negative.expiry_from(now).unwrap_err().code(), "invalid_response");
    }

    #[test]
    fn token_type_defaults_to_bearer() {
        let response: TokenResponse =
            serde_json::from_str(r#"{"access_token":"at","expires_in":60}"#).unwrap();
        assert_eq!(response.token_type, "Bearer");
    }

    #[test]
    fn error_response_maps_to_service_error() {
        let body = r#"{"error":"invalid_grant","error_description":"expired","suberror":"bad_token"}"#;
        let err = serde_json::from_str::<OAuthErrorResponse>(body).unwrap().into_auth_error(Some(400));
        match err {
            AuthError::Service { code, status, suberror, .. } => {
                assert_eq!(code, "invalid_grant");
                assert_eq!(status, Some(400));
                assert_eq!(suberror.as_deref(), Some("bad_token"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    /// Validates redirect URI interpretation.
    ///
    /// Assertions:
    /// - Ensures a code in the query is a success carrying the state.
    /// - Ensures an error in the fragment is a protocol error.
    /// - Ensures an empty redirect is an unknown error.
    #[test]
    fn parses_redirect_uris() {
        let ok = Url::parse("http://localhost/cb?code=abc&state=XyZ").unwrap();
        let result = AuthorizationResult::from_redirect_uri(&ok);
        assert_eq!(result.status, AuthorizationStatus::Success);
        assert_eq!(result.code.as_deref(), Some("abc"));
        assert_eq!(result.state.as_deref(), Some("XyZ"));

        let denied =
            Url::parse("http://localhost/cb#error=access_denied&error_description=nope").unwrap();
        let result = AuthorizationResult::from_redirect_uri(&denied);
        assert_eq!(result.status, AuthorizationStatus::ProtocolError);
        assert_eq!(result.error.as_deref(), Some("access_denied"));

        let empty = Url::parse("http://localhost/cb").unwrap();
        assert_eq!(
            AuthorizationResult::from_redirect_uri(&empty).status,
            AuthorizationStatus::UnknownError
        );
    }

    #[test]
    fn user_realm_unknown_account_type() {
        let realm: UserRealm =
            serde_json::from_str(r#"{"account_type":"Something"}"#).unwrap();
        assert_eq!(realm.account_type, UserRealmType::Unknown);
        let realm: UserRealm = serde_json::from_str(
            r#"{"account_type":"Federated","federation_metadata_url":"https://sts/mex"}"#,
        )
        .unwrap();
        assert_eq!(realm.account_type, UserRealmType::Federated);
    }
}
