//! Token response validation and result assembly

use chrono::{DateTime, Duration, Utc};
use tokenflow_domain::{
    AccessTokenItem, Account, AuthError, AuthenticationResult, ClientInfo, IdToken, IdTokenItem,
    Result, ScopeSet, TokenResponse, TokenSource,
};

use super::parameters::RequestParameters;
use crate::cache::SavedTokens;

/// Decoded parts of a response that passed validation.
#[derive(Debug, Clone)]
pub(crate) struct ValidatedResponse {
    pub id_token: Option<IdToken>,
    pub client_info: Option<ClientInfo>,
    pub scopes: ScopeSet,
    pub expires_on: DateTime<Utc>,
    pub extended_expires_on: DateTime<Utc>,
}

impl ValidatedResponse {
    fn home_account_id(&self) -> Option<String> {
        self.client_info
            .as_ref()
            .map(ClientInfo::home_account_id)
            .or_else(|| self.id_token.as_ref().and_then(|t| t.claims.sub.clone()))
    }
}

/// Check a token response against the request and pin a tenantless
/// authority to the tenant that answered.
///
/// # Errors
/// - `InvalidIdToken` / `InvalidClientInfo` for undecodable payloads
/// - `UserMismatch` when the response is for another account than requested
/// - `invalid_response` for a missing access token or unusable lifetimes
pub(crate) fn validate_response(
    params: &mut RequestParameters,
    response: &TokenResponse,
    now: DateTime<Utc>,
) -> Result<ValidatedResponse> {
    if response.access_token.is_empty() {
        return Err(AuthError::service("invalid_response", "token response carries no access_token"));
    }
    let (expires_on, extended_expires_on) = response.expiry_from(now)?;

    let id_token = match &response.id_token {
        Some(raw) if !raw.is_empty() => Some(IdToken::parse(raw.expose())?),
        _ => None,
    };
    let client_info = match response.client_info.as_deref() {
        Some(raw) if !raw.is_empty() => Some(ClientInfo::parse(raw)?),
        _ => None,
    };

    if let (Some(account), Some(info)) = (&params.account, &client_info) {
        let returned = info.home_account_id();
        if !returned.eq_ignore_ascii_case(&account.home_account_id) {
            return Err(AuthError::UserMismatch {
                expected: account.home_account_id.clone(),
                returned,
            });
        }
    }

    let granted = response
        .scope
        .as_deref()
        .map(|s| ScopeSet::from_scope_string(s).without_reserved())
        .filter(|s| !s.is_empty());
    let scopes = granted.unwrap_or_else(|| params.scopes.clone());

    let tenant = id_token
        .as_ref()
        .and_then(|t| t.tenant_id().map(str::to_string))
        .or_else(|| client_info.as_ref().map(|c| c.utid.clone()));
    if let Some(tenant) = tenant {
        params.update_tenant(&tenant);
    }

    Ok(ValidatedResponse { id_token, client_info, scopes, expires_on, extended_expires_on })
}

/// Result served from a cached access token.
pub(crate) fn from_cache(
    params: &RequestParameters,
    item: &AccessTokenItem,
    id_token: Option<&IdTokenItem>,
    now: DateTime<Utc>,
    buffer: Duration,
) -> AuthenticationResult {
    let parsed = id_token.and_then(|t| IdToken::parse(t.secret.expose()).ok());
    AuthenticationResult {
        access_token: item.secret.clone(),
        token_type: item.token_type.clone(),
        expires_on: item.expires_on,
        extended_expires_on: item.extended_expires_on,
        is_extended_lifetime: item.is_expired(now, buffer),
        tenant_id: Some(item.tenant_id.clone()),
        unique_id: parsed.as_ref().and_then(|t| t.object_id().map(str::to_string)),
        id_token: id_token.map(|t| t.secret.clone()),
        account: params.account.clone(),
        scopes: item.scopes.clone(),
        correlation_id: params.correlation_id,
        source: TokenSource::Cache,
    }
}

/// Result for a fresh response; `saved` is present when it was cached.
pub(crate) fn from_response(
    params: &RequestParameters,
    response: &TokenResponse,
    validated: &ValidatedResponse,
    saved: Option<SavedTokens>,
) -> AuthenticationResult {
    let (expires_on, extended_expires_on, account) = match saved {
        Some(saved) => (
            saved.access_token.expires_on,
            saved.access_token.extended_expires_on,
            saved.account,
        ),
        None => (validated.expires_on, validated.extended_expires_on, None),
    };

    let account = if params.flags.is_client_credential {
        None
    } else {
        account.or_else(|| {
            validated.home_account_id().map(|home| {
                let username =
                    validated.id_token.as_ref().and_then(|t| t.username().map(str::to_string));
                Account::new(home, params.authority.host(), username)
            })
        })
    };

    AuthenticationResult {
        access_token: response.access_token.clone(),
        token_type: response.token_type.clone(),
        expires_on,
        extended_expires_on,
        is_extended_lifetime: false,
        tenant_id: Some(params.tenant_updated_authority().tenant().to_string()),
        unique_id: validated.id_token.as_ref().and_then(|t| t.object_id().map(str::to_string)),
        id_token: response.id_token.clone(),
        account,
        scopes: validated.scopes.clone(),
        correlation_id: params.correlation_id,
        source: TokenSource::IdentityProvider,
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use tokenflow_domain::{AuthorityInfo, Secret};

    use super::*;
    use crate::testing::{client_info, id_token};

    fn params() -> RequestParameters {
        let authority = AuthorityInfo::parse("https://login.microsoftonline.com/common").unwrap();
        RequestParameters::new(authority, "cid", ["user.read"])
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn response(scope: Option<&str>) -> TokenResponse {
        TokenResponse {
            access_token: Secret::new("at"),
            token_type: "Bearer".into(),
            expires_in: 3600,
            id_token: Some(Secret::new(id_token("oid-1", "tenant-1", "user@contoso.com", None))),
            client_info: Some(client_info("uid", "tenant-1")),
            scope: scope.map(str::to_string),
            ..TokenResponse::default()
        }
    }

    /// Validates the happy path of response validation.
    ///
    /// Assertions:
    /// - Ensures the tenantless authority is pinned to the returned tenant.
    /// - Ensures reserved scopes in the response are dropped.
    #[test]
    fn validation_updates_tenant_and_scopes() {
        let mut request = params();
        let response = response(Some("User.Read openid profile"));
        let validated = validate_response(&mut request, &response, now()).unwrap();
        assert_eq!(request.tenant_updated_authority().tenant(), "tenant-1");
        assert_eq!(validated.scopes, ScopeSet::from_scope_string("user.read"));
        assert_eq!(validated.home_account_id().as_deref(), Some("uid.tenant-1"));
    }

    #[test]
    fn missing_scope_falls_back_to_requested() {
        let mut request = params();
        let validated = validate_response(&mut request, &response(None), now()).unwrap();
        assert_eq!(validated.scopes, request.scopes);
    }

    #[test]
    fn foreign_account_is_a_user_mismatch() {
        let mut request =
            params().with_account(Account::new("someone.else", "login.microsoftonline.com", None));
        let err = validate_response(&mut request, &response(None), now()).unwrap_err();
        assert!(matches!(err, AuthError::UserMismatch { .. }));
    }

    #[test]
    fn out_of_range_lifetime_is_an_invalid_response() {
        let mut request = params();
        let oversized = TokenResponse { expires_in: 10_i64.pow(16), ..response(None) };
        let err = validate_response(&mut request, &oversized, now()).unwrap_err();
        assert_eq!(err.code(), "invalid_response");

        let negative = TokenResponse { expires_in: -1, ..response(None) };
        assert!(validate_response(&mut request, &negative, now()).is_err());
    }

    #[test]
    fn unsaved_result_builds_account_from_response() {
        let mut request = params();
        let response = response(None);
        let validated = validate_response(&mut request, &response, now()).unwrap();
        let result = from_response(&request, &response, &validated, None);
        assert_eq!(result.expires_on, now() + Duration::hours(1));
        assert_eq!(result.source, TokenSource::IdentityProvider);
        let account = result.account.unwrap();
        assert_eq!(account.home_account_id, "uid.tenant-1");
        assert_eq!(account.username.as_deref(), Some("user@contoso.com"));
        assert_eq!(result.unique_id.as_deref(), Some("oid-1"));
    }
}
