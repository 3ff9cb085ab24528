//! Per-request inputs

use std::collections::BTreeMap;
use std::sync::Arc;

use tokenflow_domain::{Account, AuthError, AuthorityInfo, Result, ScopeSet};
use url::Url;
use uuid::Uuid;

use crate::cache::TokenQuery;
use crate::credential::{ClientCredential, UserAssertion};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestFlags {
    /// Skip the cache read and always go to the network.
    pub force_refresh: bool,
    pub is_client_credential: bool,
    pub load_from_cache: bool,
    pub store_to_cache: bool,
}

impl Default for RequestFlags {
    fn default() -> Self {
        Self {
            force_refresh: false,
            is_client_credential: false,
            load_from_cache: true,
            store_to_cache: true,
        }
    }
}

/// Everything one acquisition needs besides the flow itself.
#[derive(Debug, Clone)]
pub struct RequestParameters {
    pub authority: AuthorityInfo,
    tenant_updated_authority: Option<AuthorityInfo>,
    pub client_id: String,
    pub scopes: ScopeSet,
    pub redirect_uri: Option<Url>,
    pub account: Option<Account>,
    pub login_hint: Option<String>,
    pub extra_query_parameters: BTreeMap<String, String>,
    pub client_credential: Option<Arc<ClientCredential>>,
    pub user_assertion: Option<UserAssertion>,
    pub flags: RequestFlags,
    pub correlation_id: Uuid,
}

impl RequestParameters {
    /// Scopes are taken as given here and checked by [`Self::validate`].
    pub fn new<I, S>(authority: AuthorityInfo, client_id: impl Into<String>, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            authority,
            tenant_updated_authority: None,
            client_id: client_id.into(),
            scopes: ScopeSet::from_entries(scopes),
            redirect_uri: None,
            account: None,
            login_hint: None,
            extra_query_parameters: BTreeMap::new(),
            client_credential: None,
            user_assertion: None,
            flags: RequestFlags::default(),
            correlation_id: Uuid::new_v4(),
        }
    }

    #[must_use]
    pub fn with_account(mut self, account: Account) -> Self {
        self.account = Some(account);
        self
    }

    #[must_use]
    pub fn with_redirect_uri(mut self, redirect_uri: Url) -> Self {
        self.redirect_uri = Some(redirect_uri);
        self
    }

    #[must_use]
    pub fn with_login_hint(mut self, login_hint: impl Into<String>) -> Self {
        self.login_hint = Some(login_hint.into());
        self
    }

    #[must_use]
    pub fn with_extra_query_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_query_parameters.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_client_credential(mut self, credential: Arc<ClientCredential>) -> Self {
        self.client_credential = Some(credential);
        self
    }

    #[must_use]
    pub fn with_user_assertion(mut self, assertion: UserAssertion) -> Self {
        self.user_assertion = Some(assertion);
        self
    }

    #[must_use]
    pub fn with_flags(mut self, flags: RequestFlags) -> Self {
        self.flags = flags;
        self
    }

    #[must_use]
    pub fn with_correlation_id(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = correlation_id;
        self
    }

    /// Authority pinned to the tenant the server answered for; the
    /// configured authority until then.
    pub fn tenant_updated_authority(&self) -> &AuthorityInfo {
        self.tenant_updated_authority.as_ref().unwrap_or(&self.authority)
    }

    pub(crate) fn update_tenant(&mut self, tenant_id: &str) {
        if self.authority.is_tenantless() && !tenant_id.is_empty() {
            self.tenant_updated_authority = Some(self.authority.with_tenant(tenant_id));
        }
    }

    pub fn cache_query(&self) -> TokenQuery<'_> {
        TokenQuery {
            authority: &self.authority,
            scopes: &self.scopes,
            account: self.account.as_ref(),
            user_assertion_hash: self.user_assertion.as_ref().map(UserAssertion::hash),
            is_client_credential: self.flags.is_client_credential,
        }
    }

    /// Entry checks done before any I/O.
    ///
    /// # Errors
    /// Scope policy violations, a missing or fragment-carrying redirect URI
    /// when `needs_redirect_uri`, and an empty client id.
    pub fn validate(&self, needs_redirect_uri: bool) -> Result<()> {
        if self.client_id.trim().is_empty() {
            return Err(AuthError::MissingArgument("client_id"));
        }
        self.scopes.validate_for_request(&self.client_id, self.flags.is_client_credential)?;

        if needs_redirect_uri {
            let redirect = self.redirect_uri.as_ref().ok_or(AuthError::MissingArgument("redirect_uri"))?;
            if redirect.fragment().is_some() {
                return Err(AuthError::RedirectUriHasFragment(redirect.to_string()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(scopes: &[&str]) -> RequestParameters {
        let authority = AuthorityInfo::parse("https://login.microsoftonline.com/common").unwrap();
        RequestParameters::new(authority, "cid", scopes.iter().copied())
    }

    #[test]
    fn validate_applies_scope_policy() {
        assert!(params(&["user.read"]).validate(false).is_ok());
        assert_eq!(params(&[]).validate(false).unwrap_err(), AuthError::EmptyScopes);
        assert!(matches!(
            params(&["openid"]).validate(false),
            Err(AuthError::ReservedScope(_))
        ));
    }

    #[test]
    fn redirect_uri_rules() {
        let missing = params(&["user.read"]);
        assert_eq!(
            missing.validate(true).unwrap_err(),
            AuthError::MissingArgument("redirect_uri")
        );

        let fragment = params(&["user.read"])
            .with_redirect_uri(Url::parse("http://localhost/cb#frag").unwrap());
        assert!(matches!(fragment.validate(true), Err(AuthError::RedirectUriHasFragment(_))));
    }

    #[test]
    fn tenant_update_only_for_tenantless() {
        let mut request = params(&["user.read"]);
        assert_eq!(request.tenant_updated_authority().tenant(), "common");
        request.update_tenant("contoso-id");
        assert_eq!(request.tenant_updated_authority().tenant(), "contoso-id");
        assert_eq!(request.authority.tenant(), "common");
    }

    #[test]
    fn cache_query_carries_assertion_hash() {
        let request = params(&["user.read"]).with_user_assertion(UserAssertion::new("abc"));
        let query = request.cache_query();
        assert_eq!(query.user_assertion_hash, Some(request.user_assertion.as_ref().unwrap().hash()));
    }
}
