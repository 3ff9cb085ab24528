//! Lookup and write descriptors for the token cache

use tokenflow_domain::{
    AccessTokenItem, Account, AuthorityInfo, AuthorityType, ClientInfo, IdToken, IdTokenItem,
    RefreshTokenItem, ScopeSet, TokenResponse,
};

/// What an access or refresh token lookup is keyed on.
#[derive(Debug, Clone, Copy)]
pub struct TokenQuery<'a> {
    pub authority: &'a AuthorityInfo,
    pub scopes: &'a ScopeSet,
    pub account: Option<&'a Account>,
    /// Set for on-behalf-of requests.
    pub user_assertion_hash: Option<&'a str>,
    pub is_client_credential: bool,
}

impl<'a> TokenQuery<'a> {
    /// Partition segment of the lookup: empty for app tokens, the assertion
    /// hash for on-behalf-of, the home account id otherwise. `None` when a
    /// user request names no account, which can never hit.
    pub fn partition(&self) -> Option<&'a str> {
        if self.is_client_credential {
            Some("")
        } else if let Some(hash) = self.user_assertion_hash {
            Some(hash)
        } else {
            self.account.map(|a| a.home_account_id.as_str())
        }
    }

    pub(crate) fn matches_partition(&self, item: &AccessTokenItem) -> bool {
        if self.is_client_credential {
            return item.home_account_id.is_none() && item.user_assertion_hash.is_none();
        }
        if let Some(hash) = self.user_assertion_hash {
            return item.user_assertion_hash.as_deref() == Some(hash);
        }
        match (self.account, item.home_account_id.as_deref()) {
            (Some(account), Some(home)) => {
                item.user_assertion_hash.is_none()
                    && home.eq_ignore_ascii_case(&account.home_account_id)
            }
            _ => false,
        }
    }

    pub(crate) fn matches_tenant(&self, item: &AccessTokenItem) -> bool {
        if self.authority.authority_type() == AuthorityType::Adfs || item.is_adfs {
            return true;
        }
        if !self.authority.is_tenantless() {
            return item.tenant_id.eq_ignore_ascii_case(self.authority.tenant());
        }
        match self.account.and_then(Account::home_tenant_id) {
            Some(home_tenant) => item.tenant_id.eq_ignore_ascii_case(home_tenant),
            None => true,
        }
    }

    /// Key that serialises find, refresh and save for the same token.
    pub fn flight_key(&self, client_id: &str) -> String {
        [
            client_id,
            self.partition().unwrap_or_default(),
            self.authority.host(),
            self.authority.tenant(),
            &self.scopes.as_single_string(),
        ]
        .join("|")
        .to_lowercase()
    }
}

/// Outcome of one cache check. The refresh token is only looked up when no
/// access token was served.
#[derive(Debug, Clone, Default)]
pub struct CacheLookup {
    pub access_token: Option<AccessTokenItem>,
    pub id_token: Option<IdTokenItem>,
    pub refresh_token: Option<RefreshTokenItem>,
}

/// Everything the cache needs to persist one token response.
#[derive(Debug, Clone)]
pub struct TokenWrite<'a> {
    /// Authority after the tenant returned by the server was applied.
    pub authority: &'a AuthorityInfo,
    /// Scopes granted, or requested when the server did not say.
    pub scopes: ScopeSet,
    pub response: &'a TokenResponse,
    pub id_token: Option<&'a IdToken>,
    pub client_info: Option<&'a ClientInfo>,
    pub user_assertion_hash: Option<&'a str>,
    pub is_client_credential: bool,
}

impl TokenWrite<'_> {
    /// `uid.utid` from client info; ADFS has none and falls back to `sub`.
    pub fn home_account_id(&self) -> Option<String> {
        if self.is_client_credential {
            return None;
        }
        self.client_info
            .map(ClientInfo::home_account_id)
            .or_else(|| self.id_token.and_then(|t| t.claims.sub.clone()))
    }
}

/// Items written by a token response, handed back for result assembly.
#[derive(Debug, Clone)]
pub struct SavedTokens {
    pub access_token: AccessTokenItem,
    pub account: Option<Account>,
}
