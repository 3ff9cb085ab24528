use std::collections::BTreeMap;

use tokenflow_domain::constants::{grant_type, param};
use tokenflow_domain::{AuthError, RefreshTokenItem, Result, TokenResponse};
use tracing::debug;

use crate::request::RequestParameters;

/// Serves from the cache, or redeems the account's cached refresh token.
#[derive(Debug, Clone, Default)]
pub struct SilentFlow {
    refresh_token: Option<RefreshTokenItem>,
}

impl SilentFlow {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn check_preconditions(params: &RequestParameters) -> Result<()> {
        if params.account.is_none() {
            return Err(AuthError::MissingArgument("account"));
        }
        Ok(())
    }

    /// Refresh token found by the orchestrator's cache check.
    pub(crate) fn use_refresh_token(&mut self, refresh_token: Option<RefreshTokenItem>) {
        self.refresh_token = refresh_token;
    }

    /// None to redeem means only an interactive request can help.
    pub(crate) fn pre_token_request(&self) -> Result<()> {
        let refresh_token = self.refresh_token.as_ref().ok_or(AuthError::NoTokensFound)?;
        debug!(environment = %refresh_token.environment, "redeeming cached refresh token");
        Ok(())
    }

    pub(crate) fn body_parameters(&self) -> Result<BTreeMap<String, String>> {
        let refresh_token = self.refresh_token.as_ref().ok_or(AuthError::NoTokensFound)?;

        let mut body = BTreeMap::new();
        body.insert(param::GRANT_TYPE.to_string(), grant_type::REFRESH_TOKEN.to_string());
        body.insert(param::REFRESH_TOKEN.to_string(), refresh_token.secret.expose().to_string());
        Ok(body)
    }

    /// Servers may omit a rotated refresh token; the redeemed one stays
    /// valid then.
    pub(crate) fn validate_result(&self, response: &mut TokenResponse) {
        if response.refresh_token.is_none() {
            if let Some(original) = &self.refresh_token {
                response.refresh_token = Some(original.secret.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use tokenflow_domain::Secret;

    use super::*;

    fn with_refresh_token(secret: &str) -> SilentFlow {
        SilentFlow {
            refresh_token: Some(RefreshTokenItem {
                environment: "login.windows.net".into(),
                client_id: "cid".into(),
                home_account_id: "uid.utid".into(),
                secret: Secret::new(secret),
                raw_client_info: None,
            }),
        }
    }

    #[test]
    fn nothing_to_redeem_requires_interaction() {
        let mut flow = SilentFlow::new();
        flow.use_refresh_token(None);
        assert_eq!(flow.pre_token_request().unwrap_err(), AuthError::NoTokensFound);
        assert!(with_refresh_token("rt").pre_token_request().is_ok());
    }

    #[test]
    fn body_requires_a_refresh_token() {
        assert_eq!(SilentFlow::new().body_parameters().unwrap_err(), AuthError::NoTokensFound);
        let body = with_refresh_token("rt").body_parameters().unwrap();
        assert_eq!(body["grant_type"], "refresh_token");
        assert_eq!(body["refresh_token"], "rt");
    }

    /// Validates refresh token carry-forward.
    ///
    /// Assertions:
    /// - Ensures a response without a refresh token gets the redeemed one.
    /// - Ensures a rotated refresh token is kept as returned.
    #[test]
    fn carries_refresh_token_forward() {
        let flow = with_refresh_token("original");

        let mut response = TokenResponse::default();
        flow.validate_result(&mut response);
        assert_eq!(response.refresh_token.unwrap().expose(), "original");

        let mut rotated =
            TokenResponse { refresh_token: Some(Secret::new("rotated")), ..TokenResponse::default() };
        flow.validate_result(&mut rotated);
        assert_eq!(rotated.refresh_token.unwrap().expose(), "rotated");
    }
}
