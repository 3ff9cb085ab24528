use std::collections::BTreeMap;

use tokenflow_common::auth::pkce::validate_state;
use tokenflow_common::PkceChallenge;
use tokenflow_domain::constants::{grant_type, oauth_error, param};
use tokenflow_domain::{
    AuthError, AuthorizationResult, AuthorizationStatus, IdToken, Result, Secret, TokenResponse,
};
use tracing::debug;
use url::Url;

use super::FlowContext;
use crate::request::{with_cancellation, RequestParameters};

/// Authorization code grant with PKCE, driven through the [`WebUi`] port.
///
/// [`WebUi`]: crate::ports::WebUi
#[derive(Debug, Clone)]
pub struct InteractiveFlow {
    prompt: Option<String>,
    challenge: PkceChallenge,
    code: Option<Secret>,
}

impl Default for InteractiveFlow {
    fn default() -> Self {
        Self::new()
    }
}

impl InteractiveFlow {
    pub fn new() -> Self {
        Self { prompt: None, challenge: PkceChallenge::generate(), code: None }
    }

    /// `login`, `consent`, `select_account` or `none`.
    #[must_use]
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    pub fn challenge(&self) -> &PkceChallenge {
        &self.challenge
    }

    /// Authorize URI sent to the user agent.
    pub fn authorization_uri(&self, ctx: &FlowContext<'_>) -> Result<Url> {
        let params = ctx.params;
        let redirect_uri = params.redirect_uri.as_ref().ok_or(AuthError::MissingArgument("redirect_uri"))?;
        let mut uri = Url::parse(&ctx.endpoints.authorization_endpoint).map_err(|e| {
            AuthError::TenantDiscoveryFailed(format!("bad authorization endpoint: {e}"))
        })?;
        let scopes = params.scopes.decorate(&params.client_id, false);
        let login_hint = params
            .login_hint
            .as_deref()
            .or_else(|| params.account.as_ref().and_then(|a| a.username.as_deref()));

        {
            let mut query = uri.query_pairs_mut();
            query
                .append_pair(param::CLIENT_ID, &params.client_id)
                .append_pair(param::RESPONSE_TYPE, param::CODE)
                .append_pair(param::REDIRECT_URI, redirect_uri.as_str())
                .append_pair(param::SCOPE, &scopes.as_single_string())
                .append_pair(param::STATE, &self.challenge.state)
                .append_pair(param::NONCE, &self.challenge.nonce)
                .append_pair(param::CODE_CHALLENGE, &self.challenge.code_challenge)
                .append_pair(param::CODE_CHALLENGE_METHOD, self.challenge.challenge_method())
                .append_pair(param::CLIENT_INFO, "1");
            if let Some(hint) = login_hint {
                query.append_pair(param::LOGIN_HINT, hint);
            }
            if let Some(prompt) = &self.prompt {
                query.append_pair(param::PROMPT, prompt);
            }
            for (key, value) in &params.extra_query_parameters {
                query.append_pair(key, value);
            }
        }
        Ok(uri)
    }

    pub(crate) async fn pre_token_request(&mut self, ctx: &FlowContext<'_>) -> Result<()> {
        let web_ui = ctx.context.web_ui.clone().ok_or(AuthError::MissingArgument("web_ui"))?;
        let redirect_uri =
            ctx.params.redirect_uri.clone().ok_or(AuthError::MissingArgument("redirect_uri"))?;
        let uri = self.authorization_uri(ctx)?;

        let result = with_cancellation(
            ctx.cancel,
            "web_ui",
            web_ui.acquire_authorization(uri, redirect_uri, ctx.cancel.child_token()),
        )
        .await?;

        self.code = Some(self.accept(result)?);
        debug!("authorization code obtained");
        Ok(())
    }

    fn accept(&self, result: AuthorizationResult) -> Result<Secret> {
        match result.status {
            AuthorizationStatus::Success => {
                let returned = result.state.as_deref().unwrap_or_default();
                if !validate_state(&self.challenge.state, returned) {
                    return Err(AuthError::StateMismatch);
                }
                result.code.map(Secret::new).ok_or_else(|| AuthError::AuthenticationUiFailed {
                    code: "authorization_code_missing".to_string(),
                    description: "redirect carried no authorization code".to_string(),
                })
            }
            AuthorizationStatus::UserCancel => Err(AuthError::UserCanceled),
            AuthorizationStatus::ProtocolError
                if result.error.as_deref() == Some(oauth_error::ACCESS_DENIED) =>
            {
                Err(AuthError::AccessDenied { description: result.error_description.unwrap_or_default() })
            }
            AuthorizationStatus::ProtocolError | AuthorizationStatus::UnknownError => {
                Err(AuthError::AuthenticationUiFailed {
                    code: result.error.unwrap_or_else(|| "unknown_error".to_string()),
                    description: result.error_description.unwrap_or_default(),
                })
            }
        }
    }

    pub(crate) fn body_parameters(&self, params: &RequestParameters) -> Result<BTreeMap<String, String>> {
        let code = self.code.as_ref().ok_or(AuthError::MissingArgument("authorization_code"))?;
        let redirect_uri = params.redirect_uri.as_ref().ok_or(AuthError::MissingArgument("redirect_uri"))?;

        let mut body = BTreeMap::new();
        body.insert(param::GRANT_TYPE.to_string(), grant_type::AUTHORIZATION_CODE.to_string());
        body.insert(param::CODE.to_string(), code.expose().to_string());
        body.insert(param::REDIRECT_URI.to_string(), redirect_uri.to_string());
        body.insert(param::CODE_VERIFIER.to_string(), self.challenge.code_verifier.clone());
        Ok(body)
    }

    /// The ID token must echo the nonce of the authorize request.
    pub(crate) fn validate_result(&self, response: &TokenResponse) -> Result<()> {
        let Some(raw) = &response.id_token else {
            return Ok(());
        };
        let id_token = IdToken::parse(raw.expose())?;
        match id_token.claims.nonce.as_deref() {
            Some(nonce) if nonce != self.challenge.nonce => Err(AuthError::NonceMismatch),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_is_compared_case_insensitively() {
        let flow = InteractiveFlow::new();
        let state = flow.challenge().state.to_uppercase();
        let code = flow.accept(AuthorizationResult::success("code", Some(state))).unwrap();
        assert_eq!(code.expose(), "code");
    }

    /// Validates the mapping of UI outcomes to errors.
    ///
    /// Assertions:
    /// - Ensures a foreign state is a state mismatch.
    /// - Ensures cancel, access_denied and other errors map to UI errors.
    #[test]
    fn ui_outcomes_map_to_errors() {
        let flow = InteractiveFlow::new();
        assert_eq!(
            flow.accept(AuthorizationResult::success("code", Some("forged".into()))).unwrap_err(),
            AuthError::StateMismatch
        );
        assert_eq!(
            flow.accept(AuthorizationResult::user_cancel()).unwrap_err(),
            AuthError::UserCanceled
        );
        assert!(matches!(
            flow.accept(AuthorizationResult::protocol_error("access_denied", Some("no".into()))),
            Err(AuthError::AccessDenied { .. })
        ));
        assert!(matches!(
            flow.accept(AuthorizationResult::protocol_error("server_error", None)),
            Err(AuthError::AuthenticationUiFailed { .. })
        ));
    }
}
