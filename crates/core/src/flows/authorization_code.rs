use std::collections::BTreeMap;

use tokenflow_domain::constants::{grant_type, param};
use tokenflow_domain::{AuthError, Result, Secret};

use crate::request::RequestParameters;

/// Redeems an authorization code the application obtained itself.
#[derive(Debug, Clone)]
pub struct AuthorizationCodeFlow {
    code: Secret,
    code_verifier: Option<Secret>,
}

impl AuthorizationCodeFlow {
    pub fn new(code: impl Into<String>) -> Self {
        Self { code: Secret::new(code), code_verifier: None }
    }

    #[must_use]
    pub fn with_code_verifier(mut self, code_verifier: impl Into<String>) -> Self {
        self.code_verifier = Some(Secret::new(code_verifier));
        self
    }

    pub(crate) fn check_preconditions(&self) -> Result<()> {
        if self.code.is_empty() {
            return Err(AuthError::MissingArgument("authorization_code"));
        }
        Ok(())
    }

    pub(crate) fn body_parameters(&self, params: &RequestParameters) -> Result<BTreeMap<String, String>> {
        let redirect_uri = params.redirect_uri.as_ref().ok_or(AuthError::MissingArgument("redirect_uri"))?;

        let mut body = BTreeMap::new();
        body.insert(param::GRANT_TYPE.to_string(), grant_type::AUTHORIZATION_CODE.to_string());
        body.insert(param::CODE.to_string(), self.code.expose().to_string());
        body.insert(param::REDIRECT_URI.to_string(), redirect_uri.to_string());
        if let Some(verifier) = &self.code_verifier {
            body.insert(param::CODE_VERIFIER.to_string(), verifier.expose().to_string());
        }
        Ok(body)
    }
}
