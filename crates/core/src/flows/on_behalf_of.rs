use std::collections::BTreeMap;

use tokenflow_domain::constants::{grant_type, param};
use tokenflow_domain::{AuthError, Result};

use crate::request::RequestParameters;

/// Trades an incoming user token for one aimed at a downstream API.
///
/// Cached results are partitioned by the hash of the incoming assertion.
#[derive(Debug, Clone, Copy, Default)]
pub struct OnBehalfOfFlow;

const REQUESTED_TOKEN_USE_OBO: &str = "on_behalf_of";

impl OnBehalfOfFlow {
    pub(crate) fn check_preconditions(params: &RequestParameters) -> Result<()> {
        if params.user_assertion.is_none() {
            return Err(AuthError::MissingArgument("user_assertion"));
        }
        if params.client_credential.is_none() {
            return Err(AuthError::MissingArgument("client_credential"));
        }
        Ok(())
    }

    pub(crate) fn body_parameters(params: &RequestParameters) -> Result<BTreeMap<String, String>> {
        let assertion = params.user_assertion.as_ref().ok_or(AuthError::MissingArgument("user_assertion"))?;

        let mut body = BTreeMap::new();
        body.insert(param::GRANT_TYPE.to_string(), grant_type::JWT_BEARER.to_string());
        body.insert(param::ASSERTION.to_string(), assertion.assertion().expose().to_string());
        body.insert(param::REQUESTED_TOKEN_USE.to_string(), REQUESTED_TOKEN_USE_OBO.to_string());
        Ok(body)
    }
}
