use std::collections::BTreeMap;

use tokenflow_domain::constants::{grant_type, param};
use tokenflow_domain::{AuthError, Result};

use crate::request::RequestParameters;

/// App-only tokens for a confidential client.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClientCredentialsFlow;

impl ClientCredentialsFlow {
    pub(crate) fn check_preconditions(params: &RequestParameters) -> Result<()> {
        if params.client_credential.is_none() {
            return Err(AuthError::MissingArgument("client_credential"));
        }
        Ok(())
    }

    pub(crate) fn body_parameters() -> BTreeMap<String, String> {
        BTreeMap::from([(param::GRANT_TYPE.to_string(), grant_type::CLIENT_CREDENTIALS.to_string())])
    }
}
