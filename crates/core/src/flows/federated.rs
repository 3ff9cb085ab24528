use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tokenflow_domain::constants::{grant_type, param};
use tokenflow_domain::{AuthError, Result, SamlAssertion, Secret, UserRealmType};
use tracing::debug;

use super::FlowContext;
use crate::request::with_cancellation;

#[derive(Debug, Clone)]
enum FederatedGrant {
    Saml(SamlAssertion),
    Password,
}

/// Non-interactive username/password sign-in.
///
/// Home realm discovery decides the grant: federated users are sent through
/// WS-Trust for a SAML assertion, managed users use the resource owner
/// password grant.
#[derive(Debug, Clone)]
pub struct FederatedFlow {
    username: String,
    password: Secret,
    grant: Option<FederatedGrant>,
}

impl FederatedFlow {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self { username: username.into(), password: Secret::new(password), grant: None }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub(crate) fn check_preconditions(&self) -> Result<()> {
        if self.username.trim().is_empty() {
            return Err(AuthError::MissingArgument("username"));
        }
        if self.password.is_empty() {
            return Err(AuthError::MissingArgument("password"));
        }
        Ok(())
    }

    pub(crate) async fn pre_token_request(&mut self, ctx: &FlowContext<'_>) -> Result<()> {
        let discovery =
            ctx.context.realm_discovery.clone().ok_or(AuthError::MissingArgument("realm_discovery"))?;
        let redacted = ctx.context.redactor().redact(&self.username);

        let realm = with_cancellation(
            ctx.cancel,
            "user_realm_discovery",
            discovery.user_realm(&ctx.params.authority, &self.username),
        )
        .await?;
        debug!(username = %redacted, account_type = ?realm.account_type, "user realm discovered");

        let grant = match realm.account_type {
            UserRealmType::Federated => {
                let ws_trust =
                    ctx.context.ws_trust.clone().ok_or(AuthError::MissingArgument("ws_trust"))?;
                let assertion = with_cancellation(
                    ctx.cancel,
                    "ws_trust",
                    ws_trust.acquire_saml_assertion(&realm, &self.username, &self.password),
                )
                .await?;
                FederatedGrant::Saml(assertion)
            }
            UserRealmType::Managed => FederatedGrant::Password,
            UserRealmType::Unknown => return Err(AuthError::UnknownUserType(redacted)),
        };
        self.grant = Some(grant);
        Ok(())
    }

    pub(crate) fn body_parameters(&self) -> Result<BTreeMap<String, String>> {
        let grant = self.grant.as_ref().ok_or_else(|| AuthError::UnknownUserType(String::new()))?;

        let mut body = BTreeMap::new();
        match grant {
            FederatedGrant::Saml(assertion) => {
                body.insert(
                    param::GRANT_TYPE.to_string(),
                    assertion.assertion_type.grant_type().to_string(),
                );
                body.insert(
                    param::ASSERTION.to_string(),
                    STANDARD.encode(assertion.assertion.expose().as_bytes()),
                );
            }
            FederatedGrant::Password => {
                body.insert(param::GRANT_TYPE.to_string(), grant_type::PASSWORD.to_string());
                body.insert(param::USERNAME.to_string(), self.username.clone());
                body.insert(param::PASSWORD.to_string(), self.password.expose().to_string());
            }
        }
        Ok(body)
    }
}
