//! Grant-type strategies
//!
//! Each flow contributes the grant-specific part of a token request: an
//! optional async step that obtains the grant artifact, the body
//! parameters, and response checks. The orchestrator owns everything else.

mod authorization_code;
mod client_credentials;
mod device_code;
mod federated;
mod interactive;
mod on_behalf_of;
mod silent;

use std::collections::BTreeMap;

use tokenflow_domain::{
    impl_domain_enum_conversions, AuthError, AuthorityEndpoints, RefreshTokenItem, Result,
    ScopeSet, TokenResponse,
};
use tokio_util::sync::CancellationToken;

pub use authorization_code::AuthorizationCodeFlow;
pub use client_credentials::ClientCredentialsFlow;
pub use device_code::{DeviceCodeCallback, DeviceCodeFlow, SLOW_DOWN_STEP};
pub use federated::FederatedFlow;
pub use interactive::InteractiveFlow;
pub use on_behalf_of::OnBehalfOfFlow;
pub use silent::SilentFlow;

use crate::request::{with_cancellation, ClientContext, RequestParameters};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowKind {
    AuthorizationCode,
    ClientCredentials,
    Silent,
    OnBehalfOf,
    Interactive,
    Federated,
    DeviceCode,
}

impl_domain_enum_conversions!(FlowKind {
    AuthorizationCode => "authorization_code",
    ClientCredentials => "client_credentials",
    Silent => "silent",
    OnBehalfOf => "on_behalf_of",
    Interactive => "interactive",
    Federated => "federated",
    DeviceCode => "device_code",
});

/// What a flow may touch while obtaining its grant artifact.
#[derive(Debug, Clone, Copy)]
pub struct FlowContext<'a> {
    pub context: &'a ClientContext,
    pub params: &'a RequestParameters,
    pub endpoints: &'a AuthorityEndpoints,
    pub cancel: &'a CancellationToken,
}

#[derive(Debug, Clone)]
pub enum GrantFlow {
    AuthorizationCode(AuthorizationCodeFlow),
    ClientCredentials(ClientCredentialsFlow),
    Silent(SilentFlow),
    OnBehalfOf(OnBehalfOfFlow),
    Interactive(InteractiveFlow),
    Federated(FederatedFlow),
    DeviceCode(DeviceCodeFlow),
}

impl GrantFlow {
    pub fn kind(&self) -> FlowKind {
        match self {
            Self::AuthorizationCode(_) => FlowKind::AuthorizationCode,
            Self::ClientCredentials(_) => FlowKind::ClientCredentials,
            Self::Silent(_) => FlowKind::Silent,
            Self::OnBehalfOf(_) => FlowKind::OnBehalfOf,
            Self::Interactive(_) => FlowKind::Interactive,
            Self::Federated(_) => FlowKind::Federated,
            Self::DeviceCode(_) => FlowKind::DeviceCode,
        }
    }

    /// Flows that may be answered from the cache without a network call.
    pub fn reads_cache(&self) -> bool {
        matches!(self, Self::ClientCredentials(_) | Self::Silent(_) | Self::OnBehalfOf(_))
    }

    /// Flows that need the account's refresh token from the cache check.
    pub fn redeems_refresh_token(&self) -> bool {
        matches!(self, Self::Silent(_))
    }

    /// Hand over the refresh token found by the cache check.
    pub(crate) fn use_cached_refresh_token(&mut self, refresh_token: Option<RefreshTokenItem>) {
        if let Self::Silent(flow) = self {
            flow.use_refresh_token(refresh_token);
        }
    }

    pub fn requires_redirect_uri(&self) -> bool {
        matches!(self, Self::AuthorizationCode(_) | Self::Interactive(_))
    }

    pub fn is_client_credential(&self) -> bool {
        matches!(self, Self::ClientCredentials(_))
    }

    /// Scopes sent on the wire.
    pub fn decorate_scope(&self, scopes: &ScopeSet, client_id: &str) -> ScopeSet {
        scopes.decorate(client_id, self.is_client_credential())
    }

    /// Flow-specific argument checks, run with the entry validation.
    pub(crate) fn check_preconditions(&self, params: &RequestParameters) -> Result<()> {
        match self {
            Self::AuthorizationCode(flow) => flow.check_preconditions(),
            Self::ClientCredentials(_) => ClientCredentialsFlow::check_preconditions(params),
            Self::Silent(_) => SilentFlow::check_preconditions(params),
            Self::OnBehalfOf(_) => OnBehalfOfFlow::check_preconditions(params),
            Self::Interactive(_) => Ok(()),
            Self::Federated(flow) => flow.check_preconditions(),
            Self::DeviceCode(_) => Ok(()),
        }
    }

    /// Obtain the grant artifact (code, refresh token, SAML assertion,
    /// device code).
    pub async fn pre_token_request(&mut self, ctx: &FlowContext<'_>) -> Result<()> {
        match self {
            Self::Silent(flow) => flow.pre_token_request(),
            Self::Interactive(flow) => flow.pre_token_request(ctx).await,
            Self::Federated(flow) => flow.pre_token_request(ctx).await,
            Self::DeviceCode(flow) => flow.pre_token_request(ctx).await,
            Self::AuthorizationCode(_) | Self::ClientCredentials(_) | Self::OnBehalfOf(_) => Ok(()),
        }
    }

    /// Grant-specific body parameters.
    pub fn build_body_parameters(&self, params: &RequestParameters) -> Result<BTreeMap<String, String>> {
        match self {
            Self::AuthorizationCode(flow) => flow.body_parameters(params),
            Self::ClientCredentials(_) => Ok(ClientCredentialsFlow::body_parameters()),
            Self::Silent(flow) => flow.body_parameters(),
            Self::OnBehalfOf(_) => OnBehalfOfFlow::body_parameters(params),
            Self::Interactive(flow) => flow.body_parameters(params),
            Self::Federated(flow) => flow.body_parameters(),
            Self::DeviceCode(flow) => flow.body_parameters(),
        }
    }

    /// POST the grant form; the device code flow keeps polling until the
    /// user has signed in.
    pub(crate) async fn exchange(
        &self,
        ctx: &FlowContext<'_>,
        form: &BTreeMap<String, String>,
    ) -> Result<TokenResponse> {
        match self {
            Self::DeviceCode(flow) => flow.poll(ctx, form).await,
            _ => {
                with_cancellation(
                    ctx.cancel,
                    "token_exchange",
                    ctx.context.token_endpoint.exchange(&ctx.endpoints.token_endpoint, form),
                )
                .await
            }
        }
    }

    pub fn validate_result(&self, response: &mut TokenResponse) -> Result<()> {
        match self {
            Self::Silent(flow) => {
                flow.validate_result(response);
                Ok(())
            }
            Self::Interactive(flow) => flow.validate_result(response),
            _ => Ok(()),
        }
    }

    /// Token endpoint errors as the caller should see them.
    pub fn map_exchange_error(&self, error: AuthError) -> AuthError {
        match self {
            Self::Silent(_) => error.into_interaction_required(),
            _ => error,
        }
    }
}
