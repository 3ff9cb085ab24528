use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Duration;
use tokenflow_domain::constants::param;
use tokenflow_domain::{
    AuthError, AuthenticationResult, AuthorityEndpoints, Result, TokenResponse,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::cancel::with_cancellation;
use super::context::ClientContext;
use super::parameters::RequestParameters;
use super::result::{self, ValidatedResponse};
use crate::cache::{SavedTokens, TokenWrite};
use crate::flows::{FlowContext, GrantFlow};

/// `tracing` target of the per-request telemetry event.
pub const TELEMETRY_TARGET: &str = "tokenflow::telemetry";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Created,
    AuthorityResolved,
    CacheChecked { hit: bool },
    AuthorizationObtained,
    TokenExchanged,
    ResultPersisted,
    Done,
    Failed,
}

/// Drives one token acquisition through its states.
#[derive(Debug)]
pub struct RequestOrchestrator {
    context: Arc<ClientContext>,
    params: RequestParameters,
    flow: GrantFlow,
    state: RequestState,
}

impl RequestOrchestrator {
    pub fn new(context: Arc<ClientContext>, mut params: RequestParameters, flow: GrantFlow) -> Self {
        params.flags.is_client_credential = flow.is_client_credential();
        Self { context, params, flow, state: RequestState::Created }
    }

    pub fn state(&self) -> RequestState {
        self.state
    }

    fn transition(&mut self, next: RequestState) {
        debug!(
            correlation_id = %self.params.correlation_id,
            from = ?self.state,
            to = ?next,
            "request state transition"
        );
        self.state = next;
    }

    /// Run the request to completion and emit one telemetry event.
    pub async fn run(&mut self, cancel: &CancellationToken) -> Result<AuthenticationResult> {
        let started = Instant::now();
        let outcome = self.execute(cancel).await;

        let final_state = if outcome.is_ok() { RequestState::Done } else { RequestState::Failed };
        self.transition(final_state);

        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let flow = self.flow.kind().to_string();
        let correlation_id = self.params.correlation_id.to_string();
        match &outcome {
            Ok(result) => info!(
                target: TELEMETRY_TARGET,
                flow = %flow,
                outcome = "success",
                source = ?result.source,
                duration_ms = elapsed_ms,
                correlation_id = %correlation_id,
                "token request completed"
            ),
            Err(error) => info!(
                target: TELEMETRY_TARGET,
                flow = %flow,
                outcome = "failure",
                error_code = error.code(),
                duration_ms = elapsed_ms,
                correlation_id = %correlation_id,
                "token request completed"
            ),
        }
        outcome
    }

    async fn execute(&mut self, cancel: &CancellationToken) -> Result<AuthenticationResult> {
        self.params.validate(self.flow.requires_redirect_uri())?;
        self.flow.check_preconditions(&self.params)?;

        let context = Arc::clone(&self.context);
        let login_hint = self
            .params
            .login_hint
            .clone()
            .or_else(|| self.params.account.as_ref().and_then(|a| a.username.clone()));
        let endpoints = with_cancellation(
            cancel,
            "authority_resolution",
            context.resolve_endpoints(&self.params.authority, login_hint.as_deref()),
        )
        .await?;
        self.transition(RequestState::AuthorityResolved);

        let cache = context.cache().cloned();
        let _flight = match (&cache, self.flow.reads_cache()) {
            (Some(cache), true) => {
                let key = self.params.cache_query().flight_key(context.client_id());
                let guard = with_cancellation(cancel, "cache_flight", async {
                    Ok(cache.lock_flight(&key).await)
                })
                .await?;
                Some(guard)
            }
            _ => None,
        };

        let read_access_token = self.should_read_cache();
        let check_cache = read_access_token || self.flow.redeems_refresh_token();
        if let Some(cache) = cache.as_ref().filter(|_| check_cache) {
            if cancel.is_cancelled() {
                return Err(AuthError::cancelled("cache_lookup"));
            }
            let lookup = cache.lookup(&self.params.cache_query(), read_access_token).await?;
            if let Some(item) = lookup.access_token {
                let buffer = Duration::seconds(cache.options().expiration_buffer_seconds);
                let result = result::from_cache(
                    &self.params,
                    &item,
                    lookup.id_token.as_ref(),
                    context.clock.now(),
                    buffer,
                );
                self.transition(RequestState::CacheChecked { hit: true });
                return Ok(result);
            }
            self.flow.use_cached_refresh_token(lookup.refresh_token);
        }
        self.transition(RequestState::CacheChecked { hit: false });

        let flow_context = FlowContext {
            context: &context,
            params: &self.params,
            endpoints: &endpoints,
            cancel,
        };
        self.flow.pre_token_request(&flow_context).await?;
        self.transition(RequestState::AuthorizationObtained);

        let flow_context = FlowContext {
            context: &context,
            params: &self.params,
            endpoints: &endpoints,
            cancel,
        };
        let form = self.build_form(&endpoints)?;
        let mut response = self
            .flow
            .exchange(&flow_context, &form)
            .await
            .map_err(|e| self.flow.map_exchange_error(e))?;
        self.transition(RequestState::TokenExchanged);

        self.flow.validate_result(&mut response)?;
        let validated = result::validate_response(&mut self.params, &response, context.clock.now())?;
        let saved = self.persist(&response, &validated, cancel).await?;
        self.transition(RequestState::ResultPersisted);

        Ok(result::from_response(&self.params, &response, &validated, saved))
    }

    fn should_read_cache(&self) -> bool {
        self.flow.reads_cache() && !self.params.flags.force_refresh && self.params.flags.load_from_cache
    }

    /// Base body, grant parameters and client authentication.
    fn build_form(&self, endpoints: &AuthorityEndpoints) -> Result<BTreeMap<String, String>> {
        let params = &self.params;
        let mut form = BTreeMap::new();
        form.insert(param::CLIENT_ID.to_string(), params.client_id.clone());
        if !self.flow.is_client_credential() {
            form.insert(param::CLIENT_INFO.to_string(), "1".to_string());
        }
        form.insert(
            param::SCOPE.to_string(),
            self.flow.decorate_scope(&params.scopes, &params.client_id).as_single_string(),
        );
        form.extend(self.flow.build_body_parameters(params)?);

        if let Some(credential) = &params.client_credential {
            let auth = credential.authentication_parameters(
                &params.client_id,
                &endpoints.self_signed_jwt_audience,
                self.context.clock.now(),
            )?;
            form.extend(auth.into_iter().map(|(k, v)| (k.to_string(), v)));
        }
        Ok(form)
    }

    async fn persist(
        &self,
        response: &TokenResponse,
        validated: &ValidatedResponse,
        cancel: &CancellationToken,
    ) -> Result<Option<SavedTokens>> {
        let Some(cache) = self.context.cache() else {
            return Ok(None);
        };
        if !self.params.flags.store_to_cache {
            return Ok(None);
        }
        if cancel.is_cancelled() {
            return Err(AuthError::cancelled("cache_write"));
        }

        let write = TokenWrite {
            authority: self.params.tenant_updated_authority(),
            scopes: validated.scopes.clone(),
            response,
            id_token: validated.id_token.as_ref(),
            client_info: validated.client_info.as_ref(),
            user_assertion_hash: self.params.user_assertion.as_ref().map(|a| a.hash()),
            is_client_credential: self.params.flags.is_client_credential,
        };
        match cache.save_token_response(&write).await {
            Ok(saved) => {
                debug!(
                    account = %self.context.redactor().redact_opt(
                        saved.account.as_ref().map(|a| a.home_account_id.as_str())
                    ),
                    "token response cached"
                );
                Ok(Some(saved))
            }
            Err(e) => {
                warn!(error = %e, "failed to cache token response");
                Err(e)
            }
        }
    }
}
