//! Public entry point for token acquisition

use std::sync::Arc;

use tokenflow_common::CommonError;
use tokenflow_domain::{
    Account, AuthenticationResult, AuthorityInfo, ClientConfig, DeviceCodeResult, Result,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};
use url::Url;

use crate::credential::{ClientCredential, UserAssertion};
use crate::flows::{
    AuthorizationCodeFlow, ClientCredentialsFlow, DeviceCodeFlow, FederatedFlow, GrantFlow,
    InteractiveFlow, OnBehalfOfFlow, SilentFlow,
};
use crate::request::{ClientContext, RequestFlags, RequestOrchestrator, RequestParameters};

/// Token acquisition for one client application.
///
/// Each `acquire_*` method builds the request parameters from the client
/// configuration and runs a [`RequestOrchestrator`] with the matching flow.
#[derive(Debug, Clone)]
pub struct TokenClient {
    config: ClientConfig,
    authority: AuthorityInfo,
    redirect_uri: Option<Url>,
    context: Arc<ClientContext>,
    credential: Option<Arc<ClientCredential>>,
}

impl TokenClient {
    /// # Errors
    /// Configuration validation failures, or a context built for another
    /// client id.
    pub fn new(config: ClientConfig, context: ClientContext) -> Result<Self> {
        config.validate()?;
        if !context.client_id().eq_ignore_ascii_case(&config.client_id) {
            return Err(CommonError::config_field(
                "client_id",
                "client context was built for a different client id",
            )
            .into());
        }

        let authority = config.authority_info()?;
        let redirect_uri = config
            .redirect_uri
            .as_deref()
            .map(Url::parse)
            .transpose()
            .map_err(|e| CommonError::config_field("redirect_uri", e.to_string()))?;

        info!(
            client_id = %config.client_id,
            authority = authority.canonical(),
            "token client created"
        );
        Ok(Self { config, authority, redirect_uri, context: Arc::new(context), credential: None })
    }

    /// Make this a confidential client.
    #[must_use]
    pub fn with_client_credential(mut self, credential: ClientCredential) -> Self {
        self.credential = Some(Arc::new(credential));
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn context(&self) -> &Arc<ClientContext> {
        &self.context
    }

    /// Parameters pre-filled from the configuration.
    pub fn request<I, S>(&self, scopes: I) -> RequestParameters
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut params = RequestParameters::new(self.authority.clone(), &self.config.client_id, scopes);
        params.redirect_uri = self.redirect_uri.clone();
        params.client_credential = self.credential.clone();
        params.flags = RequestFlags::default();
        params
    }

    /// Run a flow with caller-built parameters.
    pub async fn execute(
        &self,
        params: RequestParameters,
        flow: GrantFlow,
        cancel: &CancellationToken,
    ) -> Result<AuthenticationResult> {
        RequestOrchestrator::new(Arc::clone(&self.context), params, flow).run(cancel).await
    }

    /// Cached token for `account`, refreshed with its refresh token when
    /// needed.
    ///
    /// # Errors
    /// `NoTokensFound` or `InteractionRequired` when only an interactive
    /// request can recover.
    #[instrument(skip_all, fields(flow = "silent"))]
    pub async fn acquire_token_silent<I, S>(
        &self,
        scopes: I,
        account: &Account,
        force_refresh: bool,
        cancel: &CancellationToken,
    ) -> Result<AuthenticationResult>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut params = self.request(scopes).with_account(account.clone());
        params.flags.force_refresh = force_refresh;
        self.execute(params, GrantFlow::Silent(SilentFlow::new()), cancel).await
    }

    #[instrument(skip_all, fields(flow = "interactive"))]
    pub async fn acquire_token_interactive<I, S>(
        &self,
        scopes: I,
        login_hint: Option<&str>,
        prompt: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<AuthenticationResult>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut params = self.request(scopes);
        params.login_hint = login_hint.map(str::to_string);
        let mut flow = InteractiveFlow::new();
        if let Some(prompt) = prompt {
            flow = flow.with_prompt(prompt);
        }
        self.execute(params, GrantFlow::Interactive(flow), cancel).await
    }

    #[instrument(skip_all, fields(flow = "authorization_code"))]
    pub async fn acquire_token_by_authorization_code<I, S>(
        &self,
        scopes: I,
        code: &str,
        code_verifier: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<AuthenticationResult>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut flow = AuthorizationCodeFlow::new(code);
        if let Some(verifier) = code_verifier {
            flow = flow.with_code_verifier(verifier);
        }
        self.execute(self.request(scopes), GrantFlow::AuthorizationCode(flow), cancel).await
    }

    /// App-only token; requires a client credential.
    #[instrument(skip_all, fields(flow = "client_credentials"))]
    pub async fn acquire_token_for_client<I, S>(
        &self,
        scopes: I,
        cancel: &CancellationToken,
    ) -> Result<AuthenticationResult>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.execute(self.request(scopes), GrantFlow::ClientCredentials(ClientCredentialsFlow), cancel)
            .await
    }

    #[instrument(skip_all, fields(flow = "on_behalf_of"))]
    pub async fn acquire_token_on_behalf_of<I, S>(
        &self,
        scopes: I,
        assertion: UserAssertion,
        cancel: &CancellationToken,
    ) -> Result<AuthenticationResult>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let params = self.request(scopes).with_user_assertion(assertion);
        self.execute(params, GrantFlow::OnBehalfOf(OnBehalfOfFlow), cancel).await
    }

    /// Non-interactive sign-in for federated or managed users.
    #[instrument(skip_all, fields(flow = "federated"))]
    pub async fn acquire_token_by_username_password<I, S>(
        &self,
        scopes: I,
        username: &str,
        password: &str,
        cancel: &CancellationToken,
    ) -> Result<AuthenticationResult>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let params = self.request(scopes).with_login_hint(username);
        self.execute(params, GrantFlow::Federated(FederatedFlow::new(username, password)), cancel)
            .await
    }

    /// Sign in on another device. `on_code` receives the code and the
    /// instructions to show the user; the token endpoint is then polled
    /// until they finish, the code expires or `cancel` fires.
    #[instrument(skip_all, fields(flow = "device_code"))]
    pub async fn acquire_token_with_device_code<I, S, F>(
        &self,
        scopes: I,
        on_code: F,
        cancel: &CancellationToken,
    ) -> Result<AuthenticationResult>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        F: Fn(&DeviceCodeResult) + Send + Sync + 'static,
    {
        self.execute(self.request(scopes), GrantFlow::DeviceCode(DeviceCodeFlow::new(on_code)), cancel)
            .await
    }

    /// Accounts with cached refresh tokens.
    pub async fn get_accounts(&self) -> Result<Vec<Account>> {
        match self.context.cache() {
            Some(cache) => cache.get_accounts().await,
            None => Ok(Vec::new()),
        }
    }

    /// Forget `account`; without a cache there is nothing to forget.
    pub async fn remove_account(&self, account: &Account) -> Result<()> {
        if let Some(cache) = self.context.cache() {
            cache.remove_account(account).await?;
        }
        Ok(())
    }
}
