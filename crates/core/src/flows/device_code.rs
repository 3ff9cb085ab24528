use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokenflow_domain::constants::{grant_type, oauth_error, param};
use tokenflow_domain::{AuthError, DeviceCodeResult, Result, TokenResponse};
use tracing::{debug, info};

use super::FlowContext;
use crate::request::with_cancellation;

/// Extra wait added to the interval on every `slow_down` answer.
pub const SLOW_DOWN_STEP: Duration = Duration::from_secs(5);

/// Receives the sign-in instructions once the device code is issued.
pub type DeviceCodeCallback = Arc<dyn Fn(&DeviceCodeResult) + Send + Sync>;

/// Device authorization grant for hosts without a browser.
///
/// The user signs in on a second device with the code handed to the
/// callback while the token endpoint is polled.
#[derive(Clone)]
pub struct DeviceCodeFlow {
    callback: DeviceCodeCallback,
    issued: Option<DeviceCodeResult>,
}

impl fmt::Debug for DeviceCodeFlow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceCodeFlow")
            .field("user_code", &self.issued.as_ref().map(|issued| issued.user_code.as_str()))
            .finish_non_exhaustive()
    }
}

impl DeviceCodeFlow {
    pub fn new(callback: impl Fn(&DeviceCodeResult) + Send + Sync + 'static) -> Self {
        Self { callback: Arc::new(callback), issued: None }
    }

    pub fn issued(&self) -> Option<&DeviceCodeResult> {
        self.issued.as_ref()
    }

    pub(crate) async fn pre_token_request(&mut self, ctx: &FlowContext<'_>) -> Result<()> {
        let client = ctx
            .context
            .device_authorization
            .clone()
            .ok_or(AuthError::MissingArgument("device_authorization"))?;
        let params = ctx.params;
        let scopes = params.scopes.decorate(&params.client_id, false);

        let mut form = BTreeMap::new();
        form.insert(param::CLIENT_ID.to_string(), params.client_id.clone());
        form.insert(param::SCOPE.to_string(), scopes.as_single_string());
        form.extend(params.extra_query_parameters.clone());

        let response = with_cancellation(
            ctx.cancel,
            "device_code_request",
            client.request_device_code(&ctx.endpoints.device_code_endpoint(), &form),
        )
        .await?;
        let issued = DeviceCodeResult::from_response(
            response,
            params.client_id.clone(),
            scopes,
            ctx.context.clock.now(),
        )?;
        debug!(
            expires_on = %issued.expires_on,
            interval_secs = issued.interval.as_secs(),
            "device code issued"
        );

        (self.callback)(&issued);
        self.issued = Some(issued);
        Ok(())
    }

    pub(crate) fn body_parameters(&self) -> Result<BTreeMap<String, String>> {
        let issued = self.issued.as_ref().ok_or(AuthError::MissingArgument("device_code"))?;
        let mut body = BTreeMap::new();
        body.insert(param::GRANT_TYPE.to_string(), grant_type::DEVICE_CODE.to_string());
        body.insert(param::DEVICE_CODE.to_string(), issued.device_code.expose().to_string());
        Ok(body)
    }

    /// Redeem the device code, waiting between attempts until the user has
    /// signed in, the code lapses, or `ctx.cancel` fires.
    pub(crate) async fn poll(
        &self,
        ctx: &FlowContext<'_>,
        form: &BTreeMap<String, String>,
    ) -> Result<TokenResponse> {
        let issued = self.issued.as_ref().ok_or(AuthError::MissingArgument("device_code"))?;
        let mut interval = issued.interval;

        loop {
            let outcome = with_cancellation(
                ctx.cancel,
                "token_exchange",
                ctx.context.token_endpoint.exchange(&ctx.endpoints.token_endpoint, form),
            )
            .await;
            let error = match outcome {
                Ok(response) => return Ok(response),
                Err(error) => error,
            };
            let code = error.code();
            if code == oauth_error::EXPIRED_TOKEN {
                return Err(code_expired());
            }
            if code != oauth_error::AUTHORIZATION_PENDING && code != oauth_error::SLOW_DOWN {
                return Err(error);
            }
            interval = next_interval(interval, code);
            info!(error = code, interval_secs = interval.as_secs(), "waiting for the user to sign in");

            if ctx.context.clock.now() >= issued.expires_on {
                return Err(code_expired());
            }
            with_cancellation(ctx.cancel, "device_code_polling", async {
                tokio::time::sleep(interval).await;
                Ok(())
            })
            .await?;
        }
    }
}

/// Interval after a polling answer of `code`.
fn next_interval(current: Duration, code: &str) -> Duration {
    if code == oauth_error::SLOW_DOWN {
        current.saturating_add(SLOW_DOWN_STEP)
    } else {
        current
    }
}

fn code_expired() -> AuthError {
    AuthError::service(oauth_error::CODE_EXPIRED, "device code expired before the user signed in")
}

#[cfg(test)]
mod tests {
    use tokenflow_domain::{DeviceCodeResponse, ScopeSet, Secret};

    use super::*;

    #[test]
    fn slow_down_lengthens_the_interval() {
        let one = Duration::from_secs(1);
        assert_eq!(next_interval(one, oauth_error::SLOW_DOWN), Duration::from_secs(6));
        assert_eq!(next_interval(one, oauth_error::AUTHORIZATION_PENDING), one);
    }

    #[test]
    fn body_needs_an_issued_code() {
        let mut flow = DeviceCodeFlow::new(|_| {});
        assert_eq!(flow.body_parameters().unwrap_err(), AuthError::MissingArgument("device_code"));

        let response = DeviceCodeResponse {
            user_code: "U".into(),
            device_code: Secret::new("dc-1"),
            verification_uri: "https://microsoft.com/devicelogin".into(),
            expires_in: 900,
            interval: 1,
            message: None,
        };
        flow.issued = Some(
            DeviceCodeResult::from_response(response, "cid", ScopeSet::new(), chrono::Utc::now()).unwrap(),
        );
        let body = flow.body_parameters().unwrap();
        assert_eq!(body["grant_type"], "urn:ietf:params:oauth:grant-type:device_code");
        assert_eq!(body["device_code"], "dc-1");
        assert!(format!("{flow:?}").contains("\"U\""));
    }
}
