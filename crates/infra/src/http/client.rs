//! Retrying HTTP transport shared by the discovery and token adapters
//!
//! Throttling (429) and server failures (5xx) are retried, waiting for the
//! `Retry-After` delay when the server sends one and for an exponential
//! backoff otherwise. Every wait is raced against the client's shutdown
//! token.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client as ReqwestClient, Method, RequestBuilder, Response, StatusCode};
use tokenflow_common::CommonError;
use tokenflow_domain::{AuthError, HttpOptions};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::errors::InfraError;

const USER_AGENT: &str = concat!("tokenflow/", env!("CARGO_PKG_VERSION"));

/// Longest server-requested wait; beyond it the response is returned as-is.
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct HttpClient {
    client: ReqwestClient,
    max_attempts: usize,
    base_backoff: Duration,
    shutdown: CancellationToken,
}

impl HttpClient {
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    pub fn new() -> Result<Self, AuthError> {
        Self::builder().build()
    }

    pub fn request<U: reqwest::IntoUrl>(&self, method: Method, url: U) -> RequestBuilder {
        self.client.request(method, url)
    }

    /// Send `builder`, retrying throttled and failed attempts.
    ///
    /// The final response is returned whatever its status; only transport
    /// failures and shutdown surface as errors.
    pub async fn send(&self, builder: RequestBuilder) -> Result<Response, AuthError> {
        let mut attempt = 1;
        loop {
            let request = builder
                .try_clone()
                .ok_or_else(|| CommonError::internal("streaming request bodies cannot be retried"))?
                .build()
                .map_err(|err| AuthError::from(InfraError::from(err)))?;
            let method = request.method().clone();
            let url = request.url().clone();
            let last_attempt = attempt >= self.max_attempts;
            debug!(attempt, %method, %url, "sending HTTP request");

            let delay = match self.client.execute(request).await {
                Ok(response) => {
                    let status = response.status();
                    debug!(attempt, %method, %url, status = status.as_u16(), "received HTTP response");
                    if last_attempt || !is_retryable_status(status) {
                        return Ok(response);
                    }
                    match retry_after(response.headers(), Utc::now()) {
                        Some(delay) if delay > MAX_RETRY_AFTER => {
                            warn!(
                                %url,
                                retry_after_secs = delay.as_secs(),
                                "retry delay too long; returning throttled response"
                            );
                            return Ok(response);
                        }
                        Some(delay) => delay,
                        None => self.backoff_delay(attempt),
                    }
                }
                Err(err) => {
                    debug!(attempt, %method, %url, error = %err, "HTTP request failed");
                    if last_attempt || !is_retryable_error(&err) {
                        return Err(InfraError::from(err).into());
                    }
                    self.backoff_delay(attempt)
                }
            };

            self.pause(delay).await?;
            attempt += 1;
        }
    }

    /// Backoff before retry number `attempt`, doubling from the base.
    fn backoff_delay(&self, attempt: usize) -> Duration {
        let exponent = u32::try_from(attempt.saturating_sub(1).min(8)).unwrap_or(8);
        self.base_backoff.saturating_mul(1 << exponent)
    }

    async fn pause(&self, delay: Duration) -> Result<(), AuthError> {
        tokio::select! {
            biased;
            () = self.shutdown.cancelled() => Err(AuthError::cancelled("http_retry")),
            () = tokio::time::sleep(delay) => Ok(()),
        }
    }
}

#[derive(Debug)]
pub struct HttpClientBuilder {
    timeout: Duration,
    max_attempts: usize,
    base_backoff: Duration,
    user_agent: Option<String>,
    shutdown: Option<CancellationToken>,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        let defaults = HttpOptions::default();
        Self {
            timeout: Duration::from_secs(defaults.timeout_seconds),
            max_attempts: defaults.max_attempts,
            base_backoff: Duration::from_millis(defaults.base_backoff_millis),
            user_agent: None,
            shutdown: None,
        }
    }
}

impl HttpClientBuilder {
    /// Apply the `http` section of a [`tokenflow_domain::ClientConfig`].
    pub fn options(self, options: &HttpOptions) -> Self {
        self.timeout(Duration::from_secs(options.timeout_seconds))
            .max_attempts(options.max_attempts)
            .base_backoff(Duration::from_millis(options.base_backoff_millis))
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Total attempts, the first one included.
    pub fn max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn base_backoff(mut self, backoff: Duration) -> Self {
        self.base_backoff = backoff;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Abort pending retry waits once `token` is cancelled.
    pub fn shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = Some(token);
        self
    }

    pub fn build(self) -> Result<HttpClient, AuthError> {
        let client = ReqwestClient::builder()
            .timeout(self.timeout)
            .no_proxy()
            .user_agent(self.user_agent.unwrap_or_else(|| USER_AGENT.to_string()))
            .build()
            .map_err(|err| AuthError::from(InfraError::from(err)))?;

        Ok(HttpClient {
            client,
            max_attempts: self.max_attempts.max(1),
            base_backoff: self.base_backoff,
            shutdown: self.shutdown.unwrap_or_default(),
        })
    }
}

fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

/// Delay requested by a `Retry-After` header, in delta-seconds or HTTP-date
/// form. Dates in the past mean no wait.
fn retry_after(headers: &HeaderMap, now: DateTime<Utc>) -> Option<Duration> {
    let value = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }
    let at = DateTime::parse_from_rfc2822(value).ok()?.with_timezone(&Utc);
    Some((at - now).to_std().unwrap_or(Duration::ZERO))
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use chrono::TimeZone;
    use reqwest::header::HeaderValue;
    use wiremock::matchers::{header_exists, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn fast_client() -> HttpClient {
        HttpClient::builder()
            .base_backoff(Duration::from_millis(10))
            .max_attempts(3)
            .build()
            .expect("http client")
    }

    /// Responds with `first` for the first `failures` calls, then 200.
    fn flaky(
        failures: usize,
        first: ResponseTemplate,
    ) -> impl Fn(&wiremock::Request) -> ResponseTemplate + Send + Sync + 'static {
        let calls = Arc::new(AtomicUsize::new(0));
        move |_req: &wiremock::Request| {
            if calls.fetch_add(1, Ordering::SeqCst) < failures {
                first.clone()
            } else {
                ResponseTemplate::new(200)
            }
        }
    }

    #[tokio::test]
    async fn success_is_sent_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header_exists("user-agent"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let client = fast_client();
        let response = client.send(client.request(Method::GET, server.uri())).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn server_errors_are_retried_until_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(flaky(2, ResponseTemplate::new(503)))
            .expect(3)
            .mount(&server)
            .await;

        let client = fast_client();
        let builder = client.request(Method::POST, server.uri()).form(&[("grant_type", "x")]);
        let response = client.send(builder).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn throttling_waits_for_retry_after_instead_of_backoff() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(flaky(1, ResponseTemplate::new(429).insert_header("Retry-After", "0")))
            .expect(2)
            .mount(&server)
            .await;

        // A backoff this long would time the test out.
        let client = HttpClient::builder()
            .base_backoff(Duration::from_secs(600))
            .max_attempts(2)
            .build()
            .unwrap();
        let started = std::time::Instant::now();
        let response = client.send(client.request(Method::POST, server.uri())).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn long_retry_after_returns_the_throttled_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "3600"))
            .expect(1)
            .mount(&server)
            .await;

        let client = fast_client();
        let response = client.send(client.request(Method::GET, server.uri())).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(400))
            .expect(1)
            .mount(&server)
            .await;

        let client = fast_client();
        let response = client.send(client.request(Method::GET, server.uri())).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn shutdown_interrupts_backoff() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let shutdown = CancellationToken::new();
        let client = HttpClient::builder()
            .base_backoff(Duration::from_secs(600))
            .max_attempts(3)
            .shutdown(shutdown.clone())
            .build()
            .unwrap();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            shutdown.cancel();
        });

        let err = client.send(client.request(Method::POST, server.uri())).await.unwrap_err();
        assert_eq!(err, AuthError::cancelled("http_retry"));
    }

    #[tokio::test]
    async fn refused_connections_surface_as_network_errors() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = HttpClient::builder()
            .base_backoff(Duration::from_millis(5))
            .max_attempts(2)
            .build()
            .unwrap();
        let err = client.send(client.request(Method::GET, format!("http://{addr}"))).await.unwrap_err();
        assert!(matches!(err, AuthError::Network(_)), "got {err:?}");
    }

    #[test]
    fn retry_after_accepts_seconds_and_dates() {
        let now = Utc.with_ymd_and_hms(2015, 10, 21, 7, 27, 30).unwrap();
        let mut headers = HeaderMap::new();
        assert_eq!(retry_after(&headers, now), None);

        headers.insert(RETRY_AFTER, HeaderValue::from_static("120"));
        assert_eq!(retry_after(&headers, now), Some(Duration::from_secs(120)));

        headers.insert(RETRY_AFTER, HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"));
        assert_eq!(retry_after(&headers, now), Some(Duration::from_secs(30)));

        headers.insert(RETRY_AFTER, HeaderValue::from_static("Wed, 21 Oct 2015 07:00:00 GMT"));
        assert_eq!(retry_after(&headers, now), Some(Duration::ZERO));

        headers.insert(RETRY_AFTER, HeaderValue::from_static("soon"));
        assert_eq!(retry_after(&headers, now), None);
    }

    #[test]
    fn backoff_doubles_per_retry() {
        let client = HttpClient::builder()
            .options(&HttpOptions { timeout_seconds: 5, max_attempts: 4, base_backoff_millis: 100 })
            .build()
            .unwrap();

        assert_eq!(client.backoff_delay(1), Duration::from_millis(100));
        assert_eq!(client.backoff_delay(2), Duration::from_millis(200));
        assert_eq!(client.backoff_delay(3), Duration::from_millis(400));
    }
}
