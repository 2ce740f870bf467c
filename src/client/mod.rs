//! Resilient client for the Front REST API.
//!
//! Every call runs through an explicit tower pipeline:
//!
//! ```text
//! RateLimitLayer -> RequestLogLayer -> TimeoutLayer -> HttpTransport
//! ```
//!
//! Logged latency covers the upstream call only, not the pacing delay. The
//! retry engine wraps the whole pipeline plus the body read, so each retry
//! re-enters the rate-limit pacing, and cacheable reads wrap the retried
//! call behind a [`ResponseCache`] lookup.

mod config;
mod logging;
mod models;
mod resources;
mod transport;

pub use config::{ClientConfig, ClientConfigBuilder};
pub use logging::{RequestLogLayer, RequestLogService};
pub use models::*;
pub use transport::{HttpTransport, TimeoutLayer, TimeoutService};

use crate::cache::{CacheKey, ResponseCache};
use crate::config::Config;
use crate::error::{BridgeError, Result};
use crate::ratelimit::{RateLimitConfig, RateLimitGovernor, RateLimitLayer, RateLimitService};
use crate::retry::RetryPolicy;
use reqwest::header::{ACCEPT, HeaderMap, RETRY_AFTER};
use reqwest::Method;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tower::{ServiceBuilder, ServiceExt};
use url::Url;

type Pipeline = RateLimitService<RequestLogService<TimeoutService<HttpTransport>>>;

/// Longest upstream error body echoed into an error message
const MAX_ERROR_BODY: usize = 512;

/// Handle to the Front API, cheap to clone and share across tasks
#[derive(Clone)]
pub struct FrontClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http: reqwest::Client,
    pipeline: Pipeline,
    base_url: Url,
    api_token: SecretString,
    retry: RetryPolicy,
    cache: ResponseCache,
    governor: Arc<RateLimitGovernor>,
}

impl std::fmt::Debug for FrontClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrontClient")
            .field("base_url", &self.inner.base_url.as_str())
            .field("retry", &self.inner.retry)
            .finish_non_exhaustive()
    }
}

impl FrontClient {
    pub fn builder(config: ClientConfig) -> FrontClientBuilder {
        FrontClientBuilder::new(config)
    }

    /// Client with default retry, pacing and caching
    pub fn new(config: ClientConfig) -> Result<Self> {
        Self::builder(config).build()
    }

    /// Client wired with the configured retry, pacing and cache settings
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::builder(config.client.clone())
            .retry_policy(RetryPolicy::from_config(&config.retry))
            .rate_limit(&config.rate_limit)
            .cache(ResponseCache::from_config(&config.cache))
            .build()
    }

    pub fn governor(&self) -> &Arc<RateLimitGovernor> {
        &self.inner.governor
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.inner.cache
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.inner.retry
    }

    /// URL for a path under the API root, percent-encoding each segment
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.inner.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| BridgeError::config("API base URL cannot carry a path"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Issue one request through the pipeline, retrying transient failures
    ///
    /// Returns the full response body; a body that fails or stalls midway
    /// counts as a failed attempt.
    async fn send(&self, method: Method, url: Url, body: Option<Value>) -> Result<Vec<u8>> {
        let operation = format!("{} {}", method, url.path());

        self.inner
            .retry
            .execute(&operation, || self.attempt(method.clone(), url.clone(), body.as_ref()))
            .await
            .map_err(BridgeError::from)
    }

    async fn attempt(&self, method: Method, url: Url, body: Option<&Value>) -> Result<Vec<u8>> {
        let mut builder = self
            .inner
            .http
            .request(method, url)
            .bearer_auth(self.inner.api_token.expose_secret())
            .header(ACCEPT, "application/json");
        if let Some(body) = body {
            builder = builder.json(body);
        }
        let request = builder.build()?;

        let response = self.inner.pipeline.clone().oneshot(request).await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response.bytes().await?.to_vec());
        }

        let retry_after = parse_retry_after(response.headers());
        let text = response.text().await.unwrap_or_default();
        Err(BridgeError::from_status(
            status.as_u16(),
            upstream_error_message(&text),
            retry_after,
        ))
    }

    async fn request_json<T, B>(&self, method: Method, url: Url, body: Option<&B>) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let body = body.map(serde_json::to_value).transpose()?;
        let bytes = self.send(method, url, body).await?;

        serde_json::from_slice(&bytes)
            .map_err(|e| BridgeError::internal(format!("Unexpected response body: {}", e)))
    }

    /// Request whose response body is ignored (typically `204 No Content`)
    async fn request_empty<B>(&self, method: Method, url: Url, body: Option<&B>) -> Result<()>
    where
        B: Serialize + ?Sized,
    {
        let body = body.map(serde_json::to_value).transpose()?;
        self.send(method, url, body).await?;
        Ok(())
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(&self, segments: &[&str], query: &ListQuery) -> Result<T> {
        let mut url = self.endpoint(segments)?;
        let pairs = query.pairs();
        if !pairs.is_empty() {
            url.query_pairs_mut().extend_pairs(pairs);
        }
        self.request_json::<T, Value>(Method::GET, url, None).await
    }

    /// GET behind the response cache
    pub(crate) async fn cached_get<T>(&self, key: CacheKey, segments: &[&str]) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
    {
        let query = ListQuery::default();
        self.inner
            .cache
            .get_or_fetch(key, || self.get_json(segments, &query))
            .await
    }

    /// Cache unparameterized list reads; anything with a query goes straight through
    pub(crate) async fn list_maybe_cached<T>(
        &self,
        key: CacheKey,
        segments: &[&str],
        query: &ListQuery,
    ) -> Result<Page<T>>
    where
        T: Serialize + DeserializeOwned,
    {
        if query.is_empty() {
            self.cached_get(key, segments).await
        } else {
            self.get_json(segments, query).await
        }
    }

    pub(crate) async fn post_json<T, B>(&self, segments: &[&str], body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = self.endpoint(segments)?;
        self.request_json(Method::POST, url, Some(body)).await
    }

    pub(crate) async fn post_empty<B: Serialize + ?Sized>(&self, segments: &[&str], body: &B) -> Result<()> {
        let url = self.endpoint(segments)?;
        self.request_empty(Method::POST, url, Some(body)).await
    }

    pub(crate) async fn patch_empty<B: Serialize + ?Sized>(&self, segments: &[&str], body: &B) -> Result<()> {
        let url = self.endpoint(segments)?;
        self.request_empty(Method::PATCH, url, Some(body)).await
    }

    pub(crate) async fn delete_empty<B: Serialize + ?Sized>(&self, segments: &[&str], body: &B) -> Result<()> {
        let url = self.endpoint(segments)?;
        self.request_empty(Method::DELETE, url, Some(body)).await
    }

    /// Fetch the page that `next` (a `_pagination.next` URL) points to
    ///
    /// The URL must share the API's origin; the bearer token is never sent
    /// anywhere else.
    pub async fn next_page<T: DeserializeOwned>(&self, next: &str) -> Result<Page<T>> {
        let url = Url::parse(next)
            .map_err(|e| BridgeError::validation(format!("Invalid pagination URL: {}", e)))?;
        if url.origin() != self.inner.base_url.origin() {
            return Err(BridgeError::validation(
                "Pagination URL does not belong to the API host",
            ));
        }
        self.request_json::<Page<T>, Value>(Method::GET, url, None).await
    }
}

/// Builder for [`FrontClient`]
#[must_use = "builder does nothing until you call build()"]
pub struct FrontClientBuilder {
    config: ClientConfig,
    retry: RetryPolicy,
    governor: Option<Arc<RateLimitGovernor>>,
    cache: Option<ResponseCache>,
}

impl FrontClientBuilder {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            retry: RetryPolicy::default(),
            governor: None,
            cache: None,
        }
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    pub fn rate_limit(mut self, config: &RateLimitConfig) -> Self {
        self.governor = Some(Arc::new(RateLimitGovernor::new(config)));
        self
    }

    /// Share an existing governor, e.g. between several clients
    pub fn governor(mut self, governor: Arc<RateLimitGovernor>) -> Self {
        self.governor = Some(governor);
        self
    }

    pub fn cache(mut self, cache: ResponseCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn build(self) -> Result<FrontClient> {
        let mut base_url = Url::parse(&self.config.base_url).map_err(|e| {
            BridgeError::config(format!("Invalid API base URL '{}': {}", self.config.base_url, e))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(BridgeError::config("API base URL must be hierarchical"));
        }
        base_url.set_query(None);

        // The layer bounds the wait for headers; this bounds the body as well
        let http = reqwest::Client::builder()
            .user_agent(self.config.user_agent.as_str())
            .timeout(self.config.timeout())
            .build()
            .map_err(|e| BridgeError::config(format!("Failed to build HTTP client: {}", e)))?;

        let governor = self.governor.unwrap_or_default();
        let pipeline = outbound_stack(
            governor.clone(),
            self.config.timeout(),
            HttpTransport::new(http.clone()),
        );

        Ok(FrontClient {
            inner: Arc::new(ClientInner {
                http,
                pipeline,
                base_url,
                api_token: self.config.api_token,
                retry: self.retry,
                cache: self.cache.unwrap_or_default(),
                governor,
            }),
        })
    }
}

/// Layer order of the outbound pipeline around `transport`
pub(crate) fn outbound_stack<S>(
    governor: Arc<RateLimitGovernor>,
    timeout: Duration,
    transport: S,
) -> RateLimitService<RequestLogService<TimeoutService<S>>> {
    ServiceBuilder::new()
        .layer(RateLimitLayer::new(governor))
        .layer(RequestLogLayer)
        .layer(TimeoutLayer::new(timeout))
        .service(transport)
}

/// Seconds from a `retry-after` header; HTTP-date values are ignored
///
/// Values too large for a `Duration` are dropped; the retry policy caps
/// the rest at its maximum delay.
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let secs: f64 = headers.get(RETRY_AFTER)?.to_str().ok()?.trim().parse().ok()?;
    Duration::try_from_secs_f64(secs).ok()
}

/// Pull the human-readable message out of an `{"_error": {...}}` body
fn upstream_error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        let error = &value["_error"];
        if let Some(message) = error["message"].as_str().or_else(|| error["title"].as_str()) {
            return message.to_string();
        }
    }

    let mut message = body.trim().to_string();
    if message.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !message.is_char_boundary(cut) {
            cut -= 1;
        }
        message.truncate(cut);
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn client(base: &str) -> FrontClient {
        FrontClient::new(ClientConfig::builder().base_url(base).api_token("tok").build()).unwrap()
    }

    #[test]
    fn test_endpoint_encodes_segments() {
        let client = client("https://api2.frontapp.com");
        let url = client.endpoint(&["conversations", "cnv 1", "tags"]).unwrap();
        assert_eq!(url.as_str(), "https://api2.frontapp.com/conversations/cnv%201/tags");
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let client = client("http://localhost:8080/front/");
        let url = client.endpoint(&["tags"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/front/tags");
    }

    #[test]
    fn test_invalid_base_url_is_config_error() {
        let err = FrontClient::new(ClientConfig::builder().base_url("not a url").build()).unwrap_err();
        assert!(matches!(err, BridgeError::Config(_)));
    }

    #[test]
    fn test_parse_retry_after() {
        let mut headers = HeaderMap::new();
        assert_eq!(parse_retry_after(&headers), None);

        headers.insert(RETRY_AFTER, HeaderValue::from_static("7"));
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(7)));

        headers.insert(RETRY_AFTER, HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"));
        assert_eq!(parse_retry_after(&headers), None);
    }

    #[test]
    fn test_parse_retry_after_rejects_unrepresentable_values() {
        let mut headers = HeaderMap::new();
        for value in ["1e300", "-3", "inf", "NaN"] {
            headers.insert(RETRY_AFTER, HeaderValue::from_static(value));
            assert_eq!(parse_retry_after(&headers), None, "retry-after: {}", value);
        }

        headers.insert(RETRY_AFTER, HeaderValue::from_static("0.5"));
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_millis(500)));
    }

    #[test]
    fn test_upstream_error_message() {
        let body = r#"{"_error":{"status":404,"title":"Not found","message":"Unknown conversation"}}"#;
        assert_eq!(upstream_error_message(body), "Unknown conversation");
        assert_eq!(upstream_error_message("bad gateway"), "bad gateway");
        assert_eq!(upstream_error_message(&"x".repeat(2000)).len(), MAX_ERROR_BODY);
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<std::sync::Mutex<Vec<u8>>>);

    impl Captured {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    /// Answers every request with an empty JSON object, instantly
    #[derive(Clone)]
    struct Immediate;

    impl tower::Service<reqwest::Request> for Immediate {
        type Response = reqwest::Response;
        type Error = BridgeError;
        type Future = futures::future::BoxFuture<'static, Result<reqwest::Response>>;

        fn poll_ready(&mut self, _cx: &mut std::task::Context<'_>) -> std::task::Poll<Result<()>> {
            std::task::Poll::Ready(Ok(()))
        }

        fn call(&mut self, _req: reqwest::Request) -> Self::Future {
            Box::pin(async { Ok(reqwest::Response::from(axum::http::Response::new("{}"))) })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_logged_latency_excludes_pacing() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let governor = Arc::new(RateLimitGovernor::default());
        governor.record_limits(0, Duration::from_secs(10));
        let stack = outbound_stack(governor, Duration::from_secs(30), Immediate);

        let started = tokio::time::Instant::now();
        let request = reqwest::Request::new(Method::GET, "http://localhost/tags".parse().unwrap());
        let response = stack.oneshot(request).await.unwrap();

        assert!(response.status().is_success());
        assert!(started.elapsed() >= Duration::from_secs(10));

        let output = captured.text();
        assert!(output.contains("Outbound request completed"), "{}", output);
        assert!(output.contains("duration_ms=0"), "{}", output);
    }

    #[tokio::test]
    async fn test_next_page_rejects_foreign_host() {
        let client = client("https://api2.frontapp.com");
        let err = client
            .next_page::<Tag>("https://evil.example.com/tags?page_token=x")
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::Validation(_)));
    }
}
