//! Innermost services of the outbound pipeline

use crate::error::BridgeError;
use futures::future::BoxFuture;
use std::task::{Context, Poll};
use std::time::Duration;
use tower::{Layer, Service};

/// Sends requests with reqwest
///
/// Any HTTP status is a successful response at this level; status
/// classification happens in the client once the pipeline returns.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Service<reqwest::Request> for HttpTransport {
    type Response = reqwest::Response;
    type Error = BridgeError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: reqwest::Request) -> Self::Future {
        let client = self.client.clone();
        Box::pin(async move { client.execute(req).await.map_err(BridgeError::from) })
    }
}

/// Bounds each request with its own deadline
#[derive(Debug, Clone, Copy)]
pub struct TimeoutLayer {
    timeout: Duration,
}

impl TimeoutLayer {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl<S> Layer<S> for TimeoutLayer {
    type Service = TimeoutService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TimeoutService {
            inner,
            timeout: self.timeout,
        }
    }
}

/// Converts a request that outlives its deadline into a retryable
/// [`BridgeError::Network`]
#[derive(Debug, Clone)]
pub struct TimeoutService<S> {
    inner: S,
    timeout: Duration,
}

impl<S> Service<reqwest::Request> for TimeoutService<S>
where
    S: Service<reqwest::Request, Response = reqwest::Response, Error = BridgeError>,
    S::Future: Send + 'static,
{
    type Response = reqwest::Response;
    type Error = BridgeError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: reqwest::Request) -> Self::Future {
        let timeout = self.timeout;
        let fut = self.inner.call(req);

        Box::pin(async move {
            match tokio::time::timeout(timeout, fut).await {
                Ok(result) => result,
                Err(_) => Err(BridgeError::network(format!(
                    "Request timed out after {}ms",
                    timeout.as_millis()
                ))),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tower::ServiceExt;

    #[derive(Clone)]
    struct Hang;

    impl Service<reqwest::Request> for Hang {
        type Response = reqwest::Response;
        type Error = BridgeError;
        type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, _req: reqwest::Request) -> Self::Future {
            Box::pin(futures::future::pending())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_request_becomes_retryable_network_error() {
        let service = TimeoutLayer::new(Duration::from_secs(30)).layer(Hang);
        let req = reqwest::Request::new(
            reqwest::Method::GET,
            "http://localhost/tags".parse().unwrap(),
        );

        let err = service.oneshot(req).await.unwrap_err();
        assert!(matches!(err, BridgeError::Network(_)));
        assert!(err.is_retryable());
    }
}
