//! Request/response logging for the outbound pipeline

use crate::error::BridgeError;
use futures::future::BoxFuture;
use reqwest::StatusCode;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::time::Instant;
use tower::{Layer, Service};

/// Tower layer logging every outbound request with its outcome and latency
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestLogLayer;

impl<S> Layer<S> for RequestLogLayer {
    type Service = RequestLogService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestLogService { inner }
    }
}

#[derive(Debug, Clone)]
pub struct RequestLogService<S> {
    inner: S,
}

impl<S> Service<reqwest::Request> for RequestLogService<S>
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
        let start = Instant::now();
        let method = req.method().clone();
        // Path only: query strings may carry search terms
        let path = req.url().path().to_string();

        let fut = self.inner.call(req);

        Box::pin(async move {
            let result = fut.await;
            let duration = start.elapsed();

            match &result {
                Ok(response) => log_response(&method, &path, response.status(), duration),
                Err(e) => tracing::warn!(
                    method = %method,
                    path = %path,
                    duration_ms = duration.as_millis() as u64,
                    error = %e,
                    "Outbound request failed"
                ),
            }

            result
        })
    }
}

fn log_response(method: &reqwest::Method, path: &str, status: StatusCode, duration: Duration) {
    let duration_ms = duration.as_millis() as u64;
    let status = status.as_u16();

    if status < 400 {
        tracing::debug!(method = %method, path, status, duration_ms, "Outbound request completed");
    } else if status < 500 && status != 429 {
        tracing::warn!(method = %method, path, status, duration_ms, "Outbound request rejected");
    } else {
        tracing::error!(method = %method, path, status, duration_ms, "Outbound request failed upstream");
    }
}
