//! Tower layer that paces outbound requests through the [`RateLimitGovernor`].
//!
//! Outermost layer of the outbound pipeline: waits out any pending delay
//! before the request reaches request logging and the transport, then feeds
//! the response headers back into the governor.

use super::governor::RateLimitGovernor;
use crate::error::BridgeError;
use futures::future::BoxFuture;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// Tower layer applying outbound rate-limit pacing
#[derive(Clone)]
pub struct RateLimitLayer {
    governor: Arc<RateLimitGovernor>,
}

impl RateLimitLayer {
    pub fn new(governor: Arc<RateLimitGovernor>) -> Self {
        Self { governor }
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimitService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimitService {
            inner,
            governor: self.governor.clone(),
        }
    }
}

/// Tower service applying outbound rate-limit pacing
#[derive(Clone)]
pub struct RateLimitService<S> {
    inner: S,
    governor: Arc<RateLimitGovernor>,
}

impl<S> Service<reqwest::Request> for RateLimitService<S>
where
    S: Service<reqwest::Request, Response = reqwest::Response, Error = BridgeError>
        + Clone
        + Send
        + 'static,
    S::Future: Send + 'static,
{
    type Response = reqwest::Response;
    type Error = BridgeError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: reqwest::Request) -> Self::Future {
        // The pre-delay happens inside the future, so the inner service is
        // cloned rather than called here.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let governor = self.governor.clone();

        Box::pin(async move {
            governor.throttle().await;
            let response = inner.call(req).await?;
            governor.observe(response.headers());
            Ok(response)
        })
    }
}
