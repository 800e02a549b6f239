//! Admission control middleware layer.

use axum::{
    extract::{ConnectInfo, Request},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use futures::future::BoxFuture;
use std::{
    convert::Infallible,
    net::SocketAddr,
    sync::Arc,
    task::{Context, Poll},
};
use tower::{Layer, Service};
use tracing::{debug, trace};

use crate::ratelimit::AdmissionControl;

/// Body returned with a `429 Too Many Requests` rejection.
pub const REJECTION_BODY: &str = "too many requests";

/// Admission key used when no caller address can be determined.
pub const UNKNOWN_CALLER: &str = "unknown";

/// Layer that checks every request against an [`AdmissionControl`].
pub struct AdmissionLayer<A> {
    control: Arc<A>,
    trust_forwarded_headers: bool,
}

impl<A: AdmissionControl> AdmissionLayer<A> {
    /// Create a layer that trusts `X-Forwarded-For` / `X-Real-IP`.
    pub fn new(control: Arc<A>) -> Self {
        Self {
            control,
            trust_forwarded_headers: true,
        }
    }

    /// Whether caller addresses may be taken from proxy headers.
    ///
    /// When disabled only the peer address of the connection is used.
    pub fn trust_forwarded_headers(mut self, trust: bool) -> Self {
        self.trust_forwarded_headers = trust;
        self
    }
}

impl<A> Clone for AdmissionLayer<A> {
    fn clone(&self) -> Self {
        Self {
            control: Arc::clone(&self.control),
            trust_forwarded_headers: self.trust_forwarded_headers,
        }
    }
}

impl<S, A> Layer<S> for AdmissionLayer<A> {
    type Service = AdmissionService<S, A>;

    fn layer(&self, inner: S) -> Self::Service {
        AdmissionService {
            inner,
            control: Arc::clone(&self.control),
            trust_forwarded_headers: self.trust_forwarded_headers,
        }
    }
}

/// Service produced by [`AdmissionLayer`].
pub struct AdmissionService<S, A> {
    inner: S,
    control: Arc<A>,
    trust_forwarded_headers: bool,
}

impl<S: Clone, A> Clone for AdmissionService<S, A> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            control: Arc::clone(&self.control),
            trust_forwarded_headers: self.trust_forwarded_headers,
        }
    }
}

impl<S, A> Service<Request> for AdmissionService<S, A>
where
    S: Service<Request, Response = Response, Error = Infallible> + Clone + Send + 'static,
    S::Future: Send + 'static,
    A: AdmissionControl + 'static,
{
    type Response = Response;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let key = self
            .control
            .scope()
            .resolve(|| caller_address(&req, self.trust_forwarded_headers));

        if !self.control.try_admit(&key) {
            debug!(
                key = %key,
                method = %req.method(),
                path = %req.uri().path(),
                "Request rejected by admission control"
            );
            return Box::pin(async { Ok(too_many_requests()) });
        }

        trace!(key = %key, "Request admitted");

        // The clone is not necessarily ready; keep the one that was polled.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        Box::pin(async move { inner.call(req).await })
    }
}

fn too_many_requests() -> Response {
    (StatusCode::TOO_MANY_REQUESTS, REJECTION_BODY).into_response()
}

/// Determine the caller's network address for per-caller admission keys.
///
/// Proxy headers win when trusted, then the connection's peer address.
fn caller_address(req: &Request, trust_forwarded_headers: bool) -> String {
    if trust_forwarded_headers {
        if let Some(addr) = forwarded_address(req.headers()) {
            return addr;
        }
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CALLER.to_string())
}

fn forwarded_address(headers: &HeaderMap) -> Option<String> {
    let header_value = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    // The first X-Forwarded-For entry is the originating client.
    header_value("x-forwarded-for")
        .and_then(|chain| chain.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .or_else(|| header_value("x-real-ip"))
        .map(unbracket)
        .map(String::from)
}

/// `[::1]` and `::1` must map to the same key.
fn unbracket(addr: &str) -> &str {
    addr.strip_prefix('[')
        .and_then(|inner| inner.strip_suffix(']'))
        .unwrap_or(addr)
}
