use crate::client_id::client_id;
use crate::error::AdmissionError;
use crate::rate_limit::Limiter;
use futures::future::BoxFuture;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower_layer::Layer;
use tower_service::Service;

/// Derives the rate-limiting bucket key for a request.
pub trait ClientKey<Req>: Send + Sync {
    fn client_key(&self, req: &Req) -> String;
}

impl<Req, F> ClientKey<Req> for F
where
    F: Fn(&Req) -> String + Send + Sync,
{
    fn client_key(&self, req: &Req) -> String {
        self(req)
    }
}

/// Keys requests by the address part of their remote `address:port` string.
///
/// See [`client_id`] for the exact rule.
#[derive(Clone, Copy)]
pub struct RemoteAddr<F>(F);

impl<Req, F> ClientKey<Req> for RemoteAddr<F>
where
    F: Fn(&Req) -> &str + Send + Sync,
{
    fn client_key(&self, req: &Req) -> String {
        client_id((self.0)(req)).to_owned()
    }
}

/// A layer that admits requests through a [`Limiter`].
pub struct AdmissionLayer<L, K> {
    limiter: Arc<L>,
    key: Arc<K>,
}

impl<L, K> AdmissionLayer<L, K> {
    /// Create a new admission layer keying requests with `key`.
    pub fn new(limiter: L, key: K) -> Self {
        Self { limiter: Arc::new(limiter), key: Arc::new(key) }
    }
}

impl<L> AdmissionLayer<L, ()> {
    /// Key requests by the remote address `addr` reads from them.
    pub fn by_remote_addr<Req, F>(limiter: L, addr: F) -> AdmissionLayer<L, RemoteAddr<F>>
    where
        F: Fn(&Req) -> &str + Send + Sync,
    {
        AdmissionLayer::new(limiter, RemoteAddr(addr))
    }
}

impl<L, K> Clone for AdmissionLayer<L, K> {
    fn clone(&self) -> Self {
        Self { limiter: Arc::clone(&self.limiter), key: Arc::clone(&self.key) }
    }
}

impl<L: std::fmt::Debug, K> std::fmt::Debug for AdmissionLayer<L, K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmissionLayer")
            .field("limiter", &self.limiter)
            .field("key", &"<client key>")
            .finish()
    }
}

impl<S, L, K> Layer<S> for AdmissionLayer<L, K> {
    type Service = AdmissionService<S, L, K>;

    fn layer(&self, service: S) -> Self::Service {
        AdmissionService {
            inner: service,
            limiter: Arc::clone(&self.limiter),
            key: Arc::clone(&self.key),
        }
    }
}

/// Middleware service that rejects requests the limiter does not admit.
///
/// The decision is made in `call`, before the inner service sees the request.
pub struct AdmissionService<S, L, K> {
    inner: S,
    limiter: Arc<L>,
    key: Arc<K>,
}

impl<S: Clone, L, K> Clone for AdmissionService<S, L, K> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            limiter: Arc::clone(&self.limiter),
            key: Arc::clone(&self.key),
        }
    }
}

impl<S: std::fmt::Debug, L: std::fmt::Debug, K> std::fmt::Debug for AdmissionService<S, L, K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmissionService")
            .field("inner", &self.inner)
            .field("limiter", &self.limiter)
            .finish()
    }
}

impl<S, L, K, Req> Service<Req> for AdmissionService<S, L, K>
where
    S: Service<Req> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Response: Send + 'static,
    S::Error: Send + 'static,
    L: Limiter,
    K: ClientKey<Req>,
    Req: Send + 'static,
{
    type Response = S::Response;
    type Error = AdmissionError<S::Error>;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(AdmissionError::Inner)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let client = self.key.client_key(&req);
        if !self.limiter.allow(&client) {
            return Box::pin(futures::future::ready(Err(AdmissionError::Rejected { client })));
        }

        // the clone may not be ready; keep the one poll_ready was called on
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        Box::pin(async move { inner.call(req).await.map_err(AdmissionError::Inner) })
    }
}
