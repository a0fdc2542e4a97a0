use std::sync::Arc;

use rolling_limit::Limiter;
use tower::Layer;

use crate::key::GlobalKey;
use crate::response::FailedResponse;
use crate::service::AdmissionService;

/// Applies rolling-window admission to requests.
///
/// Without a resolver every request is checked against a single global key.
#[derive(Debug)]
pub struct AdmissionLayer<L, K = GlobalKey>
where
    L: ?Sized,
{
    limiter: Arc<L>,
    resolver: Arc<K>,
    failed: Arc<FailedResponse>,
}

impl<L, K> Clone for AdmissionLayer<L, K>
where
    L: ?Sized,
{
    fn clone(&self) -> Self {
        Self {
            limiter: Arc::clone(&self.limiter),
            resolver: Arc::clone(&self.resolver),
            failed: Arc::clone(&self.failed),
        }
    }
}

impl<L> AdmissionLayer<L, GlobalKey>
where
    L: Limiter + ?Sized,
{
    /// Create an AdmissionLayer answering denials with `failed`.
    pub fn new(limiter: Arc<L>, failed: FailedResponse) -> Self {
        AdmissionLayer {
            limiter,
            resolver: Arc::new(GlobalKey::default()),
            failed: Arc::new(failed),
        }
    }
}

impl<L, K> AdmissionLayer<L, K>
where
    L: ?Sized,
{
    /// Derive a per-request key with `resolver`.
    pub fn with_resolver<R>(self, resolver: R) -> AdmissionLayer<L, R> {
        AdmissionLayer {
            limiter: self.limiter,
            resolver: Arc::new(resolver),
            failed: self.failed,
        }
    }
}

impl<L, K, S> Layer<S> for AdmissionLayer<L, K>
where
    L: ?Sized,
{
    type Service = AdmissionService<L, K, S>;

    fn layer(&self, service: S) -> Self::Service {
        AdmissionService::new(
            service,
            self.limiter.clone(),
            self.resolver.clone(),
            self.failed.clone(),
        )
    }
}
