use std::future::Future;
use std::ops::ControlFlow;
use std::pin::Pin;
use std::sync::Arc;
use std::task::Context;
use std::task::Poll;
use std::task::ready;

use http::Request;
use http::Response;
use opentelemetry::KeyValue;
use opentelemetry::global;
use opentelemetry::metrics::Counter;
use pin_project_lite::pin_project;
use tower::BoxError;
use tower::Service;
use tracing::debug;

use rolling_limit::LimitError;
use rolling_limit::Limiter;
use rolling_limit::Reason;

use crate::error::AdmissionError;
use crate::key::KeyResolver;
use crate::response::FailedResponse;

type CheckFuture = Pin<Box<dyn Future<Output = Result<ControlFlow<Reason>, LimitError>> + Send>>;

#[derive(Clone, Debug)]
struct AdmissionMetrics {
    decisions: Counter<u64>,
}

impl AdmissionMetrics {
    fn new() -> Self {
        let meter = global::meter("admission_service");
        Self {
            decisions: meter.u64_counter("admission_decisions").build(),
        }
    }

    fn record(&self, outcome: &'static str) {
        self.decisions.add(1, &[KeyValue::new("outcome", outcome)]);
    }
}

/// Checks every request against a [`Limiter`] before handing it on.
///
/// Denied requests get a copy of the configured [`FailedResponse`] and never
/// reach the inner service. Allowed requests are forwarded and their
/// response is returned as is.
#[derive(Debug)]
pub struct AdmissionService<L, K, S>
where
    L: ?Sized,
{
    inner: S,
    limiter: Arc<L>,
    resolver: Arc<K>,
    failed: Arc<FailedResponse>,
    instruments: AdmissionMetrics,
}

impl<L, K, S> Clone for AdmissionService<L, K, S>
where
    L: ?Sized,
    S: Clone,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            limiter: Arc::clone(&self.limiter),
            resolver: Arc::clone(&self.resolver),
            failed: Arc::clone(&self.failed),
            instruments: self.instruments.clone(),
        }
    }
}

impl<L, K, S> AdmissionService<L, K, S>
where
    L: ?Sized,
{
    pub fn new(
        inner: S,
        limiter: Arc<L>,
        resolver: Arc<K>,
        failed: Arc<FailedResponse>,
    ) -> Self {
        Self {
            inner,
            limiter,
            resolver,
            failed,
            instruments: AdmissionMetrics::new(),
        }
    }
}

pin_project! {
    #[project = StateProj]
    enum State<F> {
        Checking {
            check: CheckFuture,
        },
        Calling {
            #[pin]
            future: F,
        },
    }
}

pin_project! {
    /// Resolves the admission decision, then drives the inner call if allowed.
    pub struct ResponseFuture<S: Service<Req>, Req> {
        #[pin]
        state: State<S::Future>,
        inner: S,
        req: Option<Req>,
        key: String,
        failed: Arc<FailedResponse>,
        instruments: AdmissionMetrics,
    }
}

impl<S, ReqBody, ResBody> Future for ResponseFuture<S, Request<ReqBody>>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
    S::Error: Into<BoxError>,
    ResBody: From<String>,
{
    type Output = Result<Response<ResBody>, BoxError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut this = self.project();
        loop {
            match this.state.as_mut().project() {
                StateProj::Checking { check } => match ready!(check.as_mut().poll(cx)) {
                    Err(err) => {
                        return Poll::Ready(Err(BoxError::from(AdmissionError::from(err))));
                    }
                    Ok(ControlFlow::Break(reason)) => {
                        this.instruments.record("denied");
                        debug!(key = %this.key, ?reason, "request denied");
                        return Poll::Ready(Ok(this.failed.to_response()));
                    }
                    Ok(ControlFlow::Continue(())) => {
                        this.instruments.record("allowed");
                        let Some(req) = this.req.take() else {
                            panic!("ResponseFuture polled after completion");
                        };
                        this.state.set(State::Calling {
                            future: this.inner.call(req),
                        });
                    }
                },
                StateProj::Calling { future } => return future.poll(cx).map_err(Into::into),
            }
        }
    }
}

impl<L, K, S, ReqBody, ResBody> Service<Request<ReqBody>> for AdmissionService<L, K, S>
where
    L: Limiter + ?Sized + 'static,
    K: KeyResolver<Request<ReqBody>>,
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone,
    S::Error: Into<BoxError>,
    ResBody: From<String>,
{
    type Response = Response<ResBody>;
    type Error = BoxError;
    type Future = ResponseFuture<S, Request<ReqBody>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(Into::into)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let key = self.resolver.resolve(&req);

        let limiter = Arc::clone(&self.limiter);
        let check_key = key.clone();
        let check: CheckFuture = Box::pin(async move { limiter.process(&check_key).await });

        // Hand the instance that was driven to readiness to the future.
        let clone = self.inner.clone();
        let inner = std::mem::replace(&mut self.inner, clone);

        ResponseFuture {
            state: State::Checking { check },
            inner,
            req: Some(req),
            key,
            failed: Arc::clone(&self.failed),
            instruments: self.instruments.clone(),
        }
    }
}
