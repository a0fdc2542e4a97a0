//! # Tower Rolling
//!
//! `tower-rolling` puts a [`rolling_limit::Limiter`] in front of a
//! [Tower](https://github.com/tower-rs/tower) HTTP service.
//!
//! ## The Admission Stack
//!
//! [`AdmissionLayer`] wraps a service so that every request is:
//!
//! 1. **Keyed**: a [`KeyResolver`] turns the request into a limiter key,
//!    optionally namespaced as `"<namespace>:<value>"`. Without one, every
//!    request shares a single global quota.
//! 2. **Checked**: the limiter records the attempt and decides.
//! 3. **Gated**: a denied request is answered with the configured
//!    [`FailedResponse`] and the inner service is never called. An allowed
//!    request is forwarded and its response returned untouched.
//!
//! ## Feature Flags
//!
//! - `axum`: Enables `IntoResponse` for [`AdmissionError`].
//! - `redis`: Enables `rolling_limit::RedisStore`.

mod error;
mod key;
mod layer;
mod response;
mod service;


pub use error::AdmissionError;
pub use key::GlobalKey;
pub use key::HeaderKeyResolver;
pub use key::KeyResolver;
pub use key::ResolverFn;
pub use key::namespaced;
pub use key::resolver_fn;
pub use layer::AdmissionLayer;
pub use response::FailedResponse;
pub use service::AdmissionService;
pub use service::ResponseFuture;
