use http::HeaderName;
use http::Request;

/// Derives the limiter key from a request.
///
/// Resolvers must be pure: the same request always yields the same key, and
/// no I/O happens while resolving.
pub trait KeyResolver<Req>: Send + Sync {
    fn resolve(&self, req: &Req) -> String;
}

/// Prefix `raw` with `namespace` when one is set.
pub fn namespaced(namespace: Option<&str>, raw: &str) -> String {
    match namespace {
        Some(namespace) => format!("{namespace}:{raw}"),
        None => raw.to_string(),
    }
}

/// Reads the key from a request header.
///
/// The header bytes are taken as UTF-8, with invalid sequences replaced, so
/// any value that is present keys its own quota. A missing header resolves to
/// the empty string (still namespaced); the key is never validated.
#[derive(Debug, Clone)]
pub struct HeaderKeyResolver {
    header: HeaderName,
    namespace: Option<String>,
}

impl HeaderKeyResolver {
    pub fn new(header: HeaderName) -> Self {
        Self {
            header,
            namespace: None,
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }
}

impl<B> KeyResolver<Request<B>> for HeaderKeyResolver {
    fn resolve(&self, req: &Request<B>) -> String {
        let raw = req
            .headers()
            .get(&self.header)
            .map(|value| String::from_utf8_lossy(value.as_bytes()))
            .unwrap_or_default();
        namespaced(self.namespace.as_deref(), &raw)
    }
}

/// Sends every request to the same key, so the whole service shares one quota.
#[derive(Debug, Clone)]
pub struct GlobalKey(String);

impl GlobalKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }
}

impl Default for GlobalKey {
    fn default() -> Self {
        Self::new("global")
    }
}

impl<Req> KeyResolver<Req> for GlobalKey {
    fn resolve(&self, _req: &Req) -> String {
        self.0.clone()
    }
}

/// A resolver built from a closure. See [`resolver_fn`].
#[derive(Debug, Clone, Copy)]
pub struct ResolverFn<F>(F);

/// Use `f` as a [`KeyResolver`].
pub fn resolver_fn<F>(f: F) -> ResolverFn<F> {
    ResolverFn(f)
}

impl<F, Req> KeyResolver<Req> for ResolverFn<F>
where
    F: Fn(&Req) -> String + Send + Sync,
{
    fn resolve(&self, req: &Req) -> String {
        (self.0)(req)
    }
}
