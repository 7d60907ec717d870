//! Hooks a [`Client`](crate::Client) runs around every request.
//!
//! - [`RequestAdapter`]: last chance to modify an outgoing request, or to veto
//!   it by returning `None`.
//! - [`ResponseInspector`]: observes every response head (or its absence) for
//!   global side effects such as detecting expired credentials.
//! - [`ContextProvider`]: supplies the unit of work decoded data is synced
//!   into.
//!
//! Every hook trait is implemented for plain closures.
//!
//! Hooks run inline on the worker that completes the request. Keep them
//! short and non-blocking.

use crate::response::ResponseHead;
use crate::store::Context;
use http::{HeaderName, HeaderValue, StatusCode};
use std::sync::Arc;

/// Modifies or vetoes outgoing requests.
///
/// # Examples
///
/// ```
/// use laze::hooks::RequestAdapter;
///
/// struct BlockDeletes;
///
/// impl RequestAdapter for BlockDeletes {
///     fn adapt(&self, request: reqwest::Request) -> Option<reqwest::Request> {
///         (request.method() != http::Method::DELETE).then_some(request)
///     }
/// }
/// ```
pub trait RequestAdapter: Send + Sync {
    /// Returns the request to send, or `None` to reject it.
    fn adapt(&self, request: reqwest::Request) -> Option<reqwest::Request>;
}

impl<F> RequestAdapter for F
where
    F: Fn(reqwest::Request) -> Option<reqwest::Request> + Send + Sync,
{
    fn adapt(&self, request: reqwest::Request) -> Option<reqwest::Request> {
        self(request)
    }
}

/// Sets one header on every request, replacing any existing value.
///
/// # Examples
///
/// ```
/// use laze::hooks::SetHeader;
///
/// let auth = SetHeader::new("X-Access-Token", "Your token").unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct SetHeader {
    name: HeaderName,
    value: HeaderValue,
}

impl SetHeader {
    /// Creates the adapter.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn new(name: impl AsRef<str>, value: impl AsRef<str>) -> crate::Result<Self> {
        let (name, value) = crate::metadata::parse_header(name.as_ref(), value.as_ref())?;
        Ok(Self { name, value })
    }
}

impl RequestAdapter for SetHeader {
    fn adapt(&self, mut request: reqwest::Request) -> Option<reqwest::Request> {
        request
            .headers_mut()
            .insert(self.name.clone(), self.value.clone());
        Some(request)
    }
}

/// Runs several adapters in order.
///
/// Stops at the first adapter that rejects the request.
///
/// # Examples
///
/// ```
/// use laze::hooks::{AdapterChain, SetHeader};
///
/// let chain = AdapterChain::new(vec![
///     Box::new(SetHeader::new("X-Access-Token", "Your token").unwrap()),
///     Box::new(SetHeader::new("Content-Type", "application/json").unwrap()),
/// ]);
/// ```
pub struct AdapterChain {
    adapters: Vec<Box<dyn RequestAdapter>>,
}

impl AdapterChain {
    /// Creates a new `AdapterChain` from a list of adapters.
    pub fn new(adapters: Vec<Box<dyn RequestAdapter>>) -> Self {
        Self { adapters }
    }
}

impl RequestAdapter for AdapterChain {
    fn adapt(&self, request: reqwest::Request) -> Option<reqwest::Request> {
        self.adapters
            .iter()
            .try_fold(request, |request, adapter| adapter.adapt(request))
    }
}

/// Observes every response.
///
/// Receives `None` when the transport failed before a response arrived.
/// Inspectors cannot change the outcome of a call.
pub trait ResponseInspector: Send + Sync {
    /// Called once per sent request.
    fn inspect(&self, head: Option<&ResponseHead>);
}

impl<F> ResponseInspector for F
where
    F: Fn(Option<&ResponseHead>) + Send + Sync,
{
    fn inspect(&self, head: Option<&ResponseHead>) {
        self(head)
    }
}

/// Logs a warning for every `401 Unauthorized` response.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogUnauthorized;

impl ResponseInspector for LogUnauthorized {
    fn inspect(&self, head: Option<&ResponseHead>) {
        if let Some(head) = head.filter(|h| h.status == StatusCode::UNAUTHORIZED) {
            tracing::warn!(url = %head.url, "Unauthorized response");
        }
    }
}

/// Supplies the unit of work decoded data is synced into.
pub trait ContextProvider: Send + Sync {
    /// Returns a context, or `None` if persistence is unavailable.
    fn context(&self) -> Option<Arc<Context>>;
}

impl<F> ContextProvider for F
where
    F: Fn() -> Option<Arc<Context>> + Send + Sync,
{
    fn context(&self) -> Option<Arc<Context>> {
        self()
    }
}

/// Hands out a fresh child of one root context per call.
///
/// Each sync gets its own scope; commits land in the root, which commits
/// on to its store.
#[derive(Debug, Clone)]
pub struct ChildContexts(pub Arc<Context>);

impl ContextProvider for ChildContexts {
    fn context(&self) -> Option<Arc<Context>> {
        Some(self.0.child())
    }
}

/// Hands out the same context on every call.
///
/// Concurrent syncs then share one unit of work; the caller must make sure
/// only one of them writes at a time.
#[derive(Debug, Clone)]
pub struct SharedContext(pub Arc<Context>);

impl ContextProvider for SharedContext {
    fn context(&self) -> Option<Arc<Context>> {
        Some(Arc::clone(&self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use http::Method;

    fn request() -> reqwest::Request {
        reqwest::Request::new(
            Method::GET,
            reqwest::Url::parse("http://localhost/items").unwrap(),
        )
    }

    #[test]
    fn test_set_header() {
        let adapter = SetHeader::new("X-Access-Token", "Your token").unwrap();
        let request = adapter.adapt(request()).unwrap();
        assert_eq!(request.headers()["x-access-token"], "Your token");
    }

    #[test]
    fn test_chain_stops_at_veto() {
        let chain = AdapterChain::new(vec![
            Box::new(SetHeader::new("Content-Type", "application/json").unwrap()),
            Box::new(|_: reqwest::Request| -> Option<reqwest::Request> { None }),
        ]);
        assert!(chain.adapt(request()).is_none());

        let chain = AdapterChain::new(vec![
            Box::new(SetHeader::new("a", "1").unwrap()),
            Box::new(SetHeader::new("b", "2").unwrap()),
        ]);
        let request = chain.adapt(request()).unwrap();
        assert_eq!(request.headers().len(), 2);
    }

    #[test]
    fn test_child_contexts_are_fresh() {
        let root = Context::new(Arc::new(MemoryStore::new()));
        let provider = ChildContexts(root.clone());

        let first = provider.context().unwrap();
        let second = provider.context().unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(first.parent().unwrap(), &root));

        let shared = SharedContext(root.clone());
        assert!(Arc::ptr_eq(&shared.context().unwrap(), &root));
    }
}
