//! Request building and the ways of running a call.
//!
//! Every call goes through the same stages: build the URL, encode the body,
//! run the request adapter, send, inspect, decode and, for synced calls,
//! persist. A [`RequestBuilder`] is finished in one of two styles:
//!
//! - `send*` methods return a future resolving to the outcome.
//! - `dispatch*` methods start the call in the background and hand the
//!   outcome to a completion handler. They return a [`RequestHandle`] that
//!   can cancel the call.

use crate::{
    client::{Client, Exchange},
    mapping::Synchronize,
    metadata::RequestMetadata,
    response::Response,
    Error, Result,
};
use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

/// An encoded request body.
#[derive(Debug, Clone)]
pub(crate) enum Body {
    Empty,
    Text(String),
    Json(Vec<u8>),
}

impl Body {
    /// Human readable form, used in error reports.
    pub(crate) fn describe(&self) -> String {
        match self {
            Body::Empty => "<empty>".to_string(),
            Body::Text(text) => text.clone(),
            Body::Json(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        }
    }
}

/// A request being prepared against a [`Client`].
///
/// Created by [`Client::get`], [`Client::post`] and friends.
///
/// # Examples
///
/// ```no_run
/// use laze::{pattern_to_path, Client};
///
/// # async fn example() -> Result<(), laze::Error> {
/// let client = Client::builder()
///     .base_path("https://api.example.com")
///     .build()?;
///
/// let path = pattern_to_path("/api/users/:id/posts", [("id", "42")]);
/// let response = client
///     .get(path)
///     .query("page", "2")
///     .header("Accept-Language", "en")?
///     .send::<Vec<serde_json::Value>>()
///     .await?;
/// println!("{} posts", response.data.len());
/// # Ok(())
/// # }
/// ```
#[must_use = "requests do nothing until sent or dispatched"]
pub struct RequestBuilder {
    client: Client,
    metadata: RequestMetadata,
    body: std::result::Result<Body, serde_json::Error>,
}

impl RequestBuilder {
    pub(crate) fn new(client: Client, metadata: RequestMetadata) -> Self {
        Self {
            client,
            metadata,
            body: Ok(Body::Empty),
        }
    }

    /// Appends a query item.
    ///
    /// Once any item is added, the query string written into the path
    /// (`/search?q=x`) is discarded and only the added items are sent. An
    /// inline query survives only when no items are added.
    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata = self.metadata.with_query_item(name, value);
        self
    }

    /// Appends several query items, in order.
    ///
    /// Replaces an inline query in the path, as [`query`](Self::query) does.
    pub fn query_items<K, V>(mut self, items: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.metadata = self.metadata.with_query_items(items);
        self
    }

    /// Sets a header for this request only.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        self.metadata = self.metadata.with_header(name, value)?;
        Ok(self)
    }

    /// Sends `body` as is.
    pub fn text(mut self, body: impl Into<String>) -> Self {
        self.body = Ok(Body::Text(body.into()));
        self
    }

    /// Sends `body` encoded as JSON.
    ///
    /// An encoding failure surfaces as [`Error::SerializationFailed`] when the
    /// request is run; nothing is sent in that case.
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Self {
        self.body = serde_json::to_vec(body).map(Body::Json);
        self
    }

    /// The method, path, headers and query of this request.
    pub fn metadata(&self) -> &RequestMetadata {
        &self.metadata
    }

    async fn perform<T, F>(self, finish: F) -> Result<Response<T>>
    where
        F: FnOnce(&Client, Exchange) -> Result<Response<T>>,
    {
        let RequestBuilder {
            client,
            metadata,
            body,
        } = self;

        let result = match body {
            Ok(body) => match client.execute(&metadata, body).await {
                Ok(exchange) => finish(&client, exchange),
                Err(e) => Err(e),
            },
            Err(e) => Err(Error::SerializationFailed(e)),
        };

        if let Err(e) = &result {
            tracing::warn!(
                error = %e,
                method = %metadata.method,
                path = %metadata.path,
                "Request failed"
            );
        }

        result
    }

    /// Sends the request without decoding the response.
    pub async fn send_raw(self) -> Result<Response<()>> {
        self.perform(|client, exchange| client.finish_raw(exchange))
            .await
    }

    /// Sends the request and decodes the response body into `T`.
    ///
    /// # Errors
    ///
    /// Fails if the URL is invalid, the body cannot be encoded, the adapter
    /// rejects the request, the transport fails, or the response cannot be
    /// decoded.
    pub async fn send<T: DeserializeOwned>(self) -> Result<Response<T>> {
        self.perform(|client, exchange| client.decode(exchange))
            .await
    }

    /// Sends the request, decodes the body and upserts the result into the
    /// client's persistence context.
    ///
    /// Persistence failures do not fail the call: the decoded data is
    /// returned with [`Response::sync_error`] set. When the client has no
    /// context provider, or it yields none, this behaves like
    /// [`send`](Self::send).
    pub async fn send_synced<T>(self) -> Result<Response<T>>
    where
        T: DeserializeOwned + Synchronize,
    {
        self.perform(|client, exchange| {
            let mut response = client.decode::<T>(exchange)?;
            client.synchronize(&mut response);
            Ok(response)
        })
        .await
    }

    /// Runs [`send_raw`](Self::send_raw) in the background.
    pub fn dispatch_raw<F>(self, handler: F) -> RequestHandle
    where
        F: FnOnce(Result<Response<()>>) + Send + 'static,
    {
        RequestHandle::spawn(self.send_raw(), handler)
    }

    /// Runs [`send`](Self::send) in the background.
    ///
    /// `handler` is called exactly once, on a runtime worker thread.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use laze::Client;
    ///
    /// # async fn example() -> Result<(), laze::Error> {
    /// let client = Client::builder()
    ///     .base_path("https://api.example.com")
    ///     .build()?;
    ///
    /// let handle = client
    ///     .get("/users")
    ///     .dispatch::<serde_json::Value, _>(|result| match result {
    ///         Ok(response) => println!("Got {}", response.data),
    ///         Err(e) => eprintln!("Failed: {}", e),
    ///     });
    ///
    /// handle.cancel();
    /// # Ok(())
    /// # }
    /// ```
    pub fn dispatch<T, F>(self, handler: F) -> RequestHandle
    where
        T: DeserializeOwned + Send + 'static,
        F: FnOnce(Result<Response<T>>) + Send + 'static,
    {
        RequestHandle::spawn(self.send::<T>(), handler)
    }

    /// Runs [`send_synced`](Self::send_synced) in the background.
    pub fn dispatch_synced<T, F>(self, handler: F) -> RequestHandle
    where
        T: DeserializeOwned + Synchronize + Send + 'static,
        F: FnOnce(Result<Response<T>>) + Send + 'static,
    {
        RequestHandle::spawn(self.send_synced::<T>(), handler)
    }
}

/// Handle to a dispatched call.
///
/// Dropping the handle does not stop the call.
#[derive(Debug)]
pub struct RequestHandle {
    cancel: Arc<Notify>,
    task: Option<JoinHandle<()>>,
}

impl RequestHandle {
    fn spawn<Fut, T, F>(future: Fut, handler: F) -> Self
    where
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
        F: FnOnce(Result<T>) + Send + 'static,
    {
        let cancel = Arc::new(Notify::new());

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                handler(Err(Error::ConfigurationError(format!(
                    "No async runtime to dispatch on: {}",
                    e
                ))));
                return Self { cancel, task: None };
            }
        };

        let cancelled = Arc::clone(&cancel);
        let task = runtime.spawn(async move {
            let result = tokio::select! {
                biased;
                _ = cancelled.notified() => Err(Error::Cancelled),
                result = future => result,
            };
            handler(result);
        });

        Self {
            cancel,
            task: Some(task),
        }
    }

    /// Cancels the call if it has not completed yet.
    ///
    /// The handler then receives [`Error::Cancelled`]. Has no effect once the
    /// handler has run.
    pub fn cancel(&self) {
        self.cancel.notify_one();
    }

    /// Returns `true` once the handler has run.
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Waits until the handler has run.
    pub async fn join(self) {
        if let Some(task) = self.task {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Dispatched request panicked");
            }
        }
    }
}
