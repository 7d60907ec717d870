//! API client: configuration plus the request pipeline.
//!
//! A [`Client`] is one named configuration: base path and port, JSON decoder,
//! HTTP client, hooks and persistence context provider. Several clients (one
//! per backend or tenant) can live side by side; each call runs against the
//! client it was started from. Use [`ClientBuilder`] to create one.

use crate::{
    decode::JsonDecoder,
    hooks::{ContextProvider, RequestAdapter, ResponseInspector},
    mapping::Synchronize,
    metadata::{parse_header, RequestMetadata},
    request::{Body, RequestBuilder},
    response::{Response, ResponseHead},
    store::Context,
    Error, Result,
};
use http::{header::CONTENT_TYPE, HeaderMap, HeaderValue, Method};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

/// A configured API client.
///
/// Cloning is cheap; clones share the same configuration.
///
/// # Examples
///
/// ```no_run
/// use laze::hooks::{LogUnauthorized, SetHeader};
/// use laze::{Client, Response};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize)]
/// struct CreateUser {
///     name: String,
/// }
///
/// #[derive(Deserialize)]
/// struct User {
///     id: u64,
///     name: String,
/// }
///
/// # async fn example() -> Result<(), laze::Error> {
/// let client = Client::builder()
///     .base_path("https://api.example.com")
///     .request_adapter(SetHeader::new("X-Access-Token", "Your token")?)
///     .response_inspector(LogUnauthorized)
///     .build()?;
///
/// let user: Response<User> = client.get("/users/123").send().await?;
/// println!("User: {}", user.data.name);
///
/// let created: Response<User> = client
///     .post("/users")
///     .json(&CreateUser { name: "Alice".to_string() })
///     .send()
///     .await?;
/// println!("Created user with ID: {}", created.data.id);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http_client: reqwest::Client,
    base_path: Option<String>,
    base_port: Option<u16>,
    decoder: JsonDecoder,
    default_headers: HeaderMap,
    timeout: Option<Duration>,
    adapter: Option<Box<dyn RequestAdapter>>,
    inspector: Option<Box<dyn ResponseInspector>>,
    context_provider: Option<Box<dyn ContextProvider>>,
    reject_error_status: bool,
}

/// A response whose body has been read but not decoded.
pub(crate) struct Exchange {
    head: ResponseHead,
    body: Vec<u8>,
    latency: Duration,
}

impl Client {
    /// Creates a new `ClientBuilder` for configuring a client.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Starts a request with an explicit method.
    ///
    /// `path` is appended to the base path as is; resolve placeholders first
    /// with [`pattern_to_path`](crate::pattern_to_path).
    pub fn request(&self, method: Method, path: impl Into<String>) -> RequestBuilder {
        RequestBuilder::new(self.clone(), RequestMetadata::new(method, path))
    }

    /// Starts a GET request.
    pub fn get(&self, path: impl Into<String>) -> RequestBuilder {
        self.request(Method::GET, path)
    }

    /// Starts a POST request.
    pub fn post(&self, path: impl Into<String>) -> RequestBuilder {
        self.request(Method::POST, path)
    }

    /// Starts a PUT request.
    pub fn put(&self, path: impl Into<String>) -> RequestBuilder {
        self.request(Method::PUT, path)
    }

    /// Starts a PATCH request.
    pub fn patch(&self, path: impl Into<String>) -> RequestBuilder {
        self.request(Method::PATCH, path)
    }

    /// Starts a DELETE request.
    pub fn delete(&self, path: impl Into<String>) -> RequestBuilder {
        self.request(Method::DELETE, path)
    }

    /// The prefix prepended to every request path.
    pub fn base_path(&self) -> Option<&str> {
        self.inner.base_path.as_deref()
    }

    /// The port every request URL is forced to.
    pub fn base_port(&self) -> Option<u16> {
        self.inner.base_port
    }

    /// The decoder applied to response bodies.
    pub fn decoder(&self) -> &JsonDecoder {
        &self.inner.decoder
    }

    /// Asks the configured provider for a unit of work.
    ///
    /// Use it to [`materialize`](crate::EntityMapping::materialize) records
    /// after a synced call.
    pub fn context(&self) -> Option<Arc<Context>> {
        self.inner
            .context_provider
            .as_ref()
            .and_then(|provider| provider.context())
    }

    /// Builds the full URL for a request.
    pub(crate) fn url_for(&self, metadata: &RequestMetadata, body: &Body) -> Result<Url> {
        let invalid = |reason: String| Error::InvalidUrl {
            path: metadata.path.clone(),
            method: metadata.method.clone(),
            query: metadata.query.clone(),
            body: body.describe(),
            reason,
        };

        let raw = format!("{}{}", self.base_path().unwrap_or_default(), metadata.path);
        let mut url = Url::parse(&raw).map_err(|e| invalid(e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid(format!("unsupported scheme `{}`", url.scheme())));
        }

        if let Some(port) = self.inner.base_port {
            url.set_port(Some(port))
                .map_err(|()| invalid(format!("cannot set port {} on {}", port, raw)))?;
        }

        if !metadata.query.is_empty() {
            url.set_query(None);
            let mut pairs = url.query_pairs_mut();
            for (name, value) in &metadata.query {
                pairs.append_pair(name, value);
            }
        }

        Ok(url)
    }

    /// Builds, adapts and sends a request, then reads the response body.
    pub(crate) async fn execute(&self, metadata: &RequestMetadata, body: Body) -> Result<Exchange> {
        let url = self.url_for(metadata, &body)?;

        tracing::debug!(
            method = %metadata.method,
            url = %url,
            "Executing HTTP request"
        );

        let mut headers = self.inner.default_headers.clone();
        for (name, value) in &metadata.headers {
            headers.insert(name.clone(), value.clone());
        }

        let mut builder = self
            .inner
            .http_client
            .request(metadata.method.clone(), url.clone());

        builder = match body {
            Body::Empty => builder,
            Body::Text(text) => builder.body(text),
            Body::Json(bytes) => {
                headers
                    .entry(CONTENT_TYPE)
                    .or_insert(HeaderValue::from_static("application/json"));
                builder.body(bytes)
            }
        };
        builder = builder.headers(headers);

        if let Some(timeout) = self.inner.timeout {
            builder = builder.timeout(timeout);
        }

        let mut request = builder.build()?;
        if let Some(adapter) = &self.inner.adapter {
            request = adapter.adapt(request).ok_or_else(|| Error::ClientRejected {
                method: metadata.method.clone(),
                url,
            })?;
        }

        let start_time = Instant::now();
        let response = match self.inner.http_client.execute(request).await {
            Ok(response) => response,
            Err(e) => {
                self.inspect(None);
                return Err(e.into());
            }
        };

        let head = ResponseHead {
            status: response.status(),
            headers: response.headers().clone(),
            url: response.url().clone(),
        };
        let body = response.bytes().await;
        self.inspect(Some(&head));
        let body = body?.to_vec();
        let latency = start_time.elapsed();

        tracing::info!(
            status = head.status.as_u16(),
            latency_ms = latency.as_millis(),
            "Received HTTP response"
        );

        Ok(Exchange {
            head,
            body,
            latency,
        })
    }

    fn inspect(&self, head: Option<&ResponseHead>) {
        if let Some(inspector) = &self.inner.inspector {
            inspector.inspect(head);
        }
    }

    /// Turns error statuses into [`Error::HttpError`] when configured to.
    fn check_status(&self, exchange: Exchange) -> Result<Exchange> {
        let status = exchange.head.status;
        if !self.inner.reject_error_status || status.is_success() {
            return Ok(exchange);
        }

        let raw_response = String::from_utf8_lossy(&exchange.body).into_owned();
        if status.is_client_error() {
            tracing::error!(
                status = status.as_u16(),
                response = %raw_response,
                "Client error (4xx)"
            );
        } else if status.is_server_error() {
            tracing::warn!(
                status = status.as_u16(),
                response = %raw_response,
                "Server error (5xx)"
            );
        }

        Err(Error::HttpError {
            status,
            raw_response,
            headers: exchange.head.headers,
        })
    }

    /// Finishes a call that has no target type.
    pub(crate) fn finish_raw(&self, exchange: Exchange) -> Result<Response<()>> {
        let Exchange {
            head,
            body,
            latency,
        } = self.check_status(exchange)?;
        Ok(Response::new((), head, body, latency))
    }

    /// Decodes the response body into `T`.
    pub(crate) fn decode<T: DeserializeOwned>(&self, exchange: Exchange) -> Result<Response<T>> {
        let Exchange {
            head,
            body,
            latency,
        } = self.check_status(exchange)?;

        if body.is_empty() {
            return Err(Error::EmptyResponse {
                status: head.status,
            });
        }

        match self.inner.decoder.decode::<T>(&body) {
            Ok(data) => Ok(Response::new(data, head, body, latency)),
            Err(e) => {
                let raw_response = String::from_utf8_lossy(&body).into_owned();
                tracing::error!(
                    error = %e,
                    raw_response = %raw_response,
                    "Failed to deserialize response"
                );

                Err(Error::DeserializationFailed {
                    raw_response,
                    status: head.status,
                    source: e,
                })
            }
        }
    }

    /// Upserts decoded data into a fresh unit of work and commits it.
    ///
    /// Failures end up in [`Response::sync_error`]; the decoded data is kept.
    pub(crate) fn synchronize<T: Synchronize>(&self, response: &mut Response<T>) {
        let Some(context) = self.context() else {
            tracing::debug!("No persistence context available, skipping sync");
            return;
        };

        if let Err(e) = response.data.synchronize(&context) {
            tracing::warn!(error = %e, url = %response.url, "Failed to sync response data");
            response.sync_error = Some(e);
        }
        context.commit();
    }
}

/// Builder for configuring and creating a [`Client`].
///
/// # Examples
///
/// ```no_run
/// use laze::decode::{JsonDecoder, KeyDecoding};
/// use laze::hooks::ChildContexts;
/// use laze::store::{Context, MemoryStore};
/// use laze::ClientBuilder;
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// # fn example() -> Result<(), laze::Error> {
/// let root = Context::new(Arc::new(MemoryStore::new()));
///
/// let client = ClientBuilder::new()
///     .base_path("https://api.example.com")
///     .base_port(8765)
///     .timeout(Duration::from_secs(30))
///     .decoder(JsonDecoder::new().key_decoding(KeyDecoding::FromSnakeCase))
///     .default_header("User-Agent", "my-app/1.0")?
///     .context_provider(ChildContexts(root))
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder {
    base_path: Option<String>,
    base_port: Option<u16>,
    decoder: JsonDecoder,
    http_client: Option<reqwest::Client>,
    default_headers: HeaderMap,
    timeout: Option<Duration>,
    adapter: Option<Box<dyn RequestAdapter>>,
    inspector: Option<Box<dyn ResponseInspector>>,
    context_provider: Option<Box<dyn ContextProvider>>,
    reject_error_status: bool,
}

impl ClientBuilder {
    /// Creates a new `ClientBuilder` with default settings.
    pub fn new() -> Self {
        Self {
            base_path: None,
            base_port: None,
            decoder: JsonDecoder::default(),
            http_client: None,
            default_headers: HeaderMap::new(),
            timeout: None,
            adapter: None,
            inspector: None,
            context_provider: None,
            reject_error_status: false,
        }
    }

    /// Sets the prefix prepended to every request path.
    ///
    /// Typically scheme and host, e.g. `https://api.example.com`. The result
    /// of joining it with a path is validated per request.
    pub fn base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = Some(base_path.into());
        self
    }

    /// Overrides the port of every request URL.
    pub fn base_port(mut self, port: u16) -> Self {
        self.base_port = Some(port);
        self
    }

    /// Sets the decoder used for all response bodies.
    pub fn decoder(mut self, decoder: JsonDecoder) -> Self {
        self.decoder = decoder;
        self
    }

    /// Sets the HTTP client used for all requests.
    ///
    /// By default a new `reqwest::Client` is created at [`build`](Self::build).
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Adds a default header that will be included in all requests.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn default_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let (name, value) = parse_header(name.as_ref(), value.as_ref())?;
        self.default_headers.insert(name, value);
        Ok(self)
    }

    /// Sets the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the hook that can modify or veto every outgoing request.
    pub fn request_adapter(mut self, adapter: impl RequestAdapter + 'static) -> Self {
        self.adapter = Some(Box::new(adapter));
        self
    }

    /// Sets the hook that observes every response.
    pub fn response_inspector(mut self, inspector: impl ResponseInspector + 'static) -> Self {
        self.inspector = Some(Box::new(inspector));
        self
    }

    /// Sets the provider of units of work for synced calls.
    pub fn context_provider(mut self, provider: impl ContextProvider + 'static) -> Self {
        self.context_provider = Some(Box::new(provider));
        self
    }

    /// Fails calls with [`Error::HttpError`] on non-2xx statuses instead of
    /// decoding the body.
    ///
    /// Off by default: any response with a body is decoded.
    pub fn reject_error_status(mut self, reject: bool) -> Self {
        self.reject_error_status = reject;
        self
    }

    /// Builds the configured `Client`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn build(self) -> Result<Client> {
        let http_client = match self.http_client {
            Some(client) => client,
            None => reqwest::Client::builder().build().map_err(|e| {
                Error::ConfigurationError(format!("Failed to build HTTP client: {}", e))
            })?,
        };

        Ok(Client {
            inner: Arc::new(ClientInner {
                http_client,
                base_path: self.base_path,
                base_port: self.base_port,
                decoder: self.decoder,
                default_headers: self.default_headers,
                timeout: self.timeout,
                adapter: self.adapter,
                inspector: self.inspector,
                context_provider: self.context_provider,
                reject_error_status: self.reject_error_status,
            }),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
