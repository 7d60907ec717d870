//! Response types.
//!
//! [`Response`] wraps the decoded data together with the raw body and
//! metadata of the HTTP exchange. [`ResponseHead`] is the status line and
//! headers alone, as handed to a
//! [`ResponseInspector`](crate::hooks::ResponseInspector).

use crate::store::StoreError;
use http::{HeaderMap, StatusCode};
use std::time::Duration;
use url::Url;

/// Status, headers and final URL of a response.
#[derive(Debug, Clone)]
pub struct ResponseHead {
    /// The HTTP status code.
    pub status: StatusCode,

    /// The response headers.
    pub headers: HeaderMap,

    /// The URL the response came from, after redirects.
    pub url: Url,
}

/// A completed API call.
///
/// # Type Parameters
///
/// * `T` - The decoded data; `()` for calls made with
///   [`send_raw`](crate::RequestBuilder::send_raw)
///
/// # Examples
///
/// ```no_run
/// use laze::Client;
/// use serde::Deserialize;
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
///     .build()?;
///
/// let response = client.get("/users/123").send::<User>().await?;
///
/// println!("User: {}", response.data.name);
/// println!("Request took {:?}", response.latency);
/// println!("Status: {}", response.status);
///
/// if response.latency > std::time::Duration::from_secs(1) {
///     println!("Slow response body: {}", response.text());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Response<T> {
    /// The decoded response data.
    pub data: T,

    /// The raw response body.
    pub body: Vec<u8>,

    /// The HTTP status code of the response.
    pub status: StatusCode,

    /// The response headers.
    pub headers: HeaderMap,

    /// The URL the response came from.
    pub url: Url,

    /// Time from sending the request until the body was read.
    pub latency: Duration,

    /// Set when persisting the decoded data failed.
    ///
    /// The decoded data is still valid; only the local store update did not
    /// happen. Always `None` for calls that do not synchronize.
    pub sync_error: Option<StoreError>,
}

impl<T> Response<T> {
    pub(crate) fn new(data: T, head: ResponseHead, body: Vec<u8>, latency: Duration) -> Self {
        Self {
            data,
            body,
            status: head.status,
            headers: head.headers,
            url: head.url,
            latency,
            sync_error: None,
        }
    }

    /// Maps the response data to a different type using the provided function.
    ///
    /// Metadata and the raw body are carried over unchanged.
    pub fn map<U, F>(self, f: F) -> Response<U>
    where
        F: FnOnce(T) -> U,
    {
        Response {
            data: f(self.data),
            body: self.body,
            status: self.status,
            headers: self.headers,
            url: self.url,
            latency: self.latency,
            sync_error: self.sync_error,
        }
    }

    /// The raw body as text, with invalid UTF-8 replaced.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Returns `true` unless persisting the data failed.
    pub fn is_synced(&self) -> bool {
        self.sync_error.is_none()
    }

    /// Returns a header value by name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }
}

impl<T> AsRef<T> for Response<T> {
    fn as_ref(&self) -> &T {
        &self.data
    }
}

impl<T> std::ops::Deref for Response<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}
