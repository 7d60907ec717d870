//! Error types for request pipelines.
//!
//! Every stage of a call (URL construction, body encoding, the request
//! adapter, transport, decoding) fails with its own variant, so callers can
//! tell "the request failed" apart from "the request succeeded but the payload
//! was malformed". Persistence failures are not errors of the call; they are
//! reported in [`Response::sync_error`](crate::Response::sync_error).

use http::{HeaderMap, Method, StatusCode};
use url::Url;

/// The main error type for API calls.
///
/// # Examples
///
/// ```no_run
/// use laze::{Client, Error};
///
/// # async fn example() -> Result<(), Error> {
/// let client = Client::builder()
///     .base_path("https://api.example.com")
///     .build()?;
///
/// match client.get("/endpoint").send::<serde_json::Value>().await {
///     Ok(response) => println!("Success: {:?}", response.data),
///     Err(Error::DeserializationFailed { raw_response, source, .. }) => {
///         eprintln!("Failed to decode. Raw response: {}", raw_response);
///         eprintln!("Serde error: {}", source);
///     }
///     Err(Error::Network(e)) => eprintln!("Transport failed: {}", e),
///     Err(e) => eprintln!("Other error: {}", e),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Base path, path and query did not form a valid URL.
    ///
    /// Carries everything that went into the URL for diagnosis. No network
    /// I/O happened.
    #[error("Invalid URL for {method} {path}: {reason}")]
    InvalidUrl {
        /// The request path
        path: String,
        /// The request method
        method: Method,
        /// The query items
        query: Vec<(String, String)>,
        /// A description of the request body
        body: String,
        /// Why the URL was rejected
        reason: String,
    },

    /// Failed to serialize the request body.
    ///
    /// Raised before anything is sent.
    #[error("Failed to serialize request: {0}")]
    SerializationFailed(#[source] serde_json::Error),

    /// The configured request adapter vetoed the request.
    #[error("Client rejected request: {method} {url}")]
    ClientRejected {
        /// The request method
        method: Method,
        /// The request URL
        url: Url,
    },

    /// The HTTP client reported a failure (connection, DNS, TLS, timeout...).
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The response carried no body to decode.
    #[error("Empty response (status {status})")]
    EmptyResponse {
        /// The HTTP status code
        status: StatusCode,
    },

    /// The server returned a non-2xx status.
    ///
    /// Only raised by clients built with
    /// [`reject_error_status`](crate::ClientBuilder::reject_error_status).
    #[error("HTTP error {status}: {raw_response}")]
    HttpError {
        /// The HTTP status code
        status: StatusCode,
        /// The raw response body
        raw_response: String,
        /// The response headers
        headers: HeaderMap,
    },

    /// The response body did not decode into the expected type.
    ///
    /// Preserves the raw body and the decoder error.
    #[error("Failed to deserialize response (status {status}): {source}")]
    DeserializationFailed {
        /// The raw response body that failed to deserialize
        raw_response: String,
        /// The HTTP status code
        status: StatusCode,
        /// The decoder error
        source: serde_json::Error,
    },

    /// Invalid configuration was provided.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// The request was cancelled through its [`RequestHandle`](crate::RequestHandle).
    #[error("Request cancelled")]
    Cancelled,
}

impl Error {
    /// Returns the HTTP status code if this error has one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::HttpError { status, .. } => Some(*status),
            Error::DeserializationFailed { status, .. } => Some(*status),
            Error::EmptyResponse { status } => Some(*status),
            Error::Network(e) => e.status(),
            _ => None,
        }
    }

    /// Returns the raw response body if this error has one.
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            Error::HttpError { raw_response, .. } => Some(raw_response),
            Error::DeserializationFailed { raw_response, .. } => Some(raw_response),
            _ => None,
        }
    }

    /// Returns `true` if the transport timed out.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Network(e) if e.is_timeout())
    }

    /// Returns `true` if a response arrived but could not be decoded.
    pub fn is_decode_error(&self) -> bool {
        matches!(
            self,
            Error::DeserializationFailed { .. } | Error::EmptyResponse { .. }
        )
    }
}

/// A specialized `Result` type for API calls.
pub type Result<T> = std::result::Result<T, Error>;
