//! Error types for typed API calls.
//!
//! Every call resolves to exactly one [`ClientError`] variant, chosen by the
//! first pipeline stage that failed. Later stages never run once an earlier
//! one has failed, so the variant tells the caller how far the call got:
//!
//! 1. [`ClientError::Encoding`] - the body could not be serialized; nothing was sent.
//! 2. [`ClientError::Request`] - no usable response was obtained from the transport.
//! 3. [`ClientError::Response`] - a response arrived but the client's validator rejected it.
//! 4. [`ClientError::Decoding`] - the response was accepted but could not be decoded.

use http::{HeaderMap, StatusCode};

/// A boxed, thread-safe error used for causes whose concrete type is chosen by
/// a pluggable component (encoders, decoders, transforms, transports).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The error returned by every call made through a [`Client`](crate::Client).
///
/// `E` is the caller-defined error produced by the client's validator when a
/// response is semantically rejected.
///
/// # Examples
///
/// ```no_run
/// use courier::{validate, Client, ClientError, RequestDescriptor, RequestError};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = Client::builder()
///     .base_url("https://api.example.com")?
///     .validate(validate::success_status())
///     .build()?;
///
/// let request = RequestDescriptor::<serde_json::Value>::get().with_path("/endpoint");
///
/// match client.send(&request).await {
///     Ok(value) => println!("Success: {value}"),
///     Err(ClientError::Response(rejected)) => {
///         eprintln!("Rejected with {}: {}", rejected.status, rejected.raw_response);
///     }
///     Err(ClientError::Decoding { raw_response, source, .. }) => {
///         eprintln!("Could not decode {raw_response}: {source}");
///     }
///     Err(ClientError::Request(RequestError::Transport(e))) => {
///         eprintln!("Transport failed, worth retrying: {e}");
///     }
///     Err(e) => eprintln!("Other error: {e}"),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(thiserror::Error, Debug)]
pub enum ClientError<E> {
    /// The request body could not be serialized. No network call was made.
    #[error("Failed to encode request body: {0}")]
    Encoding(#[source] crate::body::BodyError),

    /// The response was received and validated, but decoding it (or running
    /// the request's transform) failed.
    ///
    /// The raw body is kept so the failure can be debugged without re-issuing
    /// the request.
    #[error("Failed to decode response (status {status}): {source}")]
    Decoding {
        /// The HTTP status code of the response
        status: StatusCode,
        /// The raw response body, lossily converted to UTF-8
        raw_response: String,
        /// The decoder or transform error
        #[source]
        source: BoxError,
    },

    /// No usable response was obtained.
    #[error(transparent)]
    Request(#[from] RequestError),

    /// The transport succeeded but the validator rejected the response.
    #[error("Response rejected: {0}")]
    Response(E),
}

impl<E> ClientError<E> {
    /// Returns `true` if issuing the same request again may succeed.
    ///
    /// Only transport-level failures (timeouts, cancellations, connection
    /// problems) are retryable. Rejected responses, local encode/decode
    /// failures and malformed requests are not.
    ///
    /// # Examples
    ///
    /// ```
    /// use courier::{ClientError, RequestError, TransportError};
    ///
    /// let err: ClientError<()> = RequestError::from(TransportError::timeout()).into();
    /// assert!(err.is_retryable());
    ///
    /// let err: ClientError<()> = ClientError::Response(());
    /// assert!(!err.is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Request(RequestError::Transport(_)) => true,
            ClientError::Request(_) => false,
            ClientError::Encoding(_) => false,
            ClientError::Decoding { .. } => false,
            ClientError::Response(_) => false,
        }
    }

    /// Returns the HTTP status code if the call got as far as a response.
    ///
    /// Only `Decoding` carries a status directly; validator errors carry
    /// whatever the caller put in them.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Decoding { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns the raw response body for decoding failures.
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            ClientError::Decoding { raw_response, .. } => Some(raw_response),
            _ => None,
        }
    }

    /// Returns the validator's error if the response was rejected.
    pub fn rejection(&self) -> Option<&E> {
        match self {
            ClientError::Response(e) => Some(e),
            _ => None,
        }
    }
}

/// Why no usable response was obtained.
#[derive(thiserror::Error, Debug)]
pub enum RequestError {
    /// The request could not be constructed (malformed URL, invalid header
    /// name or value, and similar).
    #[error("Invalid request: {0}")]
    InvalidRequest(#[source] BoxError),

    /// The network exchange failed: timeout, cancellation or connection failure.
    #[error("Transport error: {0}")]
    Transport(#[source] crate::transport::TransportError),

    /// Anything the transport reported that fits neither category above.
    #[error("Unknown request error: {0}")]
    Unknown(#[source] BoxError),
}

impl From<crate::transport::TransportError> for RequestError {
    fn from(error: crate::transport::TransportError) -> Self {
        use crate::transport::TransportErrorKind;

        match error.kind() {
            TransportErrorKind::InvalidRequest => RequestError::InvalidRequest(Box::new(error)),
            TransportErrorKind::Timeout
            | TransportErrorKind::Cancelled
            | TransportErrorKind::Connection => RequestError::Transport(error),
            TransportErrorKind::Other => RequestError::Unknown(Box::new(error)),
        }
    }
}

/// The error produced by [`validate::success_status`](crate::validate::success_status)
/// when the server answers with a non-2xx status.
///
/// This error includes the full response details for debugging.
#[derive(thiserror::Error, Debug, Clone)]
#[error("HTTP error {status}: {raw_response}")]
pub struct HttpStatusError {
    /// The HTTP status code
    pub status: StatusCode,
    /// The raw response body
    pub raw_response: String,
    /// The response headers
    pub headers: HeaderMap,
}

/// Errors raised while configuring a [`Client`](crate::Client).
#[derive(thiserror::Error, Debug)]
pub enum BuildError {
    /// `base_url` was never set.
    #[error("Base URL is required")]
    MissingBaseUrl,

    /// The base URL could not be parsed.
    #[error("Invalid base URL: {0}")]
    InvalidBaseUrl(#[from] url::ParseError),

    /// `validate` was never set.
    #[error("A response validator is required")]
    MissingValidator,

    /// The default transport could not be created.
    #[error("Failed to build HTTP transport: {0}")]
    Transport(#[source] BoxError),
}

/// A specialized `Result` type for calls made through a client.
pub type Result<T, E> = std::result::Result<T, ClientError<E>>;
