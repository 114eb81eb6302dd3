//! The network boundary.
//!
//! The pipeline never touches sockets itself. It hands a fully prepared
//! [`WireRequest`] to a [`Transport`] and gets back a [`RawResponse`] or a
//! [`TransportError`] whose [`kind`](TransportError::kind) decides how the
//! failure is reported to the caller.
//!
//! [`ReqwestTransport`] is the default implementation. Tests and embedders can
//! supply their own.

use crate::error::BoxError;
use crate::request::HeaderFields;
use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use url::Url;

/// The fully resolved request about to be sent.
///
/// Built fresh for every call. Only the request's and the client's prepare
/// hooks may change it, and nothing touches it after it is handed to the
/// transport.
#[derive(Debug, Clone, PartialEq)]
pub struct WireRequest {
    /// Absolute request URL.
    pub url: Url,
    /// HTTP method.
    pub method: Method,
    /// Final merged headers. Keys are compared case-sensitively here;
    /// transports normalize them.
    pub headers: HeaderFields,
    /// Encoded body, `None` when the request carries no body.
    pub body: Option<Bytes>,
}

impl WireRequest {
    /// Creates a request with no headers and no body.
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderFields::new(),
            body: None,
        }
    }

    /// Converts the string header map into an [`http::HeaderMap`].
    ///
    /// Header names are case-insensitive on the wire, so keys differing only
    /// in case collapse into one header. Keys are applied in byte order and
    /// the last one wins, which makes `x-id` beat `X-Id`.
    ///
    /// # Errors
    ///
    /// Returns an [`TransportErrorKind::InvalidRequest`] error if a name or
    /// value is not a valid HTTP header.
    pub fn header_map(&self) -> Result<HeaderMap, TransportError> {
        let mut fields: Vec<_> = self.headers.iter().collect();
        fields.sort_unstable_by(|a, b| a.0.cmp(b.0));

        let mut map = HeaderMap::with_capacity(fields.len());
        for (name, value) in fields {
            let name = HeaderName::try_from(name.as_str())
                .map_err(TransportError::invalid_request)?;
            let value = HeaderValue::try_from(value.as_str())
                .map_err(TransportError::invalid_request)?;
            map.insert(name, value);
        }
        Ok(map)
    }
}

/// What the transport got back: status, headers and the complete body.
#[derive(Debug, Clone)]
pub struct RawResponse {
    /// The HTTP status code.
    pub status: StatusCode,
    /// The response headers.
    pub headers: HeaderMap,
    /// The complete response body.
    pub body: Bytes,
}

/// Performs the actual network exchange.
///
/// Implementations must be cancel-safe: dropping the returned future aborts
/// the exchange.
pub trait Transport: Send + Sync + 'static {
    /// Sends `request` and waits for the complete response.
    fn perform(
        &self,
        request: WireRequest,
    ) -> impl Future<Output = Result<RawResponse, TransportError>> + Send;
}

/// The class of a transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportErrorKind {
    /// The request could not be constructed or sent as given.
    InvalidRequest,
    /// The exchange took too long.
    Timeout,
    /// The exchange was cancelled by the caller.
    Cancelled,
    /// Connecting to, or talking with, the remote end failed.
    Connection,
    /// Anything else.
    Other,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransportErrorKind::InvalidRequest => "invalid request",
            TransportErrorKind::Timeout => "timed out",
            TransportErrorKind::Cancelled => "cancelled",
            TransportErrorKind::Connection => "connection failed",
            TransportErrorKind::Other => "transport failure",
        };
        f.write_str(s)
    }
}

/// A failed network exchange.
#[derive(thiserror::Error, Debug)]
#[error("{kind}")]
pub struct TransportError {
    kind: TransportErrorKind,
    #[source]
    source: Option<BoxError>,
}

impl TransportError {
    /// Creates an error of the given kind with an underlying cause.
    pub fn new(kind: TransportErrorKind, source: impl Into<BoxError>) -> Self {
        Self {
            kind,
            source: Some(source.into()),
        }
    }

    /// Creates an error of the given kind without a cause.
    pub fn from_kind(kind: TransportErrorKind) -> Self {
        Self { kind, source: None }
    }

    /// The request could not be built.
    pub fn invalid_request(source: impl Into<BoxError>) -> Self {
        Self::new(TransportErrorKind::InvalidRequest, source)
    }

    /// The exchange timed out.
    pub fn timeout() -> Self {
        Self::from_kind(TransportErrorKind::Timeout)
    }

    /// The exchange was cancelled.
    pub fn cancelled() -> Self {
        Self::from_kind(TransportErrorKind::Cancelled)
    }

    /// Returns the failure class.
    pub fn kind(&self) -> TransportErrorKind {
        self.kind
    }
}

/// A [`Transport`] backed by a pooled `reqwest::Client`.
///
/// # Examples
///
/// ```no_run
/// use courier::ReqwestTransport;
/// use std::time::Duration;
///
/// let transport = ReqwestTransport::new()
///     .expect("TLS backend available")
///     .with_timeout(Duration::from_secs(30));
/// ```
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http_client: reqwest::Client,
    timeout: Option<Duration>,
}

impl ReqwestTransport {
    /// Creates a transport with a fresh `reqwest::Client`.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialized.
    pub fn new() -> Result<Self, reqwest::Error> {
        let http_client = reqwest::Client::builder().build()?;
        Ok(Self::from_client(http_client))
    }

    /// Wraps an existing `reqwest::Client`, sharing its connection pool.
    pub fn from_client(http_client: reqwest::Client) -> Self {
        Self {
            http_client,
            timeout: None,
        }
    }

    /// Sets the timeout applied to every request.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl Transport for ReqwestTransport {
    async fn perform(&self, request: WireRequest) -> Result<RawResponse, TransportError> {
        let headers = request.header_map()?;

        let mut builder = self
            .http_client
            .request(request.method, request.url)
            .headers(headers);

        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(classify)?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(classify)?;

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}

fn classify(error: reqwest::Error) -> TransportError {
    let kind = if error.is_builder() {
        TransportErrorKind::InvalidRequest
    } else if error.is_timeout() {
        TransportErrorKind::Timeout
    } else if error.is_connect() || error.is_request() || error.is_body() {
        TransportErrorKind::Connection
    } else {
        TransportErrorKind::Other
    };
    TransportError::new(kind, error)
}
