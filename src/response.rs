//! Response wrapper that preserves both decoded data and raw response details.
//!
//! [`Client::call`](crate::Client::call) returns a [`Response`] so callers can
//! reach the status, headers, latency and raw body next to the decoded value.
//! [`Client::send`](crate::Client::send) returns only the value.

use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use std::borrow::Cow;
use std::time::Duration;

/// A decoded response together with its HTTP metadata.
///
/// # Type Parameters
///
/// * `T` - The type of the decoded response data
///
/// # Examples
///
/// ```no_run
/// use courier::{validate, Client, RequestDescriptor};
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct User {
///     id: u64,
///     name: String,
/// }
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = Client::builder()
///     .base_url("https://api.example.com")?
///     .validate(validate::success_status())
///     .build()?;
///
/// let response = client
///     .call(&RequestDescriptor::<User>::get().with_path("/users/123"))
///     .await?;
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
    pub raw_body: Bytes,

    /// The HTTP status code of the response.
    pub status: StatusCode,

    /// The response headers.
    pub headers: HeaderMap,

    /// Time from handing the request to the transport until the response
    /// body was fully received.
    pub latency: Duration,
}

impl<T> Response<T> {
    /// Creates a new `Response`.
    pub fn new(
        data: T,
        raw_body: Bytes,
        status: StatusCode,
        headers: HeaderMap,
        latency: Duration,
    ) -> Self {
        Self {
            data,
            raw_body,
            status,
            headers,
            latency,
        }
    }

    /// Maps the response data to a different type, keeping the metadata.
    ///
    /// # Examples
    ///
    /// ```
    /// # use courier::Response;
    /// # use bytes::Bytes;
    /// # use http::{HeaderMap, StatusCode};
    /// # use std::time::Duration;
    /// let response = Response::new(
    ///     42,
    ///     Bytes::from_static(b"42"),
    ///     StatusCode::OK,
    ///     HeaderMap::new(),
    ///     Duration::from_millis(100),
    /// );
    ///
    /// let string_response = response.map(|n| n.to_string());
    /// assert_eq!(string_response.data, "42");
    /// ```
    pub fn map<U, F>(self, f: F) -> Response<U>
    where
        F: FnOnce(T) -> U,
    {
        Response {
            data: f(self.data),
            raw_body: self.raw_body,
            status: self.status,
            headers: self.headers,
            latency: self.latency,
        }
    }

    /// Consumes the response, returning only the data.
    pub fn into_data(self) -> T {
        self.data
    }

    /// The raw body as text, with invalid UTF-8 replaced.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.raw_body)
    }

    /// Returns a header value by name.
    ///
    /// # Examples
    ///
    /// ```
    /// # use courier::Response;
    /// # use bytes::Bytes;
    /// # use http::{HeaderMap, HeaderValue, StatusCode};
    /// # use std::time::Duration;
    /// let mut headers = HeaderMap::new();
    /// headers.insert("content-type", HeaderValue::from_static("application/json"));
    ///
    /// let response = Response::new((), Bytes::new(), StatusCode::OK, headers, Duration::ZERO);
    ///
    /// assert_eq!(response.header("content-type"), Some("application/json"));
    /// ```
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
