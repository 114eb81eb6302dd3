//! Declarative request descriptions.
//!
//! A [`Request`] says what to call and what comes back: method, optional path
//! suffix, extra headers, an optional body, an optional hook that adjusts the
//! final [`WireRequest`], and an optional transform that replaces the client's
//! default decoder. [`RequestDescriptor`] is a ready-made implementation built
//! with chained `with_*` calls; API crates typically implement [`Request`] on
//! their own types instead.

use crate::body::RequestBody;
use crate::error::BoxError;
use crate::transport::WireRequest;
use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// String header fields.
///
/// Keys keep the spelling they were given. When sources are merged, a key also
/// replaces its case variants from earlier sources.
pub type HeaderFields = HashMap<String, String>;

/// Response metadata handed to transforms and validators next to the body.
#[derive(Debug, Clone, Copy)]
pub struct ResponseParts<'a> {
    /// The HTTP status code.
    pub status: StatusCode,
    /// The response headers.
    pub headers: &'a HeaderMap,
}

/// The description of one API call.
///
/// Only [`method`](Request::method) is required; everything else defaults to
/// "nothing extra".
///
/// # Examples
///
/// ```
/// use courier::{Request, body::{JsonBody, RequestBody}};
/// use http::Method;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Serialize)]
/// struct NewUser { name: String }
///
/// #[derive(Deserialize)]
/// struct User { id: u64 }
///
/// struct CreateUser(JsonBody<NewUser>);
///
/// impl Request for CreateUser {
///     type Response = User;
///
///     fn method(&self) -> Method { Method::POST }
///     fn path(&self) -> Option<&str> { Some("/users") }
///     fn body(&self) -> Option<&dyn RequestBody> { Some(&self.0) }
/// }
/// ```
pub trait Request: Send + Sync {
    /// The decoded response type.
    type Response: DeserializeOwned;

    /// The HTTP method.
    fn method(&self) -> Method;

    /// Appended verbatim to the client's base URL.
    fn path(&self) -> Option<&str> {
        None
    }

    /// Headers specific to this request.
    fn headers(&self) -> HeaderFields {
        HeaderFields::new()
    }

    /// The payload to send.
    fn body(&self) -> Option<&dyn RequestBody> {
        None
    }

    /// Adjusts the assembled wire request before the client's own hook runs.
    fn prepare(&self, request: WireRequest) -> WireRequest {
        request
    }

    /// Custom decoding. Returning `Some` bypasses the client's decoder.
    fn transform(
        &self,
        _body: &Bytes,
        _parts: ResponseParts<'_>,
    ) -> Option<Result<Self::Response, BoxError>> {
        None
    }
}

type PrepareFn = Arc<dyn Fn(WireRequest) -> WireRequest + Send + Sync>;
type TransformFn<R> =
    Arc<dyn Fn(&Bytes, ResponseParts<'_>) -> Result<R, BoxError> + Send + Sync>;

/// An immutable, general-purpose [`Request`].
///
/// # Examples
///
/// ```
/// use courier::{body::FormBody, RequestDescriptor};
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct Token { access_token: String }
///
/// let request = RequestDescriptor::<Token>::post()
///     .with_path("/oauth/token")
///     .with_header("Accept", "application/json")
///     .with_body(FormBody::new([("grant_type", "client_credentials")]));
/// ```
pub struct RequestDescriptor<R> {
    method: Method,
    path: Option<String>,
    headers: HeaderFields,
    body: Option<Arc<dyn RequestBody>>,
    prepare: Option<PrepareFn>,
    transform: Option<TransformFn<R>>,
    _response: PhantomData<fn() -> R>,
}

impl<R> RequestDescriptor<R> {
    /// Creates a descriptor for `method` with no path, headers or body.
    pub fn new(method: Method) -> Self {
        Self {
            method,
            path: None,
            headers: HeaderFields::new(),
            body: None,
            prepare: None,
            transform: None,
            _response: PhantomData,
        }
    }

    /// A `GET` request.
    pub fn get() -> Self {
        Self::new(Method::GET)
    }

    /// A `POST` request.
    pub fn post() -> Self {
        Self::new(Method::POST)
    }

    /// A `PUT` request.
    pub fn put() -> Self {
        Self::new(Method::PUT)
    }

    /// A `PATCH` request.
    pub fn patch() -> Self {
        Self::new(Method::PATCH)
    }

    /// A `DELETE` request.
    pub fn delete() -> Self {
        Self::new(Method::DELETE)
    }

    /// Sets the path appended to the base URL.
    ///
    /// The path is appended to the base URL string as written, query string
    /// included. The result is then parsed as a URL, which resolves `.` and
    /// `..` segments: `/a/../b` is sent as `/b`.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Adds a header, replacing any earlier value for the same key.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Adds several headers.
    pub fn with_headers(mut self, headers: impl IntoIterator<Item = (String, String)>) -> Self {
        self.headers.extend(headers);
        self
    }

    /// Sets the body.
    pub fn with_body(mut self, body: impl RequestBody + 'static) -> Self {
        self.body = Some(Arc::new(body));
        self
    }

    /// Sets the request-level prepare hook.
    pub fn with_prepare<F>(mut self, prepare: F) -> Self
    where
        F: Fn(WireRequest) -> WireRequest + Send + Sync + 'static,
    {
        self.prepare = Some(Arc::new(prepare));
        self
    }

    /// Replaces default decoding with `transform`.
    ///
    /// # Examples
    ///
    /// ```
    /// use courier::RequestDescriptor;
    ///
    /// let request = RequestDescriptor::<String>::get()
    ///     .with_path("/robots.txt")
    ///     .with_transform(|body, _parts| Ok(String::from_utf8(body.to_vec())?));
    /// ```
    pub fn with_transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(&Bytes, ResponseParts<'_>) -> Result<R, BoxError> + Send + Sync + 'static,
    {
        self.transform = Some(Arc::new(transform));
        self
    }
}

impl RequestDescriptor<EmptyResponse> {
    /// Ignores whatever the server sends back.
    ///
    /// Useful for `204 No Content` style endpoints, whose empty body the JSON
    /// decoder would reject.
    pub fn discarding_body(self) -> Self {
        self.with_transform(|_, _| Ok(EmptyResponse))
    }
}

impl<R> Clone for RequestDescriptor<R> {
    fn clone(&self) -> Self {
        Self {
            method: self.method.clone(),
            path: self.path.clone(),
            headers: self.headers.clone(),
            body: self.body.clone(),
            prepare: self.prepare.clone(),
            transform: self.transform.clone(),
            _response: PhantomData,
        }
    }
}

impl<R> fmt::Debug for RequestDescriptor<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestDescriptor")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("headers", &self.headers)
            .field("body", &self.body.as_ref().map(|b| b.to_string()))
            .field("prepare", &self.prepare.is_some())
            .field("transform", &self.transform.is_some())
            .finish()
    }
}

impl<R: DeserializeOwned> Request for RequestDescriptor<R> {
    type Response = R;

    fn method(&self) -> Method {
        self.method.clone()
    }

    fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    fn headers(&self) -> HeaderFields {
        self.headers.clone()
    }

    fn body(&self) -> Option<&dyn RequestBody> {
        self.body.as_deref()
    }

    fn prepare(&self, request: WireRequest) -> WireRequest {
        match &self.prepare {
            Some(prepare) => prepare(request),
            None => request,
        }
    }

    fn transform(
        &self,
        body: &Bytes,
        parts: ResponseParts<'_>,
    ) -> Option<Result<R, BoxError>> {
        self.transform.as_ref().map(|transform| transform(body, parts))
    }
}

/// A response type for calls whose payload does not matter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct EmptyResponse;
