//! The typed client and its request pipeline.
//!
//! The [`Client`] type is the main entry point for making calls. Use
//! [`ClientBuilder`] to configure and create clients.
//!
//! Every call runs the same pipeline, whichever delivery model the caller
//! picks ([`Client::send`], [`Client::send_with_cancel`] or a cold
//! [`Publisher`] stream):
//!
//! 1. resolve the URL (base URL + request path, appended verbatim)
//! 2. encode the body, unless it is absent or empty
//! 3. merge headers (defaults < request < body < basic auth)
//! 4. run the request's prepare hook, then the client's
//! 5. hand the wire request to the [`Transport`]
//! 6. validate the response
//! 7. decode it, through the request's transform if it has one
//!
//! The first failing step ends the call.

use crate::{
    body::RequestBody,
    decode::{Decoder, JsonDecoder},
    headers::{self, BasicAuth},
    observe::{CallObserver, Stage, TracingObserver},
    request::{HeaderFields, Request, RequestDescriptor, ResponseParts},
    transport::{ReqwestTransport, Transport, TransportError, WireRequest},
    validate::Validator,
    BuildError, ClientError, RequestError, Response,
};
use futures::stream::{self, BoxStream, StreamExt};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use url::Url;

type PrepareFn = Arc<dyn Fn(WireRequest) -> WireRequest + Send + Sync>;

/// A typed API client.
///
/// The client is cheap to clone and safe to share between tasks: all
/// configuration is fixed at construction and every call builds its own wire
/// request.
///
/// # Type Parameters
///
/// * `E` - The error produced by the client's validator
/// * `T` - The transport performing the network exchange
/// * `D` - The decoder used when a request has no transform
///
/// # Examples
///
/// ```no_run
/// use courier::{body::JsonBody, validate, Client, RequestDescriptor};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Serialize)]
/// struct CreateUser {
///     name: String,
///     email: String,
/// }
///
/// #[derive(Deserialize)]
/// struct User {
///     id: u64,
///     name: String,
///     email: String,
/// }
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = Client::builder()
///     .base_url("https://api.example.com")?
///     .default_header("User-Agent", "my-app/1.0")
///     .validate(validate::success_status())
///     .build()?;
///
/// let user: User = client
///     .send(&RequestDescriptor::get().with_path("/users/123"))
///     .await?;
/// println!("User: {}", user.name);
///
/// let request = RequestDescriptor::<User>::post()
///     .with_path("/users")
///     .with_body(JsonBody::new(CreateUser {
///         name: "Alice".to_string(),
///         email: "alice@example.com".to_string(),
///     }));
/// let created = client.send(&request).await?;
/// println!("Created user with ID: {}", created.id);
/// # Ok(())
/// # }
/// ```
pub struct Client<E, T = ReqwestTransport, D = JsonDecoder> {
    inner: Arc<ClientInner<E, T, D>>,
}

struct ClientInner<E, T, D> {
    transport: T,
    base_url: String,
    default_headers: HeaderFields,
    decoder: D,
    basic_auth: Option<BasicAuth>,
    validate: Validator<E>,
    prepare: Option<PrepareFn>,
    observer: Arc<dyn CallObserver>,
}

impl<E, T, D> Clone for Client<E, T, D> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E, T, D> fmt::Debug for Client<E, T, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.inner.base_url)
            .field("default_headers", &self.inner.default_headers)
            .field("basic_auth", &self.inner.basic_auth)
            .finish_non_exhaustive()
    }
}

impl<E> Client<E> {
    /// Creates a new `ClientBuilder` for configuring a client.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use courier::{validate, Client};
    ///
    /// # fn example() -> Result<(), courier::BuildError> {
    /// let client = Client::builder()
    ///     .base_url("https://api.example.com")?
    ///     .validate(validate::success_status())
    ///     .build()?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn builder() -> ClientBuilder<E> {
        ClientBuilder::new()
    }
}

impl<E, T, D> Client<E, T, D>
where
    E: fmt::Debug + Send + 'static,
    T: Transport,
    D: Decoder,
{
    /// The base URL every request path is appended to.
    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    /// Sends `request` and returns the decoded value.
    ///
    /// Dropping the returned future aborts the transport call.
    ///
    /// # Errors
    ///
    /// Returns the [`ClientError`] variant of the first stage that failed.
    pub async fn send<R: Request>(&self, request: &R) -> Result<R::Response, ClientError<E>> {
        self.execute(request, None).await.map(Response::into_data)
    }

    /// Like [`send`](Self::send), but keeps the response metadata.
    ///
    /// # Errors
    ///
    /// Returns the [`ClientError`] variant of the first stage that failed.
    pub async fn call<R: Request>(
        &self,
        request: &R,
    ) -> Result<Response<R::Response>, ClientError<E>> {
        self.execute(request, None).await
    }

    /// Sends `request`, aborting the transport call if `cancel` fires first.
    ///
    /// A cancelled call fails with
    /// `ClientError::Request(RequestError::Transport(_))`; validation and
    /// decoding never run for it.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use courier::{validate, Client, RequestDescriptor};
    /// use tokio_util::sync::CancellationToken;
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let client = Client::builder()
    ///     .base_url("https://api.example.com")?
    ///     .validate(validate::success_status())
    ///     .build()?;
    ///
    /// let cancel = CancellationToken::new();
    /// let request = RequestDescriptor::<serde_json::Value>::get().with_path("/slow");
    ///
    /// let guard = cancel.clone();
    /// tokio::spawn(async move {
    ///     tokio::time::sleep(std::time::Duration::from_secs(1)).await;
    ///     guard.cancel();
    /// });
    ///
    /// let result = client.send_with_cancel(&request, &cancel).await;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// Returns the [`ClientError`] variant of the first stage that failed.
    pub async fn send_with_cancel<R: Request>(
        &self,
        request: &R,
        cancel: &CancellationToken,
    ) -> Result<R::Response, ClientError<E>> {
        self.execute(request, Some(cancel))
            .await
            .map(Response::into_data)
    }

    /// Makes a `GET` request to `path`, decoding the body with the client's decoder.
    ///
    /// # Errors
    ///
    /// Returns the [`ClientError`] variant of the first stage that failed.
    pub async fn get<Res>(&self, path: impl Into<String>) -> Result<Res, ClientError<E>>
    where
        Res: DeserializeOwned,
    {
        self.send(&RequestDescriptor::get().with_path(path)).await
    }

    /// Makes a `POST` request to `path` with a JSON body.
    ///
    /// # Errors
    ///
    /// Returns the [`ClientError`] variant of the first stage that failed.
    pub async fn post<B, Res>(&self, path: impl Into<String>, body: B) -> Result<Res, ClientError<E>>
    where
        B: Serialize + fmt::Debug + Send + Sync + 'static,
        Res: DeserializeOwned,
    {
        let request = RequestDescriptor::post()
            .with_path(path)
            .with_body(crate::body::JsonBody::new(body));
        self.send(&request).await
    }

    /// Wraps `request` in a cold [`Publisher`].
    ///
    /// Nothing happens until a subscription is polled.
    pub fn publisher<R>(&self, request: R) -> Publisher<R, E, T, D>
    where
        R: Request + 'static,
    {
        Publisher {
            client: self.clone(),
            request: Arc::new(request),
            retry_once: false,
        }
    }

    /// A single cold subscription to `request`.
    ///
    /// Shorthand for `self.publisher(request).subscribe()`.
    pub fn stream<R>(&self, request: R) -> BoxStream<'static, Result<R::Response, ClientError<E>>>
    where
        R: Request + 'static,
        R::Response: Send + 'static,
    {
        self.publisher(request).subscribe()
    }

    /// Steps 1-4: everything before the transport.
    fn wire_request<R: Request>(&self, request: &R) -> Result<WireRequest, ClientError<E>> {
        let url = self.resolve_url(request.path())?;

        let body: Option<&dyn RequestBody> = request.body().filter(|body| !body.is_empty());
        let (bytes, body_headers) = match body {
            Some(body) => (
                Some(body.encode().map_err(ClientError::Encoding)?),
                body.headers(),
            ),
            None => (None, HeaderFields::new()),
        };

        let headers = headers::resolve(
            &self.inner.default_headers,
            request.headers(),
            body_headers,
            self.inner.basic_auth.as_ref(),
        );

        let wire = WireRequest {
            url,
            method: request.method(),
            headers,
            body: bytes,
        };

        let wire = request.prepare(wire);
        Ok(match &self.inner.prepare {
            Some(prepare) => prepare(wire),
            None => wire,
        })
    }

    // Parsing resolves dot segments; everything else in the path survives as written.
    fn resolve_url(&self, path: Option<&str>) -> Result<Url, ClientError<E>> {
        let raw = match path {
            Some(path) if !path.is_empty() => format!("{}{}", self.inner.base_url, path),
            _ => self.inner.base_url.clone(),
        };
        Url::parse(&raw)
            .map_err(|e| ClientError::Request(RequestError::InvalidRequest(Box::new(e))))
    }

    /// The shared pipeline behind every delivery model.
    async fn execute<R: Request>(
        &self,
        request: &R,
        cancel: Option<&CancellationToken>,
    ) -> Result<Response<R::Response>, ClientError<E>> {
        let wire = self
            .wire_request(request)
            .map_err(|e| self.failed(Stage::Encoding, e))?;

        let body = request.body().filter(|body| !body.is_empty());
        self.inner.observer.on_request(&wire, body);

        let method = wire.method.clone();
        let url = wire.url.clone();
        let start_time = Instant::now();

        let perform = self.inner.transport.perform(wire);
        let outcome = match cancel {
            Some(cancel) => {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(TransportError::cancelled()),
                    outcome = perform => outcome,
                }
            }
            None => perform.await,
        };

        let raw = outcome
            .map_err(|e| self.failed(Stage::Request, ClientError::Request(e.into())))?;
        let latency = start_time.elapsed();

        self.inner
            .observer
            .on_response(&method, &url, raw.status, latency);

        let parts = ResponseParts {
            status: raw.status,
            headers: &raw.headers,
        };

        (self.inner.validate)(&raw.body, parts)
            .map_err(|e| self.failed(Stage::Response, ClientError::Response(e)))?;

        let decoded = match request.transform(&raw.body, parts) {
            Some(transformed) => transformed,
            None => self.inner.decoder.decode(&raw.body),
        };

        let data = decoded.map_err(|source| {
            self.failed(
                Stage::Decoding,
                ClientError::Decoding {
                    status: raw.status,
                    raw_response: String::from_utf8_lossy(&raw.body).into_owned(),
                    source,
                },
            )
        })?;

        Ok(Response::new(data, raw.body, raw.status, raw.headers, latency))
    }

    fn failed(&self, stage: Stage, error: ClientError<E>) -> ClientError<E> {
        // Encoding-stage errors may also be URL failures
        let stage = match (&error, stage) {
            (ClientError::Request(_), Stage::Encoding) => Stage::Request,
            _ => stage,
        };
        self.inner.observer.on_failure(stage, &error);
        error
    }
}

/// A cold, re-subscribable call.
///
/// Each [`subscribe`](Publisher::subscribe) returns a stream that runs the
/// full pipeline when first polled, yields exactly one item, and ends.
/// Dropping the stream before it yields aborts the transport call and emits
/// nothing.
///
/// With [`retry_once`](Publisher::retry_once), a subscription whose call
/// failed at the transport runs the pipeline one more time before yielding.
///
/// # Examples
///
/// ```no_run
/// use courier::{validate, Client, RequestDescriptor};
/// use futures::StreamExt;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = Client::builder()
///     .base_url("https://api.example.com")?
///     .validate(validate::success_status())
///     .build()?;
///
/// let publisher = client.publisher(RequestDescriptor::<serde_json::Value>::get().with_path("/status"));
///
/// let mut first = publisher.subscribe();
/// while let Some(result) = first.next().await {
///     println!("{:?}", result);
/// }
///
/// // A fresh subscription runs the call again.
/// let mut second = publisher.subscribe();
/// let _ = second.next().await;
/// # Ok(())
/// # }
/// ```
pub struct Publisher<R, E, T = ReqwestTransport, D = JsonDecoder> {
    client: Client<E, T, D>,
    request: Arc<R>,
    retry_once: bool,
}

impl<R, E, T, D> Clone for Publisher<R, E, T, D> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            request: Arc::clone(&self.request),
            retry_once: self.retry_once,
        }
    }
}

impl<R, E, T, D> Publisher<R, E, T, D>
where
    R: Request + 'static,
    R::Response: Send + 'static,
    E: fmt::Debug + Send + 'static,
    T: Transport,
    D: Decoder,
{
    /// Re-runs a subscription once when its call fails at the transport.
    ///
    /// Only `ClientError::Request(RequestError::Transport(_))` triggers the
    /// second run, and its outcome is what the subscription yields. Encoding,
    /// validation and decoding failures are yielded as they are.
    pub fn retry_once(mut self) -> Self {
        self.retry_once = true;
        self
    }

    /// Starts a new subscription.
    pub fn subscribe(&self) -> BoxStream<'static, Result<R::Response, ClientError<E>>> {
        let client = self.client.clone();
        let request = Arc::clone(&self.request);
        let retry_once = self.retry_once;

        stream::once(async move {
            match client.send(&*request).await {
                Err(ClientError::Request(RequestError::Transport(e))) if retry_once => {
                    tracing::warn!(error = %e, "Transport failed, re-subscribing once");
                    client.send(&*request).await
                }
                result => result,
            }
        })
        .boxed()
    }

    /// The request every subscription sends.
    pub fn request(&self) -> &R {
        &self.request
    }
}

/// Builder for configuring and creating a [`Client`].
///
/// A base URL and a validator are required; everything else has a default.
///
/// # Examples
///
/// ```no_run
/// use courier::{validate, ClientBuilder};
/// use std::time::Duration;
///
/// # fn example() -> Result<(), courier::BuildError> {
/// let client = ClientBuilder::new()
///     .base_url("https://api.example.com")?
///     .timeout(Duration::from_secs(30))
///     .default_header("User-Agent", "my-app/1.0")
///     .basic_auth("user", "secret")
///     .validate(validate::success_status())
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder<E, T = ReqwestTransport, D = JsonDecoder> {
    transport: Result<T, BuildError>,
    base_url: Option<String>,
    default_headers: HeaderFields,
    decoder: D,
    basic_auth: Option<BasicAuth>,
    validate: Option<Validator<E>>,
    prepare: Option<PrepareFn>,
    observer: Arc<dyn CallObserver>,
}

impl<E> ClientBuilder<E> {
    /// Creates a builder using [`ReqwestTransport`] and [`JsonDecoder`].
    pub fn new() -> Self {
        let transport =
            ReqwestTransport::new().map_err(|e| BuildError::Transport(Box::new(e)));
        Self {
            transport,
            base_url: None,
            default_headers: HeaderFields::new(),
            decoder: JsonDecoder,
            basic_auth: None,
            validate: None,
            prepare: None,
            observer: Arc::new(TracingObserver),
        }
    }
}

impl<E> Default for ClientBuilder<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E, D> ClientBuilder<E, ReqwestTransport, D> {
    /// Sets the timeout of the default transport.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.transport = self.transport.map(|t| t.with_timeout(timeout));
        self
    }
}

impl<E, T, D> ClientBuilder<E, T, D> {
    /// Sets the base URL for all requests.
    ///
    /// Request paths are appended to it verbatim, so `https://api.example.com`
    /// with path `/users` yields `https://api.example.com/users`. The joined
    /// string is parsed as a URL, so dot segments are resolved: `/a/../b`
    /// becomes `/b`.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn base_url(mut self, url: impl AsRef<str>) -> Result<Self, BuildError> {
        Url::parse(url.as_ref())?;
        self.base_url = Some(url.as_ref().to_string());
        Ok(self)
    }

    /// Adds a header sent with every request unless the request overrides it.
    pub fn default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.insert(name.into(), value.into());
        self
    }

    /// Adds several default headers.
    pub fn default_headers(mut self, headers: impl IntoIterator<Item = (String, String)>) -> Self {
        self.default_headers.extend(headers);
        self
    }

    /// Sends an `Authorization: Basic` header with every request.
    pub fn basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.basic_auth = Some(BasicAuth::new(username, password));
        self
    }

    /// Sets the validator run on every response the transport returns.
    pub fn validate<F>(mut self, validate: F) -> Self
    where
        F: Fn(&bytes::Bytes, ResponseParts<'_>) -> Result<(), E> + Send + Sync + 'static,
    {
        self.validate = Some(Arc::new(validate));
        self
    }

    /// Sets the client-wide prepare hook, run after each request's own hook.
    pub fn prepare<F>(mut self, prepare: F) -> Self
    where
        F: Fn(WireRequest) -> WireRequest + Send + Sync + 'static,
    {
        self.prepare = Some(Arc::new(prepare));
        self
    }

    /// Sets the observer notified of every call's progress.
    ///
    /// Defaults to [`TracingObserver`].
    pub fn observer(mut self, observer: Arc<dyn CallObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Replaces the transport.
    pub fn transport<T2: Transport>(self, transport: T2) -> ClientBuilder<E, T2, D> {
        ClientBuilder {
            transport: Ok(transport),
            base_url: self.base_url,
            default_headers: self.default_headers,
            decoder: self.decoder,
            basic_auth: self.basic_auth,
            validate: self.validate,
            prepare: self.prepare,
            observer: self.observer,
        }
    }

    /// Replaces the decoder.
    pub fn decoder<D2: Decoder>(self, decoder: D2) -> ClientBuilder<E, T, D2> {
        ClientBuilder {
            transport: self.transport,
            base_url: self.base_url,
            default_headers: self.default_headers,
            decoder,
            basic_auth: self.basic_auth,
            validate: self.validate,
            prepare: self.prepare,
            observer: self.observer,
        }
    }

    /// Builds the configured `Client`.
    ///
    /// # Errors
    ///
    /// Returns an error if no base URL or validator was provided, or if the
    /// default transport could not be created.
    pub fn build(self) -> Result<Client<E, T, D>, BuildError> {
        let base_url = self.base_url.ok_or(BuildError::MissingBaseUrl)?;
        let validate = self.validate.ok_or(BuildError::MissingValidator)?;
        let transport = self.transport?;

        Ok(Client {
            inner: Arc::new(ClientInner {
                transport,
                base_url,
                default_headers: self.default_headers,
                decoder: self.decoder,
                basic_auth: self.basic_auth,
                validate,
                prepare: self.prepare,
                observer: self.observer,
            }),
        })
    }
}
