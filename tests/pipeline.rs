//! Pipeline ordering tests against an in-process transport.
//!
//! These tests count how often each stage runs, so they can assert that a
//! failing stage short-circuits everything after it.

use bytes::Bytes;
use courier::body::{FormValue, MultipartFormBody};
use courier::decode::{Decoder, JsonDecoder};
use courier::observe::{CallObserver, Stage};
use courier::{
    BoxError, Client, ClientError, RawResponse, RequestDescriptor, RequestError, Transport,
    TransportError, TransportErrorKind, WireRequest,
};
use futures::StreamExt;
use http::{HeaderMap, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

#[derive(Debug, Deserialize, PartialEq)]
struct Greeting {
    message: String,
}

#[derive(Debug, PartialEq)]
enum ApiError {
    NotFound,
    Status(u16),
}

#[derive(Clone)]
enum Reply {
    Respond(u16, &'static str),
    Fail(TransportErrorKind),
    FailOnce(TransportErrorKind, &'static str),
    Hang,
}

#[derive(Clone)]
struct MockTransport {
    reply: Reply,
    calls: Arc<AtomicUsize>,
    seen: Arc<Mutex<Vec<WireRequest>>>,
    dropped: Arc<AtomicBool>,
}

impl MockTransport {
    fn new(reply: Reply) -> Self {
        Self {
            reply,
            calls: Arc::default(),
            seen: Arc::default(),
            dropped: Arc::default(),
        }
    }

    fn last_request(&self) -> WireRequest {
        self.seen.lock().unwrap().last().cloned().unwrap()
    }
}

struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

impl Transport for MockTransport {
    async fn perform(&self, request: WireRequest) -> Result<RawResponse, TransportError> {
        let previous = self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(request);

        match &self.reply {
            Reply::Respond(status, body) => Ok(RawResponse {
                status: StatusCode::from_u16(*status).unwrap(),
                headers: HeaderMap::new(),
                body: Bytes::from_static(body.as_bytes()),
            }),
            Reply::Fail(kind) => Err(TransportError::from_kind(*kind)),
            Reply::FailOnce(kind, _) if previous == 0 => Err(TransportError::from_kind(*kind)),
            Reply::FailOnce(_, body) => Ok(RawResponse {
                status: StatusCode::OK,
                headers: HeaderMap::new(),
                body: Bytes::from_static(body.as_bytes()),
            }),
            Reply::Hang => {
                let _guard = DropFlag(self.dropped.clone());
                std::future::pending().await
            }
        }
    }
}

struct CountingDecoder(Arc<AtomicUsize>);

impl Decoder for CountingDecoder {
    fn decode<T: DeserializeOwned>(&self, body: &[u8]) -> Result<T, BoxError> {
        self.0.fetch_add(1, Ordering::SeqCst);
        JsonDecoder.decode(body)
    }
}

struct Harness {
    client: Client<ApiError, MockTransport, CountingDecoder>,
    transport: MockTransport,
    validations: Arc<AtomicUsize>,
    decodes: Arc<AtomicUsize>,
}

fn harness(reply: Reply) -> Harness {
    harness_with_base("http://api.test", reply)
}

fn harness_with_base(base_url: &str, reply: Reply) -> Harness {
    let transport = MockTransport::new(reply);
    let validations = Arc::new(AtomicUsize::new(0));
    let decodes = Arc::new(AtomicUsize::new(0));

    let counter = validations.clone();
    let client = Client::builder()
        .base_url(base_url)
        .unwrap()
        .transport(transport.clone())
        .decoder(CountingDecoder(decodes.clone()))
        .validate(move |_body, parts| {
            counter.fetch_add(1, Ordering::SeqCst);
            match parts.status.as_u16() {
                404 => Err(ApiError::NotFound),
                s if !(200..300).contains(&s) => Err(ApiError::Status(s)),
                _ => Ok(()),
            }
        })
        .build()
        .unwrap();

    Harness {
        client,
        transport,
        validations,
        decodes,
    }
}

#[tokio::test]
async fn test_default_decoder_used_without_transform() {
    let h = harness(Reply::Respond(200, r#"{"message":"hi"}"#));

    let greeting = h
        .client
        .send(&RequestDescriptor::<Greeting>::get().with_path("/hello"))
        .await
        .unwrap();

    assert_eq!(greeting.message, "hi");
    assert_eq!(h.validations.load(Ordering::SeqCst), 1);
    assert_eq!(h.decodes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_transform_bypasses_decoder() {
    let h = harness(Reply::Respond(200, "plain text"));
    let transforms = Arc::new(AtomicUsize::new(0));

    let counter = transforms.clone();
    let request = RequestDescriptor::<String>::get().with_transform(move |body, _| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(String::from_utf8(body.to_vec())?)
    });

    let text = h.client.send(&request).await.unwrap();

    assert_eq!(text, "plain text");
    assert_eq!(transforms.load(Ordering::SeqCst), 1);
    assert_eq!(h.decodes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_transform_failure_is_decoding_error() {
    let h = harness(Reply::Respond(200, "oops"));

    let request = RequestDescriptor::<String>::get()
        .with_transform(|_, _| Err("not what I expected".into()));

    let err = h.client.send(&request).await.unwrap_err();

    assert!(matches!(err, ClientError::Decoding { .. }));
    assert_eq!(err.raw_response(), Some("oops"));
    assert_eq!(err.status(), Some(StatusCode::OK));
}

#[tokio::test]
async fn test_validation_failure_is_response_error() {
    let h = harness(Reply::Respond(404, r#"{"message":"missing"}"#));

    let err = h
        .client
        .send(&RequestDescriptor::<Greeting>::get())
        .await
        .unwrap_err();

    match err {
        ClientError::Response(ApiError::NotFound) => {}
        other => panic!("Expected Response(NotFound), got {:?}", other),
    }
    assert_eq!(h.validations.load(Ordering::SeqCst), 1);
    assert_eq!(h.decodes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_transport_cancellation_skips_validation_and_decoding() {
    let h = harness(Reply::Fail(TransportErrorKind::Cancelled));

    let err = h
        .client
        .send(&RequestDescriptor::<Greeting>::get())
        .await
        .unwrap_err();

    match &err {
        ClientError::Request(RequestError::Transport(e)) => {
            assert_eq!(e.kind(), TransportErrorKind::Cancelled);
        }
        other => panic!("Expected Request(Transport), got {:?}", other),
    }
    assert!(err.is_retryable());
    assert_eq!(h.validations.load(Ordering::SeqCst), 0);
    assert_eq!(h.decodes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_transport_failure_classification() {
    let h = harness(Reply::Fail(TransportErrorKind::InvalidRequest));
    let err = h
        .client
        .send(&RequestDescriptor::<Greeting>::get())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ClientError::Request(RequestError::InvalidRequest(_))
    ));

    let h = harness(Reply::Fail(TransportErrorKind::Other));
    let err = h
        .client
        .send(&RequestDescriptor::<Greeting>::get())
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Request(RequestError::Unknown(_))));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_encoding_failure_makes_no_network_call() {
    let h = harness(Reply::Respond(200, "{}"));

    let request = RequestDescriptor::<Greeting>::post().with_body(
        MultipartFormBody::new(vec![FormValue::text("a", "--B inside")]).with_boundary("B"),
    );

    let err = h.client.send(&request).await.unwrap_err();

    assert!(matches!(err, ClientError::Encoding(_)));
    assert_eq!(h.transport.calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.validations.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_empty_body_attaches_nothing() {
    let h = harness(Reply::Respond(200, r#"{"message":"ok"}"#));

    let request = RequestDescriptor::<Greeting>::post()
        .with_path("/ping")
        .with_body(courier::body::EmptyBody::new());
    h.client.send(&request).await.unwrap();

    let wire = h.transport.last_request();
    assert!(wire.body.is_none());
    assert!(wire.headers.is_empty());
}

#[tokio::test]
async fn test_path_is_appended_verbatim() {
    let h = harness_with_base("http://api.test/v1", Reply::Respond(200, r#"{"message":"ok"}"#));

    h.client
        .send(&RequestDescriptor::<Greeting>::get().with_path("//users/7"))
        .await
        .unwrap();
    assert_eq!(
        h.transport.last_request().url.as_str(),
        "http://api.test/v1//users/7"
    );

    h.client
        .send(&RequestDescriptor::<Greeting>::get().with_path(""))
        .await
        .unwrap();
    assert_eq!(h.transport.last_request().url.as_str(), "http://api.test/v1");
}

#[tokio::test]
async fn test_dot_segments_are_resolved_by_url_parsing() {
    let h = harness_with_base("http://api.test/v1", Reply::Respond(200, r#"{"message":"ok"}"#));

    h.client
        .send(&RequestDescriptor::<Greeting>::get().with_path("/a/../b?x=1"))
        .await
        .unwrap();

    let url = h.transport.last_request().url;
    assert_eq!(url.path(), "/v1/b");
    assert_eq!(url.query(), Some("x=1"));
}

#[tokio::test]
async fn test_unparseable_url_is_invalid_request() {
    let h = harness(Reply::Respond(200, "{}"));

    let err = h
        .client
        .send(&RequestDescriptor::<Greeting>::get().with_path(":99999999"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ClientError::Request(RequestError::InvalidRequest(_))
    ));
    assert_eq!(h.transport.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_wire_request_carries_method_and_merged_headers() {
    let h = harness(Reply::Respond(200, r#"{"message":"ok"}"#));

    let request = RequestDescriptor::<Greeting>::new(Method::PATCH)
        .with_path("/items/1")
        .with_header("X-Request", "1")
        .with_body(courier::body::DataBody::with_headers(
            &b"raw"[..],
            [("Content-Type".to_string(), "text/plain".to_string())].into(),
        ));
    h.client.send(&request).await.unwrap();

    let wire = h.transport.last_request();
    assert_eq!(wire.method, Method::PATCH);
    assert_eq!(wire.body.as_deref(), Some(&b"raw"[..]));
    assert_eq!(wire.headers.get("X-Request").unwrap(), "1");
    assert_eq!(wire.headers.get("Content-Type").unwrap(), "text/plain");
}

#[tokio::test]
async fn test_cancel_token_aborts_transport() {
    let h = harness(Reply::Hang);
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let err = h
        .client
        .send_with_cancel(&RequestDescriptor::<Greeting>::get(), &cancel)
        .await
        .unwrap_err();

    match &err {
        ClientError::Request(RequestError::Transport(e)) => {
            assert_eq!(e.kind(), TransportErrorKind::Cancelled);
        }
        other => panic!("Expected Request(Transport), got {:?}", other),
    }
    assert!(h.transport.dropped.load(Ordering::SeqCst));
    assert_eq!(h.validations.load(Ordering::SeqCst), 0);
    assert_eq!(h.decodes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_dropping_send_future_aborts_transport() {
    let h = harness(Reply::Hang);
    let request = RequestDescriptor::<Greeting>::get();

    let result = tokio::time::timeout(Duration::from_millis(20), h.client.send(&request)).await;

    assert!(result.is_err());
    assert!(h.transport.dropped.load(Ordering::SeqCst));
    assert_eq!(h.validations.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_stream_is_cold() {
    let h = harness(Reply::Respond(200, r#"{"message":"lazy"}"#));

    let mut stream = h
        .client
        .stream(RequestDescriptor::<Greeting>::get().with_path("/lazy"));
    tokio::task::yield_now().await;
    assert_eq!(h.transport.calls.load(Ordering::SeqCst), 0);

    let first = stream.next().await.unwrap().unwrap();
    assert_eq!(first.message, "lazy");
    assert!(stream.next().await.is_none());
    assert_eq!(h.transport.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_stream_delivers_errors_like_send() {
    let h = harness(Reply::Respond(500, "boom"));

    let items: Vec<_> = h
        .client
        .stream(RequestDescriptor::<Greeting>::get())
        .collect()
        .await;

    assert_eq!(items.len(), 1);
    assert!(matches!(
        items[0],
        Err(ClientError::Response(ApiError::Status(500)))
    ));
}

#[tokio::test]
async fn test_publisher_does_not_resubscribe_by_default() {
    let h = harness(Reply::Fail(TransportErrorKind::Connection));

    let items: Vec<_> = h
        .client
        .publisher(RequestDescriptor::<Greeting>::get())
        .subscribe()
        .collect()
        .await;

    assert_eq!(items.len(), 1);
    assert_eq!(h.transport.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_retry_once_reruns_after_transport_error() {
    let h = harness(Reply::Fail(TransportErrorKind::Connection));

    let items: Vec<_> = h
        .client
        .publisher(RequestDescriptor::<Greeting>::get())
        .retry_once()
        .subscribe()
        .collect()
        .await;

    assert_eq!(items.len(), 1);
    assert!(matches!(
        items[0],
        Err(ClientError::Request(RequestError::Transport(_)))
    ));
    assert_eq!(h.transport.calls.load(Ordering::SeqCst), 2);
    assert_eq!(h.validations.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_retry_once_yields_the_second_outcome() {
    let h = harness(Reply::FailOnce(
        TransportErrorKind::Timeout,
        r#"{"message":"second time lucky"}"#,
    ));

    let items: Vec<_> = h
        .client
        .publisher(RequestDescriptor::<Greeting>::get())
        .retry_once()
        .subscribe()
        .collect()
        .await;

    assert_eq!(items.len(), 1);
    assert_eq!(items[0].as_ref().unwrap().message, "second time lucky");
    assert_eq!(h.transport.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_retry_once_skips_response_rejections() {
    let h = harness(Reply::Respond(404, r#"{"message":"missing"}"#));

    let items: Vec<_> = h
        .client
        .publisher(RequestDescriptor::<Greeting>::get())
        .retry_once()
        .subscribe()
        .collect()
        .await;

    assert!(matches!(items[0], Err(ClientError::Response(ApiError::NotFound))));
    assert_eq!(h.transport.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_retry_once_skips_decoding_and_encoding_failures() {
    let h = harness(Reply::Respond(200, "not json"));

    let items: Vec<_> = h
        .client
        .publisher(RequestDescriptor::<Greeting>::get())
        .retry_once()
        .subscribe()
        .collect()
        .await;

    assert!(matches!(items[0], Err(ClientError::Decoding { .. })));
    assert_eq!(h.transport.calls.load(Ordering::SeqCst), 1);

    let clashing =
        MultipartFormBody::new(vec![FormValue::text("a", "--B inside")]).with_boundary("B");
    let items: Vec<_> = h
        .client
        .publisher(RequestDescriptor::<Greeting>::post().with_body(clashing))
        .retry_once()
        .subscribe()
        .collect()
        .await;

    assert!(matches!(items[0], Err(ClientError::Encoding(_))));
    assert_eq!(h.transport.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_unsubscribing_before_completion_emits_nothing() {
    let h = harness(Reply::Hang);
    let publisher = h.client.publisher(RequestDescriptor::<Greeting>::get());

    let mut stream = publisher.subscribe();
    let polled = tokio::time::timeout(Duration::from_millis(20), stream.next()).await;
    assert!(polled.is_err());
    assert_eq!(h.transport.calls.load(Ordering::SeqCst), 1);

    drop(stream);

    assert!(h.transport.dropped.load(Ordering::SeqCst));
    assert_eq!(h.validations.load(Ordering::SeqCst), 0);
    assert_eq!(h.decodes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_concurrent_calls_share_one_client() {
    let h = harness(Reply::Respond(200, r#"{"message":"ok"}"#));

    let tasks: Vec<_> = (0..8)
        .map(|i| {
            let client = h.client.clone();
            tokio::spawn(async move {
                let request = RequestDescriptor::<Greeting>::get().with_path(format!("/n/{i}"));
                client.send(&request).await
            })
        })
        .collect();

    for task in tasks {
        assert!(task.await.unwrap().is_ok());
    }
    assert_eq!(h.transport.calls.load(Ordering::SeqCst), 8);
}

#[derive(Default)]
struct RecordingObserver {
    events: Mutex<Vec<String>>,
}

impl CallObserver for RecordingObserver {
    fn on_request(&self, request: &WireRequest, body: Option<&dyn courier::RequestBody>) {
        let body = body.map(|b| b.to_string()).unwrap_or_default();
        self.events
            .lock()
            .unwrap()
            .push(format!("request {} {}", request.method, body));
    }

    fn on_response(&self, _method: &Method, url: &Url, status: StatusCode, _latency: Duration) {
        self.events
            .lock()
            .unwrap()
            .push(format!("response {} {}", url.path(), status.as_u16()));
    }

    fn on_failure(&self, stage: Stage, _error: &dyn fmt::Debug) {
        self.events.lock().unwrap().push(format!("failure {stage}"));
    }
}

#[tokio::test]
async fn test_observer_sees_each_stage() {
    let observer = Arc::new(RecordingObserver::default());
    let transport = MockTransport::new(Reply::Respond(418, "teapot"));

    let client = Client::builder()
        .base_url("http://api.test")
        .unwrap()
        .transport(transport)
        .observer(observer.clone())
        .validate(|_, parts| {
            if parts.status.is_success() {
                Ok(())
            } else {
                Err(ApiError::Status(parts.status.as_u16()))
            }
        })
        .build()
        .unwrap();

    let request = RequestDescriptor::<Greeting>::post()
        .with_path("/brew")
        .with_body(courier::body::FormBody::new([("kind", "earl grey")]));
    let _ = client.send(&request).await;

    let events = observer.events.lock().unwrap().clone();
    assert_eq!(
        events,
        vec![
            "request POST FormBody(kind=earl%20grey)".to_string(),
            "response /brew 418".to_string(),
            "failure response".to_string(),
        ]
    );
}
