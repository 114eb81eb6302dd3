//! Call observation.
//!
//! The client reports each stage of a call to a [`CallObserver`] supplied at
//! construction time. [`TracingObserver`] is the default and turns the events
//! into `tracing` events; embedders that want metrics or audit logs plug in
//! their own observer.

use crate::body::RequestBody;
use crate::transport::WireRequest;
use http::{Method, StatusCode};
use std::fmt;
use std::time::Duration;
use url::Url;

/// The pipeline stage a failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Building the wire request (URL, body encoding).
    Encoding,
    /// The transport round trip.
    Request,
    /// Response validation.
    Response,
    /// Decoding or transforming the response body.
    Decoding,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Encoding => "encoding",
            Stage::Request => "request",
            Stage::Response => "response",
            Stage::Decoding => "decoding",
        };
        f.write_str(s)
    }
}

/// Receives call lifecycle events.
///
/// All methods have empty default implementations.
pub trait CallObserver: Send + Sync {
    /// The wire request is about to be handed to the transport.
    fn on_request(&self, _request: &WireRequest, _body: Option<&dyn RequestBody>) {}

    /// The transport returned a response.
    fn on_response(&self, _method: &Method, _url: &Url, _status: StatusCode, _latency: Duration) {
    }

    /// The call failed at `stage`.
    fn on_failure(&self, _stage: Stage, _error: &dyn fmt::Debug) {}
}

/// Emits call events through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl CallObserver for TracingObserver {
    fn on_request(&self, request: &WireRequest, body: Option<&dyn RequestBody>) {
        match body {
            Some(body) => tracing::debug!(
                method = %request.method,
                url = %request.url,
                body = %body,
                "Executing HTTP request"
            ),
            None => tracing::debug!(
                method = %request.method,
                url = %request.url,
                "Executing HTTP request"
            ),
        }
    }

    fn on_response(&self, method: &Method, url: &Url, status: StatusCode, latency: Duration) {
        tracing::info!(
            method = %method,
            url = %url,
            status = status.as_u16(),
            latency_ms = latency.as_millis(),
            "Received HTTP response"
        );
    }

    fn on_failure(&self, stage: Stage, error: &dyn fmt::Debug) {
        match stage {
            Stage::Request => tracing::warn!(stage = %stage, error = ?error, "Request failed"),
            _ => tracing::error!(stage = %stage, error = ?error, "Request failed"),
        }
    }
}
