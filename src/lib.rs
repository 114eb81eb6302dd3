//! # Courier - a typed, declarative HTTP API client
//!
//! Courier lets you describe an API call as a value (method, path, headers,
//! body, expected response type) and turns it into a decoded, strongly typed
//! result. Shared configuration (base URL, default headers, basic auth,
//! response validation, request hooks) lives on the [`Client`]; the network
//! exchange itself is delegated to a pluggable [`Transport`], `reqwest` by
//! default.
//!
//! ## Quick Start
//!
//! ```no_run
//! use courier::{body::JsonBody, validate, Client, RequestDescriptor};
//! use serde::{Deserialize, Serialize};
//! use std::time::Duration;
//!
//! #[derive(Debug, Serialize)]
//! struct CreateUser {
//!     name: String,
//!     email: String,
//! }
//!
//! #[derive(Deserialize)]
//! struct User {
//!     id: u64,
//!     name: String,
//!     email: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::builder()
//!         .base_url("https://api.example.com")?
//!         .timeout(Duration::from_secs(30))
//!         .default_header("Accept", "application/json")
//!         .validate(validate::success_status())
//!         .build()?;
//!
//!     // Make a GET request
//!     let user: User = client.get("/users/123").await?;
//!     println!("User: {}", user.name);
//!
//!     // Make a POST request with a JSON body
//!     let request = RequestDescriptor::<User>::post()
//!         .with_path("/users")
//!         .with_body(JsonBody::new(CreateUser {
//!             name: "Alice".to_string(),
//!             email: "alice@example.com".to_string(),
//!         }));
//!     let created = client.call(&request).await?;
//!     println!("Created user {} in {:?}", created.data.id, created.latency);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Declarative requests** - implement [`Request`] on your own types or use [`RequestDescriptor`]
//! - **Body strategies** - empty, raw bytes, JSON, URL-encoded forms and multipart forms
//! - **Layered errors** - [`ClientError`] tells encoding, transport, validation and decoding failures apart
//! - **Caller-defined validation** - reject responses with your own error type
//! - **Two delivery models** - awaited calls and cold, cancellable streams over one pipeline
//! - **Observability** - structured `tracing` events through an injectable [`CallObserver`]
//!
//! ## Error Handling
//!
//! Exactly one [`ClientError`] variant is produced per failed call:
//!
//! ```no_run
//! use courier::{validate, Client, ClientError, RequestError};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! # let client = Client::builder()
//! #     .base_url("https://api.example.com")?
//! #     .validate(validate::success_status())
//! #     .build()?;
//! match client.get::<serde_json::Value>("/endpoint").await {
//!     Ok(value) => println!("Success: {value}"),
//!     Err(ClientError::Encoding(e)) => eprintln!("Body could not be encoded: {e}"),
//!     Err(ClientError::Request(RequestError::Transport(e))) => eprintln!("Network trouble: {e}"),
//!     Err(ClientError::Request(e)) => eprintln!("No response: {e}"),
//!     Err(ClientError::Response(e)) => eprintln!("HTTP error {}: {}", e.status, e.raw_response),
//!     Err(ClientError::Decoding { raw_response, source, .. }) => {
//!         eprintln!("Failed to decode {raw_response}: {source}");
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod body;
mod client;
pub mod decode;
mod error;
mod headers;
pub mod observe;
mod request;
mod response;
mod transport;
pub mod validate;

pub use body::{BodyError, RequestBody};
pub use client::{Client, ClientBuilder, Publisher};
pub use error::{BoxError, BuildError, ClientError, HttpStatusError, RequestError, Result};
pub use headers::{resolve as resolve_headers, BasicAuth};
pub use observe::{CallObserver, TracingObserver};
pub use request::{EmptyResponse, HeaderFields, Request, RequestDescriptor, ResponseParts};
pub use response::Response;
pub use transport::{
    RawResponse, ReqwestTransport, Transport, TransportError, TransportErrorKind, WireRequest,
};
