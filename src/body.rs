//! Request body encoding strategies.
//!
//! A [`RequestBody`] turns a logical payload into raw bytes plus the headers
//! that payload requires (usually `Content-Type`). The client calls
//! [`encode`](RequestBody::encode) once per send; descriptions used for logging
//! may encode again, so every implementation must be deterministic and free of
//! side effects.
//!
//! | Strategy              | Content type                                      |
//! |-----------------------|---------------------------------------------------|
//! | [`EmptyBody`]         | none, nothing is attached                         |
//! | [`DataBody`]          | whatever headers the caller passes                |
//! | [`JsonBody`]          | `application/json; charset=utf-8` (overridable)   |
//! | [`FormBody`]          | `application/x-www-form-urlencoded; charset=utf-8`|
//! | [`MultipartFormBody`] | `multipart/form-data; boundary=<boundary>`        |

use crate::error::BoxError;
use crate::request::HeaderFields;
use bytes::{BufMut, Bytes, BytesMut};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use serde::Serialize;
use std::fmt;

const CONTENT_TYPE: &str = "Content-Type";
const CRLF: &str = "\r\n";

/// Why a body could not be encoded.
#[derive(thiserror::Error, Debug)]
pub enum BodyError {
    /// The structured encoder rejected the value.
    #[error("Failed to serialize value: {0}")]
    Serialize(#[source] BoxError),

    /// A multipart part payload contains the boundary delimiter.
    #[error("Multipart boundary {boundary:?} occurs inside part {part:?}")]
    BoundaryCollision {
        /// The boundary token
        boundary: String,
        /// The name of the offending part
        part: String,
    },

    /// A multipart field would break the part headers.
    #[error("Invalid multipart {field} {value:?}")]
    InvalidPartField {
        /// Which field was invalid (`name`, `filename` or `content type`)
        field: &'static str,
        /// The rejected value
        value: String,
    },
}

/// A payload that can be attached to a request.
///
/// The `Display` implementation is a human-readable description used in logs.
pub trait RequestBody: fmt::Display + Send + Sync {
    /// Encodes the payload into its wire bytes.
    ///
    /// # Errors
    ///
    /// Returns a [`BodyError`] if the payload cannot be serialized.
    fn encode(&self) -> Result<Bytes, BodyError>;

    /// Headers mandated by this payload.
    fn headers(&self) -> HeaderFields {
        HeaderFields::new()
    }

    /// When `true` the client attaches neither the body nor its headers.
    fn is_empty(&self) -> bool {
        false
    }
}

/// Converts typed values into wire bytes.
///
/// [`JsonEncoder`] is the default; implement this to send another format
/// through [`JsonBody`]'s machinery.
pub trait Encoder: Send + Sync {
    /// Serializes `value`.
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, BoxError>;
}

/// JSON encoding through `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonEncoder {
    pretty: bool,
}

impl JsonEncoder {
    /// An encoder producing indented output.
    pub fn pretty() -> Self {
        Self { pretty: true }
    }
}

impl Encoder for JsonEncoder {
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, BoxError> {
        let bytes = if self.pretty {
            serde_json::to_vec_pretty(value)?
        } else {
            serde_json::to_vec(value)?
        };
        Ok(bytes)
    }
}

/// A body that is never attached.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyBody;

impl EmptyBody {
    /// Creates an empty body.
    pub fn new() -> Self {
        Self
    }
}

impl RequestBody for EmptyBody {
    fn encode(&self) -> Result<Bytes, BodyError> {
        Ok(Bytes::new())
    }

    fn is_empty(&self) -> bool {
        true
    }
}

impl fmt::Display for EmptyBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EmptyBody()")
    }
}

/// Raw bytes sent as-is, with caller-chosen headers.
#[derive(Debug, Clone)]
pub struct DataBody {
    data: Bytes,
    headers: HeaderFields,
}

impl DataBody {
    /// Creates a body from raw bytes with no headers.
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self::with_headers(data, HeaderFields::new())
    }

    /// Creates a body from raw bytes with the headers it requires.
    pub fn with_headers(data: impl Into<Bytes>, headers: HeaderFields) -> Self {
        Self {
            data: data.into(),
            headers,
        }
    }
}

impl RequestBody for DataBody {
    fn encode(&self) -> Result<Bytes, BodyError> {
        Ok(self.data.clone())
    }

    fn headers(&self) -> HeaderFields {
        self.headers.clone()
    }
}

impl fmt::Display for DataBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match std::str::from_utf8(&self.data) {
            Ok(text) => write!(f, "DataBody({text})"),
            Err(_) => f.write_str("DataBody(undecodable)"),
        }
    }
}

/// A value serialized with an [`Encoder`], JSON by default.
///
/// # Examples
///
/// ```
/// use courier::body::{JsonBody, RequestBody};
///
/// let body = JsonBody::new(serde_json::json!({ "name": "Alice" }));
/// assert_eq!(&body.encode().unwrap()[..], br#"{"name":"Alice"}"#);
/// assert_eq!(
///     body.headers().get("Content-Type").map(String::as_str),
///     Some("application/json; charset=utf-8")
/// );
/// ```
#[derive(Debug, Clone)]
pub struct JsonBody<T, E = JsonEncoder> {
    value: T,
    encoder: E,
    headers: HeaderFields,
}

impl<T: Serialize> JsonBody<T> {
    /// Creates a compact JSON body with the default content type.
    pub fn new(value: T) -> Self {
        Self::with_encoder(value, JsonEncoder::default())
    }
}

impl<T: Serialize, E: Encoder> JsonBody<T, E> {
    /// Creates a body serialized by `encoder`.
    pub fn with_encoder(value: T, encoder: E) -> Self {
        let headers = HeaderFields::from([(
            CONTENT_TYPE.to_string(),
            "application/json; charset=utf-8".to_string(),
        )]);
        Self {
            value,
            encoder,
            headers,
        }
    }

    /// Replaces the headers this body contributes.
    pub fn with_headers(mut self, headers: HeaderFields) -> Self {
        self.headers = headers;
        self
    }
}

impl<T, E> RequestBody for JsonBody<T, E>
where
    T: Serialize + fmt::Debug + Send + Sync,
    E: Encoder,
{
    fn encode(&self) -> Result<Bytes, BodyError> {
        self.encoder
            .encode(&self.value)
            .map(Bytes::from)
            .map_err(BodyError::Serialize)
    }

    fn headers(&self) -> HeaderFields {
        self.headers.clone()
    }
}

impl<T: fmt::Debug, E> fmt::Display for JsonBody<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JsonBody({:?})", self.value)
    }
}

/// An `application/x-www-form-urlencoded` body.
///
/// Names and values are percent-encoded independently; only ASCII
/// alphanumerics pass through unchanged, so a space becomes `%20` and never
/// `+`. Pairs are emitted in the order given.
///
/// # Examples
///
/// ```
/// use courier::body::{FormBody, RequestBody};
///
/// let body = FormBody::new([("q", "a b"), ("k", "1")]);
/// assert_eq!(&body.encode().unwrap()[..], b"q=a%20b&k=1");
/// ```
#[derive(Debug, Clone, Default)]
pub struct FormBody {
    pairs: Vec<(String, String)>,
}

impl FormBody {
    /// Creates a form from ordered name/value pairs.
    pub fn new<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            pairs: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Appends a pair.
    pub fn with_pair(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.pairs.push((name.into(), value.into()));
        self
    }

    fn encoded(&self) -> String {
        self.pairs
            .iter()
            .map(|(name, value)| {
                format!(
                    "{}={}",
                    utf8_percent_encode(name, NON_ALPHANUMERIC),
                    utf8_percent_encode(value, NON_ALPHANUMERIC)
                )
            })
            .collect::<Vec<_>>()
            .join("&")
    }
}

impl RequestBody for FormBody {
    fn encode(&self) -> Result<Bytes, BodyError> {
        Ok(Bytes::from(self.encoded()))
    }

    fn headers(&self) -> HeaderFields {
        HeaderFields::from([(
            CONTENT_TYPE.to_string(),
            "application/x-www-form-urlencoded; charset=utf-8".to_string(),
        )])
    }
}

impl fmt::Display for FormBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FormBody({})", self.encoded())
    }
}

/// One part of a [`MultipartFormBody`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormValue {
    /// A plain text field.
    Text {
        /// Field name
        name: String,
        /// Field value
        value: String,
    },
    /// A file upload.
    File {
        /// Field name
        name: String,
        /// Reported file name
        filename: String,
        /// File contents
        data: Bytes,
        /// MIME type of the contents
        content_type: String,
    },
}

impl FormValue {
    /// A plain text field.
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        FormValue::Text {
            name: name.into(),
            value: value.into(),
        }
    }

    /// A file field.
    pub fn file(
        name: impl Into<String>,
        filename: impl Into<String>,
        data: impl Into<Bytes>,
        content_type: impl Into<String>,
    ) -> Self {
        FormValue::File {
            name: name.into(),
            filename: filename.into(),
            data: data.into(),
            content_type: content_type.into(),
        }
    }

    fn name(&self) -> &str {
        match self {
            FormValue::Text { name, .. } | FormValue::File { name, .. } => name,
        }
    }

    fn payload(&self) -> &[u8] {
        match self {
            FormValue::Text { value, .. } => value.as_bytes(),
            FormValue::File { data, .. } => data,
        }
    }
}

/// A `multipart/form-data` body.
///
/// Each part is written as
/// `--<boundary>\r\nContent-Disposition: form-data; name="<name>"`, followed
/// for files by `; filename="<filename>"\r\nContent-Type: <type>`, then a
/// blank line, the payload and `\r\n`. The body ends with `--<boundary>--`
/// and no trailing line break.
///
/// # Examples
///
/// ```
/// use courier::body::{FormValue, MultipartFormBody, RequestBody};
///
/// let body = MultipartFormBody::new(vec![FormValue::text("a", "1")]).with_boundary("B");
/// assert_eq!(
///     &body.encode().unwrap()[..],
///     b"--B\r\nContent-Disposition: form-data; name=\"a\"\r\n\r\n1\r\n--B--"
/// );
/// ```
#[derive(Debug, Clone)]
pub struct MultipartFormBody {
    values: Vec<FormValue>,
    boundary: String,
}

impl MultipartFormBody {
    /// Creates a body with a random boundary.
    pub fn new(values: Vec<FormValue>) -> Self {
        Self {
            values,
            boundary: uuid::Uuid::new_v4().to_string(),
        }
    }

    /// Pins the boundary token.
    pub fn with_boundary(mut self, boundary: impl Into<String>) -> Self {
        self.boundary = boundary.into();
        self
    }

    /// The boundary token in use.
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    fn encode_values(&self) -> Result<Bytes, BodyError> {
        let delimiter = format!("--{}", self.boundary);
        let mut buf = BytesMut::new();

        for value in &self.values {
            check_field("name", value.name(), true)?;
            if contains(value.payload(), delimiter.as_bytes()) {
                return Err(BodyError::BoundaryCollision {
                    boundary: self.boundary.clone(),
                    part: value.name().to_string(),
                });
            }

            buf.put_slice(delimiter.as_bytes());
            buf.put_slice(CRLF.as_bytes());
            buf.put_slice(
                format!("Content-Disposition: form-data; name=\"{}\"", value.name()).as_bytes(),
            );

            if let FormValue::File {
                filename,
                content_type,
                ..
            } = value
            {
                check_field("filename", filename, true)?;
                check_field("content type", content_type, false)?;
                buf.put_slice(
                    format!("; filename=\"{filename}\"{CRLF}{CONTENT_TYPE}: {content_type}")
                        .as_bytes(),
                );
            }

            buf.put_slice(CRLF.as_bytes());
            buf.put_slice(CRLF.as_bytes());
            buf.put_slice(value.payload());
            buf.put_slice(CRLF.as_bytes());
        }

        buf.put_slice(delimiter.as_bytes());
        buf.put_slice(b"--");

        Ok(buf.freeze())
    }
}

impl RequestBody for MultipartFormBody {
    fn encode(&self) -> Result<Bytes, BodyError> {
        self.encode_values()
    }

    fn headers(&self) -> HeaderFields {
        HeaderFields::from([(
            CONTENT_TYPE.to_string(),
            format!("multipart/form-data; boundary={}", self.boundary),
        )])
    }
}

impl fmt::Display for MultipartFormBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.encode_values() {
            Ok(bytes) => write!(f, "MultipartFormBody({})", String::from_utf8_lossy(&bytes)),
            Err(_) => f.write_str("MultipartFormBody(undecodable)"),
        }
    }
}

fn check_field(field: &'static str, value: &str, quoted: bool) -> Result<(), BodyError> {
    let invalid = value.contains(['\r', '\n']) || (quoted && value.contains('"'));
    if invalid {
        return Err(BodyError::InvalidPartField {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    !needle.is_empty()
        && haystack.len() >= needle.len()
        && haystack.windows(needle.len()).any(|w| w == needle)
}
