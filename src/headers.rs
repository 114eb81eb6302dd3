//! Header merging and basic authentication.

use crate::request::HeaderFields;
use base64::prelude::*;
use std::fmt;

/// The name of the header set by [`BasicAuth`].
pub const AUTHORIZATION: &str = "Authorization";

/// Username and password sent as an `Authorization: Basic` header.
#[derive(Clone, PartialEq, Eq)]
pub struct BasicAuth {
    username: String,
    password: String,
}

impl BasicAuth {
    /// Creates credentials.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// The username.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// `Basic <base64(username:password)>`.
    ///
    /// # Examples
    ///
    /// ```
    /// use courier::BasicAuth;
    ///
    /// let auth = BasicAuth::new("Aladdin", "open sesame");
    /// assert_eq!(auth.header_value(), "Basic QWxhZGRpbjpvcGVuIHNlc2FtZQ==");
    /// ```
    pub fn header_value(&self) -> String {
        let credentials = format!("{}:{}", self.username, self.password);
        format!("Basic {}", BASE64_STANDARD.encode(credentials.as_bytes()))
    }
}

impl fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicAuth")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Merges the header sources of one call.
///
/// Later sources win on key collision: client defaults, then request headers,
/// then body headers, then the basic-auth `Authorization` header. A key set
/// by a later source also replaces every case variant of it from earlier
/// sources, so `content-type` from the request gives way to the body's
/// `Content-Type`.
pub fn resolve(
    default_headers: &HeaderFields,
    request_headers: HeaderFields,
    body_headers: HeaderFields,
    basic_auth: Option<&BasicAuth>,
) -> HeaderFields {
    let mut headers = default_headers.clone();
    overlay(&mut headers, request_headers);
    overlay(&mut headers, body_headers);

    if let Some(auth) = basic_auth {
        let auth = HeaderFields::from([(AUTHORIZATION.to_string(), auth.header_value())]);
        overlay(&mut headers, auth);
    }

    headers
}

fn overlay(headers: &mut HeaderFields, source: HeaderFields) {
    headers.retain(|existing, _| {
        !source
            .keys()
            .any(|name| name.eq_ignore_ascii_case(existing))
    });
    headers.extend(source);
}
