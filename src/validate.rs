//! Response validation.
//!
//! Every response that makes it through the transport is passed to the
//! client's validator before decoding. A validator returns `Err` to reject a
//! response on semantic grounds: a non-2xx status, an error envelope in an
//! otherwise successful body, a missing header. The rejection reaches the
//! caller unchanged as [`ClientError::Response`](crate::ClientError::Response).

use crate::error::HttpStatusError;
use crate::request::ResponseParts;
use bytes::Bytes;
use std::sync::Arc;

/// A shared validator function.
pub type Validator<E> = Arc<dyn Fn(&Bytes, ResponseParts<'_>) -> Result<(), E> + Send + Sync>;

/// Rejects every response whose status is not 2xx.
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
pub fn success_status() -> fn(&Bytes, ResponseParts<'_>) -> Result<(), HttpStatusError> {
    require_success
}

/// Accepts every response.
pub fn accept_all<E>() -> fn(&Bytes, ResponseParts<'_>) -> Result<(), E> {
    accept
}

fn require_success(body: &Bytes, parts: ResponseParts<'_>) -> Result<(), HttpStatusError> {
    if parts.status.is_success() {
        return Ok(());
    }

    let raw_response = String::from_utf8_lossy(body).into_owned();

    if parts.status.is_client_error() {
        tracing::error!(
            status = parts.status.as_u16(),
            response = %raw_response,
            "Client error (4xx)"
        );
    } else if parts.status.is_server_error() {
        tracing::warn!(
            status = parts.status.as_u16(),
            response = %raw_response,
            "Server error (5xx)"
        );
    }

    Err(HttpStatusError {
        status: parts.status,
        raw_response,
        headers: parts.headers.clone(),
    })
}

fn accept<E>(_: &Bytes, _: ResponseParts<'_>) -> Result<(), E> {
    Ok(())
}
