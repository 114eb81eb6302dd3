//! Structured response decoding.

use crate::error::BoxError;
use serde::de::DeserializeOwned;

/// Converts response bytes into typed values.
///
/// The client uses its decoder for every request that does not supply its
/// own transform.
pub trait Decoder: Send + Sync + 'static {
    /// Decodes `body` into `T`.
    fn decode<T: DeserializeOwned>(&self, body: &[u8]) -> Result<T, BoxError>;
}

/// JSON decoding through `serde_json`.
///
/// # Examples
///
/// ```
/// use courier::decode::{Decoder, JsonDecoder};
///
/// let n: Vec<u32> = JsonDecoder.decode(b"[1, 2, 3]").unwrap();
/// assert_eq!(n, vec![1, 2, 3]);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonDecoder;

impl Decoder for JsonDecoder {
    fn decode<T: DeserializeOwned>(&self, body: &[u8]) -> Result<T, BoxError> {
        Ok(serde_json::from_slice(body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct User {
        id: u64,
        name: String,
    }

    #[test]
    fn test_json_decoder() {
        let user: User = JsonDecoder
            .decode(br#"{"id": 7, "name": "Ada"}"#)
            .unwrap();
        assert_eq!(
            user,
            User {
                id: 7,
                name: "Ada".to_string()
            }
        );
    }

    #[test]
    fn test_json_decoder_reports_serde_error() {
        let err = JsonDecoder.decode::<User>(b"invalid json").unwrap_err();
        assert!(err.to_string().contains("expected"));
    }
}
