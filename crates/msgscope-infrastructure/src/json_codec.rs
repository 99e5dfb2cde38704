//! serde_json payload codec.

use msgscope_core::codec::PayloadCodec;
use msgscope_core::error::{Result, ScopeError};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;

/// Encodes payloads of type `T` as JSON strings.
pub struct JsonCodec<T> {
    _payload: PhantomData<fn() -> T>,
}

impl<T> JsonCodec<T> {
    pub fn new() -> Self {
        Self {
            _payload: PhantomData,
        }
    }
}

impl<T> Default for JsonCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> PayloadCodec<T> for JsonCodec<T>
where
    T: Serialize + DeserializeOwned,
{
    fn serialize(&self, payload: &T) -> Result<String> {
        serde_json::to_string(payload).map_err(|e| ScopeError::codec(e.to_string()))
    }

    fn deserialize(&self, raw: &str) -> Result<T> {
        serde_json::from_str(raw).map_err(|e| ScopeError::codec(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Reading {
        celsius: f32,
    }

    #[test]
    fn test_decode_and_encode() {
        let codec = JsonCodec::<Reading>::new();
        let reading = codec.deserialize(r#"{"celsius":21.5}"#).unwrap();
        assert_eq!(reading, Reading { celsius: 21.5 });
        assert_eq!(codec.serialize(&reading).unwrap(), r#"{"celsius":21.5}"#);
    }

    #[test]
    fn test_malformed_payload_is_codec_error() {
        let codec = JsonCodec::<Reading>::new();
        assert!(codec.deserialize("{not json").unwrap_err().is_codec());
        assert!(codec.deserialize("").unwrap_err().is_codec());
    }
}
