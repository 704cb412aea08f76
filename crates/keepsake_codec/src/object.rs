//! Object to text codecs.

use crate::error::{CodecError, CodecResult};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Converts typed values to and from text.
///
/// The serialization pipeline is agnostic to how a type's fields map to
/// text; it only needs a codec that round-trips.
pub trait ObjectCodec: Send + Sync {
    /// Encodes `value`. `pretty` is a formatting hint only.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Encode`] if the value cannot be represented.
    fn encode<T: Serialize + ?Sized>(&self, value: &T, pretty: bool) -> CodecResult<String>;

    /// Decodes a value from `text`.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Decode`] if the text is not a valid `T`.
    fn decode<T: DeserializeOwned>(&self, text: &str) -> CodecResult<T>;
}

/// JSON via `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl ObjectCodec for JsonCodec {
    fn encode<T: Serialize + ?Sized>(&self, value: &T, pretty: bool) -> CodecResult<String> {
        let encoded = if pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };
        encoded.map_err(|e| CodecError::encode(e.to_string()))
    }

    fn decode<T: DeserializeOwned>(&self, text: &str) -> CodecResult<T> {
        serde_json::from_str(text).map_err(|e| CodecError::decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::collections::BTreeMap;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Settings {
        volume: f32,
        name: String,
    }

    #[test]
    fn compact_and_pretty() {
        let value = Settings {
            volume: 0.5,
            name: "player".into(),
        };

        let compact = JsonCodec.encode(&value, false).unwrap();
        assert_eq!(compact, r#"{"volume":0.5,"name":"player"}"#);

        let pretty = JsonCodec.encode(&value, true).unwrap();
        assert!(pretty.contains('\n'));
        assert_eq!(JsonCodec.decode::<Settings>(&pretty).unwrap(), value);
    }

    #[test]
    fn decode_failure_is_decode_error() {
        let result = JsonCodec.decode::<Settings>(r#"{"volume":"loud"}"#);
        assert!(matches!(result, Err(CodecError::Decode { .. })));
    }

    #[test]
    fn non_string_map_keys_fail_to_encode() {
        let mut map = BTreeMap::new();
        map.insert((1, 2), "pair");
        assert!(matches!(
            JsonCodec.encode(&map, false),
            Err(CodecError::Encode { .. })
        ));
    }
}
