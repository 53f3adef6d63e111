//! JSON codec using `serde_json`.
//!
//! Output is compact (no whitespace), so the length prefix of a frame is the
//! exact byte length of what the peer receives.
//!
//! # Example
//!
//! ```
//! use jsonwire_client::codec::JsonCodec;
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Serialize, Deserialize, PartialEq, Debug)]
//! struct Message {
//!     sq: u32,
//!     content: String,
//! }
//!
//! let msg = Message { sq: 1, content: "hello".to_string() };
//! let encoded = JsonCodec::encode(&msg).unwrap();
//! assert_eq!(encoded, br#"{"sq":1,"content":"hello"}"#);
//! let decoded: Message = JsonCodec::decode(&encoded).unwrap();
//! assert_eq!(decoded, msg);
//! ```

use serde_json::{Map, Value};

use crate::error::{ClientError, Result};

/// JSON codec for packet payloads.
pub struct JsonCodec;

impl JsonCodec {
    /// Encode a value to compact JSON bytes.
    #[inline]
    pub fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(value)?)
    }

    /// Decode JSON bytes to a value.
    #[inline]
    pub fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Convert any serializable value into a JSON object.
    ///
    /// Packets are always objects on the wire; anything else is rejected.
    pub fn to_object<T: serde::Serialize>(value: &T) -> Result<Map<String, Value>> {
        match serde_json::to_value(value)? {
            Value::Object(map) => Ok(map),
            other => Err(ClientError::InvalidPacket(format!(
                "expected a JSON object, got {}",
                kind_of(&other)
            ))),
        }
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct TestStruct {
        action: String,
        count: u32,
    }

    #[test]
    fn test_encode_is_compact() {
        let encoded = JsonCodec::encode(&json!({"sq": 1})).unwrap();
        assert_eq!(encoded, br#"{"sq":1}"#);
    }

    #[test]
    fn test_encode_decode_struct() {
        let original = TestStruct {
            action: "list".to_string(),
            count: 3,
        };

        let encoded = JsonCodec::encode(&original).unwrap();
        let decoded: TestStruct = JsonCodec::decode(&encoded).unwrap();

        assert_eq!(decoded, original);
    }

    #[test]
    fn test_decode_error_on_invalid_data() {
        let result: Result<TestStruct> = JsonCodec::decode(b"{not json");
        assert!(matches!(result, Err(ClientError::Json(_))));
    }

    #[test]
    fn test_to_object_accepts_struct() {
        let map = JsonCodec::to_object(&TestStruct {
            action: "x".to_string(),
            count: 0,
        })
        .unwrap();
        assert_eq!(map.get("action"), Some(&json!("x")));
    }

    #[test]
    fn test_to_object_rejects_non_objects() {
        let err = JsonCodec::to_object(&vec![1, 2]).unwrap_err();
        assert!(err.to_string().contains("an array"));

        let err = JsonCodec::to_object(&"ping").unwrap_err();
        assert!(matches!(err, ClientError::InvalidPacket(_)));
    }
}
