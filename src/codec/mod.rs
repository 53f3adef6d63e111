//! Codec module - serialization/deserialization for packet payloads.
//!
//! Every payload on the wire is a compact JSON object, encoded and decoded
//! through [`JsonCodec`].
//!
//! # Example
//!
//! ```
//! use jsonwire_client::codec::JsonCodec;
//!
//! let encoded = JsonCodec::encode(&serde_json::json!({"action": "alive"})).unwrap();
//! let decoded: serde_json::Value = JsonCodec::decode(&encoded).unwrap();
//! assert_eq!(decoded["action"], "alive");
//! ```

mod json;

pub use json::JsonCodec;
