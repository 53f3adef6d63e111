//! Decoded JSON packets and their classification.
//!
//! A packet is a JSON object. It is a request when it carries an `action`
//! field and a response when it carries `sq` without `action`. Field presence
//! decides, not field type: `{"action": null}` is still a request.
//!
//! # Example
//!
//! ```
//! use jsonwire_client::protocol::{Packet, PacketKind};
//!
//! let packet = Packet::from_slice(br#"{"sq":7,"ok":true}"#).unwrap();
//! assert_eq!(packet.kind(), PacketKind::Response);
//! assert_eq!(packet.sq(), Some(7));
//! ```

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::frame::build_frame_bytes;
use crate::codec::JsonCodec;
use crate::error::Result;

/// Field naming the remote operation.
pub const ACTION_FIELD: &str = "action";

/// Field carrying the sequence number.
pub const SQ_FIELD: &str = "sq";

/// How the router should treat a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    /// Server-initiated request (`action` present).
    Request,
    /// Response to one of our requests (`sq` present, no `action`).
    Response,
    /// Neither field present.
    Malformed,
}

/// A JSON object exchanged over the connection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Packet(Map<String, Value>);

impl Packet {
    /// Create an empty packet.
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Create a request packet for `action`.
    pub fn request(action: &str) -> Self {
        let mut map = Map::new();
        map.insert(ACTION_FIELD.to_string(), Value::String(action.to_string()));
        Self(map)
    }

    /// Build a packet from any value that serializes to a JSON object.
    pub fn from_serialize<T: Serialize>(value: &T) -> Result<Self> {
        Ok(Self(JsonCodec::to_object(value)?))
    }

    /// Decode a frame payload. Fails on invalid JSON or a non-object value.
    pub fn from_slice(payload: &[u8]) -> Result<Self> {
        JsonCodec::decode(payload)
    }

    /// Classify the packet. `action` is checked before `sq`.
    pub fn kind(&self) -> PacketKind {
        if self.0.contains_key(ACTION_FIELD) {
            PacketKind::Request
        } else if self.0.contains_key(SQ_FIELD) {
            PacketKind::Response
        } else {
            PacketKind::Malformed
        }
    }

    /// The `action` field, if it is a string.
    pub fn action(&self) -> Option<&str> {
        self.0.get(ACTION_FIELD).and_then(Value::as_str)
    }

    /// The `sq` field, if it is an integer that fits a sequence number.
    pub fn sq(&self) -> Option<u32> {
        self.0
            .get(SQ_FIELD)
            .and_then(Value::as_u64)
            .and_then(|sq| u32::try_from(sq).ok())
    }

    /// Set (or overwrite) the sequence number.
    pub fn set_sq(&mut self, sq: u32) {
        self.0.insert(SQ_FIELD.to_string(), Value::from(sq));
    }

    /// Copy of this packet carrying `sq`.
    pub fn with_sq(&self, sq: u32) -> Self {
        let mut packet = self.clone();
        packet.set_sq(sq);
        packet
    }

    /// Get a field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Insert a field, returning the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    /// Borrow the underlying JSON object.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Take the underlying JSON object.
    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    /// Deserialize the packet into a caller type.
    pub fn deserialize<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(Value::Object(self.0.clone()))?)
    }

    /// Encode as compact JSON.
    pub fn to_vec(&self) -> Result<Vec<u8>> {
        JsonCodec::encode(self)
    }

    /// Encode as a complete wire frame (`"<len>\n<json>"`).
    pub fn to_frame(&self) -> Result<Bytes> {
        Ok(build_frame_bytes(&self.to_vec()?))
    }
}

impl From<Map<String, Value>> for Packet {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn packet(value: Value) -> Packet {
        Packet::from_serialize(&value).unwrap()
    }

    #[test]
    fn test_kind_request() {
        assert_eq!(packet(json!({"action": "push"})).kind(), PacketKind::Request);
    }

    #[test]
    fn test_kind_action_wins_over_sq() {
        let p = packet(json!({"action": "push", "sq": 3}));
        assert_eq!(p.kind(), PacketKind::Request);
    }

    #[test]
    fn test_kind_null_action_is_still_request() {
        assert_eq!(packet(json!({"action": null})).kind(), PacketKind::Request);
    }

    #[test]
    fn test_kind_response() {
        let p = packet(json!({"sq": 12, "friends": []}));
        assert_eq!(p.kind(), PacketKind::Response);
        assert_eq!(p.sq(), Some(12));
    }

    #[test]
    fn test_kind_malformed() {
        assert_eq!(packet(json!({"hello": 1})).kind(), PacketKind::Malformed);
    }

    #[test]
    fn test_sq_rejects_non_integers() {
        assert_eq!(packet(json!({"sq": "1"})).sq(), None);
        assert_eq!(packet(json!({"sq": -1})).sq(), None);
        assert_eq!(packet(json!({"sq": 1.5})).sq(), None);
    }

    #[test]
    fn test_with_sq_leaves_original_untouched() {
        let original = Packet::request("ping");
        let stamped = original.with_sq(4);

        assert_eq!(original.sq(), None);
        assert_eq!(stamped.sq(), Some(4));
        assert_eq!(stamped.action(), Some("ping"));
    }

    #[test]
    fn test_to_frame_exact_bytes() {
        let mut p = Packet::new();
        p.set_sq(1);
        assert_eq!(&p.to_frame().unwrap()[..], b"8\n{\"sq\":1}");
    }

    #[test]
    fn test_from_slice_rejects_non_object() {
        assert!(Packet::from_slice(b"[1,2]").is_err());
        assert!(Packet::from_slice(b"{broken").is_err());
    }

    #[test]
    fn test_deserialize_into_struct() {
        #[derive(serde::Deserialize)]
        struct Reply {
            sq: u32,
            name: String,
        }

        let reply: Reply = packet(json!({"sq": 2, "name": "bob"})).deserialize().unwrap();
        assert_eq!(reply.sq, 2);
        assert_eq!(reply.name, "bob");
    }
}
