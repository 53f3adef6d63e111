//! Request context for handlers.
//!
//! Lets a handler answer the server on the connection the request arrived on.
//! The reply echoes the inbound `sq` so the server can correlate it.
//!
//! # Example
//!
//! ```ignore
//! async fn on_notice(packet: Packet, ctx: RequestContext) -> Result<()> {
//!     ctx.respond(&json!({ "ok": true })).await
//! }
//! ```

use serde::Serialize;

use crate::error::{ClientError, Result};
use crate::protocol::{Packet, ACTION_FIELD};
use crate::writer::WriterHandle;

/// Context passed to request handlers.
///
/// `RequestContext` is `Clone` and can be moved into spawned tasks.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Action of the inbound request.
    action: String,
    /// Sequence number of the inbound request, if the server expects a reply.
    sq: Option<u32>,
    /// Writer for the connection the request arrived on.
    writer: Option<WriterHandle>,
}

impl RequestContext {
    /// Create a context without a writer (replies are dropped).
    pub fn new(action: &str, sq: Option<u32>) -> Self {
        Self {
            action: action.to_string(),
            sq,
            writer: None,
        }
    }

    /// Create a context bound to a connection writer.
    pub fn with_writer(action: &str, sq: Option<u32>, writer: WriterHandle) -> Self {
        Self {
            action: action.to_string(),
            sq,
            writer: Some(writer),
        }
    }

    #[inline]
    pub fn action(&self) -> &str {
        &self.action
    }

    #[inline]
    pub fn sq(&self) -> Option<u32> {
        self.sq
    }

    /// Reply to the server.
    ///
    /// `payload` must serialize to a JSON object without an `action` field.
    /// Does nothing when the inbound request carried no `sq`.
    pub async fn respond<T: Serialize>(&self, payload: &T) -> Result<()> {
        self.respond_packet(Packet::from_serialize(payload)?).await
    }

    /// Reply with a prebuilt packet.
    pub async fn respond_packet(&self, mut packet: Packet) -> Result<()> {
        if packet.get(ACTION_FIELD).is_some() {
            return Err(ClientError::InvalidPacket(
                "a response must not carry an action".to_string(),
            ));
        }

        let Some(sq) = self.sq else {
            tracing::debug!(action = %self.action, "Request carried no sq, reply dropped");
            return Ok(());
        };
        packet.set_sq(sq);

        match &self.writer {
            Some(writer) => writer.send_packet(&packet).await,
            None => Ok(()),
        }
    }
}
