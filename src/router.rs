//! Packet router: decides where each decoded packet goes.
//!
//! - `action` present: server-initiated request, handed to the
//!   [`HandlerRegistry`] on a spawned task.
//! - `sq` present (and no `action`): response, settles the matching entry in
//!   the pending-call registry if one still exists.
//! - neither: malformed, logged and dropped.

use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::handler::{HandlerRegistry, RequestContext};
use crate::pending::SharedPendingCalls;
use crate::protocol::{Frame, Packet, PacketKind};
use crate::writer::WriterHandle;

/// Where a packet ended up. Returned for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Handed to a handler task.
    Dispatched,
    /// Dropped because the handler limit was reached.
    HandlerBusy,
    /// Settled a pending call.
    Resolved,
    /// Response without a live pending call.
    Unmatched,
    /// Neither request nor response, or undecodable.
    Dropped,
}

/// Routes the packets of one connection.
#[derive(Clone)]
pub struct Router {
    pending: SharedPendingCalls,
    handlers: Arc<HandlerRegistry>,
    writer: WriterHandle,
    semaphore: Arc<Semaphore>,
}

impl Router {
    pub fn new(
        pending: SharedPendingCalls,
        handlers: Arc<HandlerRegistry>,
        writer: WriterHandle,
        semaphore: Arc<Semaphore>,
    ) -> Self {
        Self {
            pending,
            handlers,
            writer,
            semaphore,
        }
    }

    /// Decode a frame payload and route it. Undecodable payloads are dropped.
    pub fn route_frame(&self, frame: &Frame) -> Route {
        match Packet::from_slice(frame.payload()) {
            Ok(packet) => self.route(packet),
            Err(e) => {
                tracing::error!(error = %e, len = frame.len(), "Invalid JSON payload, dropped");
                Route::Dropped
            }
        }
    }

    /// Route a decoded packet.
    pub fn route(&self, packet: Packet) -> Route {
        match packet.kind() {
            PacketKind::Request => self.dispatch_request(packet),
            PacketKind::Response => match packet.sq() {
                Some(sq) => {
                    if self.pending.resolve(sq, packet) {
                        tracing::debug!(sq, "Received response");
                        Route::Resolved
                    } else {
                        Route::Unmatched
                    }
                }
                None => {
                    tracing::warn!(sq = ?packet.get("sq"), "Response with unusable sq, dropped");
                    Route::Unmatched
                }
            },
            PacketKind::Malformed => {
                tracing::error!("Packet has neither action nor sq, dropped");
                Route::Dropped
            }
        }
    }

    fn dispatch_request(&self, packet: Packet) -> Route {
        let action = packet.action().unwrap_or_default().to_string();
        let sq = packet.sq();

        let permit = match self.semaphore.clone().try_acquire_owned() {
            Ok(p) => p,
            Err(_) => {
                tracing::warn!(action = %action, "Handler capacity reached, dropping request");
                return Route::HandlerBusy;
            }
        };

        let ctx = RequestContext::with_writer(&action, sq, self.writer.clone());
        let handlers = self.handlers.clone();

        tokio::spawn(async move {
            // Permit is held until this task completes
            let _permit = permit;

            if let Err(e) = handlers.dispatch(packet, ctx).await {
                tracing::error!(action = %action, error = %e, "Handler error");
            }
        });

        Route::Dispatched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::{spawn_writer_task, WriterConfig};
    use serde_json::json;
    use std::time::Duration;
    use tokio::io::{duplex, AsyncReadExt, DuplexStream};
    use tokio::sync::oneshot;

    fn packet(value: serde_json::Value) -> Packet {
        Packet::from_serialize(&value).unwrap()
    }

    fn router_with(registry: HandlerRegistry, limit: usize) -> (Router, SharedPendingCalls, DuplexStream) {
        let (client, server) = duplex(4096);
        let (writer, _task) = spawn_writer_task(client, WriterConfig::default());
        let pending = SharedPendingCalls::new(65536);
        let router = Router::new(
            pending.clone(),
            Arc::new(registry),
            writer,
            Arc::new(Semaphore::new(limit)),
        );
        (router, pending, server)
    }

    #[tokio::test]
    async fn test_response_resolves_pending_call() {
        let (router, pending, _server) = router_with(HandlerRegistry::new(), 4);
        let (tx, rx) = oneshot::channel();
        let sq = pending.register(tx).unwrap();

        let route = router.route(packet(json!({"sq": sq, "result": "ok"})));

        assert_eq!(route, Route::Resolved);
        let response = rx.await.unwrap();
        assert_eq!(response.get("result"), Some(&json!("ok")));
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn test_response_without_pending_call_is_ignored() {
        // Only an entry that actually exists gets settled
        let (router, pending, _server) = router_with(HandlerRegistry::new(), 4);
        let (tx, _rx) = oneshot::channel();
        let live = pending.register(tx).unwrap();

        let route = router.route(packet(json!({"sq": live + 1})));

        assert_eq!(route, Route::Unmatched);
        assert!(pending.contains(live));
    }

    #[tokio::test]
    async fn test_late_response_after_cancel_is_ignored() {
        let (router, pending, _server) = router_with(HandlerRegistry::new(), 4);
        let (tx, _rx) = oneshot::channel();
        let sq = pending.register(tx).unwrap();
        pending.cancel(sq);

        assert_eq!(router.route(packet(json!({"sq": sq}))), Route::Unmatched);
    }

    #[tokio::test]
    async fn test_action_takes_precedence_over_sq() {
        let (router, pending, _server) = router_with(HandlerRegistry::new(), 4);
        let (tx, _rx) = oneshot::channel();
        let sq = pending.register(tx).unwrap();

        let route = router.route(packet(json!({"action": "push", "sq": sq})));

        assert_eq!(route, Route::Dispatched);
        assert!(pending.contains(sq));
    }

    #[tokio::test]
    async fn test_request_dispatched_and_answered() {
        let mut registry = HandlerRegistry::new();
        registry.register("echo", |p: Packet, ctx: RequestContext| async move {
            ctx.respond(&json!({"echo": p.get("text")})).await
        });
        let (router, _pending, mut server) = router_with(registry, 4);

        let route = router.route(packet(json!({"action": "echo", "sq": 3, "text": "hi"})));
        assert_eq!(route, Route::Dispatched);

        let expected = b"20\n{\"echo\":\"hi\",\"sq\":3}";
        let mut buf = vec![0u8; expected.len()];
        tokio::time::timeout(Duration::from_secs(1), server.read_exact(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&buf[..], &expected[..]);
    }

    #[tokio::test]
    async fn test_handler_capacity_limit() {
        let (router, _pending, _server) = router_with(HandlerRegistry::new(), 0);

        let route = router.route(packet(json!({"action": "push"})));

        assert_eq!(route, Route::HandlerBusy);
    }

    #[tokio::test]
    async fn test_malformed_packet_dropped() {
        let (router, _pending, _server) = router_with(HandlerRegistry::new(), 4);

        assert_eq!(router.route(packet(json!({"hello": 1}))), Route::Dropped);
    }

    #[tokio::test]
    async fn test_invalid_json_frame_dropped() {
        let (router, _pending, _server) = router_with(HandlerRegistry::new(), 4);

        let route = router.route_frame(&Frame::from_slice(b"{oops"));

        assert_eq!(route, Route::Dropped);
    }

    #[tokio::test]
    async fn test_non_integer_sq_is_unmatched() {
        let (router, _pending, _server) = router_with(HandlerRegistry::new(), 4);

        assert_eq!(router.route(packet(json!({"sq": "1"}))), Route::Unmatched);
    }
}
