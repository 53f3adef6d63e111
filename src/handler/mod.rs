//! Handler module - server-initiated request handling and dispatch.
//!
//! Provides:
//! - [`HandlerRegistry`] - maps action names to handlers
//! - [`RequestContext`] - lets handlers reply on the live connection
//!
//! # Example
//!
//! ```
//! use jsonwire_client::handler::{HandlerRegistry, RequestContext};
//! use jsonwire_client::protocol::Packet;
//!
//! let mut registry = HandlerRegistry::new();
//!
//! registry.register("friendRequest", |packet: Packet, ctx: RequestContext| async move {
//!     ctx.respond(&serde_json::json!({ "received": packet.get("from") })).await
//! });
//! ```

mod context;
mod registry;

pub use context::RequestContext;
pub use registry::{BoxFuture, Handler, HandlerRegistry, HandlerResult, TypedHandler};
