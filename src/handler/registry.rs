//! Handler registry for dispatching server-initiated requests by action.
//!
//! # Example
//!
//! ```
//! use jsonwire_client::handler::{HandlerRegistry, RequestContext};
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct Notice {
//!     text: String,
//! }
//!
//! let mut registry = HandlerRegistry::new();
//!
//! registry.register("notice", |notice: Notice, ctx: RequestContext| async move {
//!     ctx.respond(&serde_json::json!({ "seen": notice.text })).await
//! });
//!
//! assert!(registry.contains("notice"));
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;

use serde::de::DeserializeOwned;

use super::RequestContext;
use crate::error::{ClientError, Result};
use crate::protocol::Packet;

/// Result type for handler functions.
pub type HandlerResult = Result<()>;

/// Boxed future for handler results.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Trait for handler functions.
pub trait Handler: Send + Sync + 'static {
    /// Handle an inbound request packet.
    fn call(&self, packet: Packet, ctx: RequestContext) -> BoxFuture<'static, HandlerResult>;
}

/// Wrapper that deserializes the packet before calling the handler.
///
/// Use [`Packet`] as `T` to receive the packet untouched.
pub struct TypedHandler<F, T, Fut>
where
    F: Fn(T, RequestContext) -> Fut + Send + Sync + 'static,
    T: DeserializeOwned + Send + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    handler: F,
    _phantom: PhantomData<fn(T) -> Fut>,
}

impl<F, T, Fut> TypedHandler<F, T, Fut>
where
    F: Fn(T, RequestContext) -> Fut + Send + Sync + 'static,
    T: DeserializeOwned + Send + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    pub fn new(handler: F) -> Self {
        Self {
            handler,
            _phantom: PhantomData,
        }
    }
}

impl<F, T, Fut> Handler for TypedHandler<F, T, Fut>
where
    F: Fn(T, RequestContext) -> Fut + Send + Sync + 'static,
    T: DeserializeOwned + Send + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn call(&self, packet: Packet, ctx: RequestContext) -> BoxFuture<'static, HandlerResult> {
        let parsed: T = match packet.deserialize() {
            Ok(v) => v,
            Err(e) => return Box::pin(async move { Err(e) }),
        };

        Box::pin((self.handler)(parsed, ctx))
    }
}

/// Registry mapping action names to handlers.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Box<dyn Handler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for `action`, replacing any previous one.
    pub fn register<F, T, Fut>(&mut self, action: &str, handler: F)
    where
        F: Fn(T, RequestContext) -> Fut + Send + Sync + 'static,
        T: DeserializeOwned + Send + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.register_handler(action, TypedHandler::new(handler));
    }

    /// Register a prebuilt [`Handler`].
    pub fn register_handler(&mut self, action: &str, handler: impl Handler) {
        if self
            .handlers
            .insert(action.to_string(), Box::new(handler))
            .is_some()
        {
            tracing::debug!(action, "Replaced existing handler");
        }
    }

    pub fn contains(&self, action: &str) -> bool {
        self.handlers.contains_key(action)
    }

    pub fn get_handler(&self, action: &str) -> Option<&dyn Handler> {
        self.handlers.get(action).map(|h| h.as_ref())
    }

    /// Registered action names.
    pub fn actions(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Dispatch an inbound request to the handler for its `action`.
    pub async fn dispatch(&self, packet: Packet, ctx: RequestContext) -> Result<()> {
        let action = packet
            .action()
            .ok_or_else(|| ClientError::HandlerNotFound(format!("{:?}", packet.get("action"))))?;

        let handler = self
            .get_handler(action)
            .ok_or_else(|| ClientError::HandlerNotFound(action.to_string()))?;

        handler.call(packet, ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn packet(value: serde_json::Value) -> Packet {
        Packet::from_serialize(&value).unwrap()
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = HandlerRegistry::new();

        registry.register("push", |_p: Packet, _ctx| async { Ok(()) });

        assert!(registry.contains("push"));
        assert!(registry.get_handler("push").is_some());
        assert!(registry.get_handler("pull").is_none());
        assert_eq!(registry.actions().collect::<Vec<_>>(), vec!["push"]);
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_dispatch_calls_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let mut registry = HandlerRegistry::new();
        registry.register("push", move |p: Packet, _ctx| {
            let counter = counter.clone();
            async move {
                assert_eq!(p.get("n"), Some(&json!(3)));
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        let ctx = RequestContext::new("push", None);
        registry
            .dispatch(packet(json!({"action": "push", "n": 3})), ctx)
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_dispatch_typed_payload() {
        #[derive(serde::Deserialize)]
        struct FriendUpdate {
            friends: Vec<String>,
        }

        let mut registry = HandlerRegistry::new();
        registry.register("updateFriends", |u: FriendUpdate, _ctx| async move {
            assert_eq!(u.friends, vec!["ann".to_string()]);
            Ok(())
        });

        let ctx = RequestContext::new("updateFriends", None);
        let result = registry
            .dispatch(
                packet(json!({"action": "updateFriends", "friends": ["ann"]})),
                ctx,
            )
            .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_dispatch_bad_payload_is_error() {
        #[derive(serde::Deserialize)]
        struct Needs {
            #[allow(dead_code)]
            field: u32,
        }

        let mut registry = HandlerRegistry::new();
        registry.register("needs", |_n: Needs, _ctx| async { Ok(()) });

        let result = registry
            .dispatch(packet(json!({"action": "needs"})), RequestContext::new("needs", None))
            .await;

        assert!(matches!(result, Err(ClientError::Json(_))));
    }

    #[tokio::test]
    async fn test_dispatch_unknown_action() {
        let registry = HandlerRegistry::new();

        let result = registry
            .dispatch(packet(json!({"action": "nope"})), RequestContext::new("nope", None))
            .await;

        assert!(matches!(result, Err(ClientError::HandlerNotFound(a)) if a == "nope"));
    }

    #[tokio::test]
    async fn test_dispatch_non_string_action() {
        let registry = HandlerRegistry::new();

        let result = registry
            .dispatch(packet(json!({"action": 5})), RequestContext::new("", None))
            .await;

        assert!(matches!(result, Err(ClientError::HandlerNotFound(_))));
    }
}
