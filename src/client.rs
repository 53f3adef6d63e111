//! Client builder and request API.
//!
//! The [`ClientBuilder`] collects configuration, inbound handlers and a
//! status observer. The [`Client`] owns the connection driver and offers
//! [`Client::request`], which resolves with the server's matching response:
//! 1. Allocate a sequence number in the pending-call registry
//! 2. Stamp it into the packet as `sq` and write the frame
//! 3. Wait for the response or the timeout, whichever comes first
//!
//! # Example
//!
//! ```no_run
//! use jsonwire_client::{Client, ConnectionState, Packet, RequestContext};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::builder()
//!         .host("127.0.0.1")
//!         .port(10088)
//!         .handle("friendRequest", |packet: Packet, ctx: RequestContext| async move {
//!             ctx.respond(&json!({ "accepted": packet.get("from").is_some() })).await
//!         })
//!         .start();
//!
//!     client
//!         .subscribe()
//!         .wait_for(|state| *state == ConnectionState::Connected)
//!         .await?;
//!
//!     let reply = client.request(&json!({ "action": "login", "user": "ann" })).await?;
//!     println!("{:?}", reply.get("ok"));
//!
//!     client.shutdown().await;
//!     Ok(())
//! }
//! ```

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch, Semaphore};
use tokio::task::JoinHandle;
use tokio::time;

use crate::config::ClientConfig;
use crate::connection::driver::{Command, Driver};
use crate::connection::{ConnectionState, NoopObserver, StatusObserver};
use crate::error::{ClientError, Result};
use crate::handler::{HandlerRegistry, HandlerResult, RequestContext};
use crate::pending::SharedPendingCalls;
use crate::protocol::Packet;
use crate::writer::{OutboundFrame, WriterHandle};

/// State shared between the client handle, the driver and keep-alive tasks.
pub(crate) struct Shared {
    pub(crate) config: ClientConfig,
    pub(crate) pending: SharedPendingCalls,
    pub(crate) handlers: Arc<HandlerRegistry>,
    pub(crate) semaphore: Arc<Semaphore>,
    writer: Mutex<Option<WriterHandle>>,
    state_tx: watch::Sender<ConnectionState>,
    observer: Arc<dyn StatusObserver>,
}

impl Shared {
    fn new(config: ClientConfig, handlers: HandlerRegistry, observer: Arc<dyn StatusObserver>) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            pending: SharedPendingCalls::new(config.max_sequence_number),
            semaphore: Arc::new(Semaphore::new(config.max_concurrent_handlers)),
            handlers: Arc::new(handlers),
            config,
            writer: Mutex::new(None),
            state_tx,
            observer,
        }
    }

    pub(crate) fn set_writer(&self, writer: Option<WriterHandle>) {
        *self.writer.lock().unwrap_or_else(PoisonError::into_inner) = writer;
    }

    fn current_writer(&self) -> Option<WriterHandle> {
        self.writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Record a lifecycle state and notify the observer if it changed.
    pub(crate) fn publish(&self, state: ConnectionState) {
        let changed = self.state_tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });

        if changed {
            tracing::debug!(?state, "Connection state changed");
            self.observer.update(state.status());
        }
    }

    /// Write a request and wait for its response.
    ///
    /// `timeout` covers queueing the frame as well as the wait, so a stalled
    /// writer surfaces as [`ClientError::Timeout`].
    pub(crate) async fn request(&self, packet: Packet, timeout: Duration) -> Result<Packet> {
        let (tx, mut rx) = oneshot::channel();
        let sq = self.pending.register(tx)?;
        let mut guard = PendingGuard {
            pending: &self.pending,
            sq,
            armed: true,
        };

        let frame = OutboundFrame::from_packet(&packet.with_sq(sq))?;
        let outcome = time::timeout(timeout, async {
            self.write(sq, frame).await;
            (&mut rx).await
        })
        .await;

        guard.disarm();
        match outcome {
            Ok(Ok(response)) => Ok(response),
            // Resolver dropped with the registry entry already gone
            Ok(Err(_)) => Err(ClientError::ConnectionClosed),
            Err(_) => self.expire(sq, timeout, &mut rx),
        }
    }

    /// Settle a request whose deadline passed. A response that won the race
    /// against the deadline is still delivered.
    fn expire(&self, sq: u32, timeout: Duration, rx: &mut oneshot::Receiver<Packet>) -> Result<Packet> {
        if !self.pending.cancel(sq) {
            if let Ok(response) = rx.try_recv() {
                return Ok(response);
            }
        }
        tracing::warn!(sq, timeout_ms = timeout.as_millis() as u64, "Response timeout");
        Err(ClientError::Timeout { sq })
    }

    /// Write a request frame. Without a live connection the frame is dropped
    /// and the request runs into its timeout.
    async fn write(&self, sq: u32, frame: OutboundFrame) {
        match self.current_writer() {
            Some(writer) => {
                tracing::debug!(sq, bytes = frame.size(), "Sending request");
                if let Err(e) = writer.send(frame).await {
                    tracing::warn!(sq, error = %e, "Request not written");
                }
            }
            None => tracing::warn!(sq, "Not connected, request not written"),
        }
    }
}

/// Removes a registry entry when the waiting request goes away early.
struct PendingGuard<'a> {
    pending: &'a SharedPendingCalls,
    sq: u32,
    armed: bool,
}

impl PendingGuard<'_> {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.pending.cancel(self.sq);
        }
    }
}

/// Builder for configuring and creating a [`Client`].
pub struct ClientBuilder {
    config: ClientConfig,
    registry: HandlerRegistry,
    observer: Arc<dyn StatusObserver>,
}

impl ClientBuilder {
    /// Create a builder with default configuration.
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
            registry: HandlerRegistry::new(),
            observer: Arc::new(NoopObserver),
        }
    }

    /// Replace the whole configuration, e.g. with [`ClientConfig::from_env`].
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    pub fn host(mut self, host: &str) -> Self {
        self.config.host = host.to_string();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Reconnect attempts after a close or error before giving up.
    ///
    /// Default: 3
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    /// Fixed delay before each reconnect attempt.
    ///
    /// Default: 3 seconds
    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.config.retry_delay = delay;
        self
    }

    /// Default time [`Client::request`] waits for a response.
    ///
    /// Default: 10 seconds
    pub fn response_timeout(mut self, timeout: Duration) -> Self {
        self.config.response_timeout = timeout;
        self
    }

    /// Exclusive wrap boundary for sequence numbers.
    ///
    /// Default: 65536
    pub fn max_sequence_number(mut self, max: u32) -> Self {
        self.config.max_sequence_number = max;
        self
    }

    /// Period of the keep-alive request.
    ///
    /// Default: 5 seconds
    pub fn keepalive_interval(mut self, interval: Duration) -> Self {
        self.config.keepalive_interval = interval;
        self
    }

    pub fn keepalive_action(mut self, action: &str) -> Self {
        self.config.keepalive_action = action.to_string();
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Set the maximum number of concurrent inbound handlers.
    ///
    /// When this limit is reached, new server requests are dropped with a warning.
    /// Default: 256
    pub fn max_concurrent_handlers(mut self, limit: usize) -> Self {
        self.config.max_concurrent_handlers = limit;
        self
    }

    /// Set the writer channel capacity.
    ///
    /// Default: 1024
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.config.writer.channel_capacity = capacity;
        self
    }

    /// Register a handler for server-initiated packets carrying `action`.
    ///
    /// The handler receives the deserialized packet and a context for replying.
    pub fn handle<F, T, Fut>(mut self, action: &str, handler: F) -> Self
    where
        F: Fn(T, RequestContext) -> Fut + Send + Sync + 'static,
        T: DeserializeOwned + Send + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.registry.register(action, handler);
        self
    }

    /// Receive a [`ConnectionStatus`](crate::ConnectionStatus) on every state change.
    pub fn observer(mut self, observer: impl StatusObserver) -> Self {
        self.observer = Arc::new(observer);
        self
    }

    /// Build the client without connecting.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn build(self) -> Client {
        let shared = Arc::new(Shared::new(self.config, self.registry, self.observer));
        let (commands, driver) = Driver::spawn(shared.clone());

        Client {
            shared,
            commands,
            driver,
        }
    }

    /// Build the client and start connecting.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(self) -> Client {
        let client = self.build();
        client.connect();
        client
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A client holding one persistent connection to the server.
///
/// Dropping the client stops the connection driver.
pub struct Client {
    shared: Arc<Shared>,
    commands: mpsc::UnboundedSender<Command>,
    driver: JoinHandle<()>,
}

impl Client {
    /// Create a new client builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Open the connection, dropping any current one.
    ///
    /// Unlike an automatic reconnect, this restores the full retry budget
    /// right away instead of on the next successful connect, so a client
    /// that gave up can be revived with a fresh set of attempts.
    pub fn connect(&self) {
        if self.commands.send(Command::Connect).is_err() {
            tracing::warn!("Connection driver is gone, connect ignored");
        }
    }

    /// Send a request and wait for its response with the configured timeout.
    ///
    /// `packet` must serialize to a JSON object. Any `sq` it carries is
    /// replaced by the allocated sequence number.
    pub async fn request<T: Serialize>(&self, packet: &T) -> Result<Packet> {
        self.request_with_timeout(packet, self.shared.config.response_timeout)
            .await
    }

    /// Send a request and wait at most `timeout` for its response.
    pub async fn request_with_timeout<T: Serialize>(&self, packet: &T, timeout: Duration) -> Result<Packet> {
        let packet = Packet::from_serialize(packet)?;
        self.shared.request(packet, timeout).await
    }

    /// Send a request and deserialize the response into `R`.
    pub async fn request_as<T: Serialize, R: DeserializeOwned>(&self, packet: &T) -> Result<R> {
        self.request(packet).await?.deserialize()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        *self.shared.state_tx.borrow()
    }

    /// Watch lifecycle state changes.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state_tx.subscribe()
    }

    /// Requests still waiting for a response.
    pub fn pending_requests(&self) -> usize {
        self.shared.pending.len()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.shared.config
    }

    /// Close the connection, cancel any scheduled retry and stop the driver.
    pub async fn shutdown(self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Err(e) = self.driver.await {
            tracing::error!(error = %e, "Connection driver failed");
        }
    }
}
