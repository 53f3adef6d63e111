//! # jsonwire-client
//!
//! Client for servers speaking a length-prefixed JSON protocol over one
//! persistent TCP connection.
//!
//! Every packet travels as `<decimal byte length>\n<JSON object>`. Requests
//! carry an `action` and a client-chosen sequence number `sq`; the server
//! answers with an object carrying the same `sq`. The server may also push
//! packets with an `action` of its own, which are dispatched to registered
//! handlers.
//!
//! ## Architecture
//!
//! - **Framing** ([`protocol`]): stateful decoder that survives arbitrary
//!   TCP segmentation
//! - **Correlation** ([`pending`]): wrapping sequence numbers mapped to
//!   waiting requests
//! - **Lifecycle** ([`connection`]): connect, bounded reconnect with a fixed
//!   delay, periodic keep-alive
//!
//! ## Example
//!
//! ```no_run
//! use jsonwire_client::{Client, ConnectionState};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::builder().host("127.0.0.1").port(10088).start();
//!
//!     client
//!         .subscribe()
//!         .wait_for(|state| *state == ConnectionState::Connected)
//!         .await?;
//!
//!     let reply = client.request(&json!({ "action": "status" })).await?;
//!     println!("{:?}", reply);
//!
//!     client.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod config;
pub mod connection;
pub mod error;
pub mod handler;
pub mod pending;
pub mod protocol;
pub mod router;
pub mod writer;

mod client;

pub use client::{Client, ClientBuilder};
pub use config::ClientConfig;
pub use connection::{ConnectionState, ConnectionStatus, StatusObserver};
pub use error::{ClientError, Result};
pub use handler::RequestContext;
pub use protocol::Packet;
