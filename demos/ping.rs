//! Ping - connect, answer server pushes and send one request.
//!
//! Reads `JSONWIRE_*` settings from the environment (a `.env` file works too)
//! and logs through `RUST_LOG`, e.g.:
//!
//! ```text
//! JSONWIRE_PORT=10088 RUST_LOG=jsonwire_client=debug cargo run --example ping
//! ```

use std::time::Duration;

use jsonwire_client::{Client, ClientConfig, ConnectionState, ConnectionStatus, RequestContext};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing_subscriber::EnvFilter;

/// Payload of the server's `notice` push.
#[derive(Deserialize, Debug)]
struct Notice {
    text: String,
}

#[derive(Serialize, Debug)]
struct Seen {
    seen: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ClientConfig::from_env();
    tracing::info!(address = %config.address(), "Starting ping");

    let client = Client::builder()
        .config(config)
        .observer(|status: ConnectionStatus| {
            tracing::info!(
                connecting = status.is_connecting,
                connected = status.is_connected,
                "Status"
            );
        })
        .handle("notice", |notice: Notice, ctx: RequestContext| async move {
            tracing::info!(text = %notice.text, "Server notice");
            ctx.respond(&Seen { seen: notice.text.len() }).await
        })
        .start();

    tokio::time::timeout(
        Duration::from_secs(30),
        client
            .subscribe()
            .wait_for(|state| *state == ConnectionState::Connected),
    )
    .await??;

    let started = tokio::time::Instant::now();
    let reply = client.request(&json!({ "action": "ping" })).await?;
    tracing::info!(
        rtt_ms = started.elapsed().as_millis() as u64,
        reply = ?reply,
        "Pong"
    );

    client.shutdown().await;
    Ok(())
}
