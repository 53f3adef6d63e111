//! Dedicated writer task for outbound frames.
//!
//! Each connection gets one writer task that owns the socket's write half and
//! receives frames via an mpsc channel. Request callers, the keep-alive probe
//! and inbound handlers only ever hold a [`WriterHandle`].
//!
//! # Architecture
//!
//! ```text
//! Request API ─┐
//! Keep-alive  ─┼─► mpsc::Sender<OutboundFrame> ─► Writer Task ─► Socket
//! Handlers    ─┘
//! ```
//!
//! Ready frames are batched into a single vectored write.

use std::io::IoSlice;

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{ClientError, Result};
use crate::protocol::{length_prefix, Packet};

/// Default channel capacity.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Maximum frames to batch in a single write operation.
const MAX_BATCH_SIZE: usize = 64;

/// A frame ready to be written to the socket.
#[derive(Debug, Clone)]
pub struct OutboundFrame {
    /// Encoded length prefix (`"<len>\n"`).
    pub prefix: Bytes,
    /// JSON payload bytes.
    pub payload: Bytes,
}

impl OutboundFrame {
    /// Create a new outbound frame around an encoded payload.
    #[inline]
    pub fn new(payload: Bytes) -> Self {
        Self {
            prefix: length_prefix(payload.len()),
            payload,
        }
    }

    /// Encode a packet as an outbound frame.
    pub fn from_packet(packet: &Packet) -> Result<Self> {
        Ok(Self::new(Bytes::from(packet.to_vec()?)))
    }

    /// Total size of this frame (prefix + payload).
    #[inline]
    pub fn size(&self) -> usize {
        self.prefix.len() + self.payload.len()
    }
}

/// Configuration for the writer task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriterConfig {
    /// Channel capacity for the frame queue.
    pub channel_capacity: usize,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

/// Handle for sending frames to the writer task.
///
/// This is cheaply cloneable. Sending fails with
/// [`ClientError::ConnectionClosed`] once the writer task has stopped.
#[derive(Debug, Clone)]
pub struct WriterHandle {
    tx: mpsc::Sender<OutboundFrame>,
}

impl WriterHandle {
    /// Queue a frame for writing.
    pub async fn send(&self, frame: OutboundFrame) -> Result<()> {
        self.tx
            .send(frame)
            .await
            .map_err(|_| ClientError::ConnectionClosed)
    }

    /// Encode and queue a packet.
    pub async fn send_packet(&self, packet: &Packet) -> Result<()> {
        self.send(OutboundFrame::from_packet(packet)?).await
    }

    /// Whether the writer task has stopped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Create a writer handle and the queue its task drains.
pub fn writer_channel(config: &WriterConfig) -> (WriterHandle, mpsc::Receiver<OutboundFrame>) {
    let (tx, rx) = mpsc::channel(config.channel_capacity.max(1));
    (WriterHandle { tx }, rx)
}

/// Spawn the writer task and return a handle for sending frames.
pub fn spawn_writer_task<W>(
    writer: W,
    config: WriterConfig,
) -> (WriterHandle, JoinHandle<Result<()>>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (handle, rx) = writer_channel(&config);
    let task = tokio::spawn(writer_loop(rx, writer));
    (handle, task)
}

/// Main writer loop - receives frames and writes them to the socket.
///
/// Returns `Ok(())` when every handle has been dropped, or the first I/O error.
pub async fn writer_loop<W>(mut rx: mpsc::Receiver<OutboundFrame>, mut writer: W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    loop {
        let first = match rx.recv().await {
            Some(f) => f,
            None => return Ok(()),
        };

        // Collect additional ready frames (non-blocking)
        let mut batch = Vec::with_capacity(MAX_BATCH_SIZE);
        batch.push(first);

        while batch.len() < MAX_BATCH_SIZE {
            match rx.try_recv() {
                Ok(frame) => batch.push(frame),
                Err(_) => break,
            }
        }

        tracing::debug!(frames = batch.len(), "Writing batch");
        write_batch(&mut writer, &batch).await?;
    }
}

/// Write a batch of frames using scatter/gather I/O (write_vectored).
async fn write_batch<W>(writer: &mut W, batch: &[OutboundFrame]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    if batch.is_empty() {
        return Ok(());
    }

    let total_size: usize = batch.iter().map(OutboundFrame::size).sum();
    let mut total_written = 0;

    while total_written < total_size {
        let slices = build_remaining_slices(batch, total_written);
        let written = writer.write_vectored(&slices).await?;

        if written == 0 {
            return Err(ClientError::Io(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                "write_vectored returned 0",
            )));
        }

        total_written += written;
    }

    writer.flush().await?;
    Ok(())
}

/// Build IoSlice array for the data not yet written.
fn build_remaining_slices(batch: &[OutboundFrame], skip_bytes: usize) -> Vec<IoSlice<'_>> {
    let mut slices = Vec::with_capacity(batch.len() * 2);
    let mut offset = 0;

    for frame in batch {
        for part in [&frame.prefix, &frame.payload] {
            let start = offset;
            let end = offset + part.len();

            if skip_bytes < end {
                let from = skip_bytes.saturating_sub(start);
                slices.push(IoSlice::new(&part[from..]));
            }
            offset = end;
        }
    }

    slices
}
