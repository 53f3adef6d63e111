//! Async driver for the connection lifecycle.
//!
//! A single task owns the [`Lifecycle`] state machine, the retry timer, the
//! keep-alive timer and the current link. Socket work happens on helper
//! tasks that report back through a channel, tagged with the epoch of the
//! link they belong to; reports from a discarded link are ignored.
//!
//! ```text
//! Client ──Command──► Driver ──spawn──► dial task ──LinkEvent──┐
//!                       ▲                                      │
//!                       └──────────── session task (read+write)┘
//! ```

use std::future::pending;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, Interval, MissedTickBehavior, Sleep};

use super::lifecycle::{Effect, Lifecycle};
use super::status::ConnectionState;
use crate::client::Shared;
use crate::error::{ClientError, Result};
use crate::protocol::{FrameBuffer, Packet};
use crate::router::Router;
use crate::writer::{writer_channel, writer_loop};

/// Socket read buffer size.
pub(crate) const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Requests from the client handle.
#[derive(Debug)]
pub(crate) enum Command {
    Connect,
    Shutdown,
}

/// Reports from dial and session tasks.
#[derive(Debug)]
enum LinkEvent {
    Connected { epoch: u64, stream: TcpStream },
    ConnectFailed { epoch: u64, error: ClientError },
    Closed { epoch: u64 },
    Failed { epoch: u64, error: ClientError },
}

/// The socket side of the connection.
enum Link {
    Idle,
    Dialing { epoch: u64, task: JoinHandle<()> },
    Open { epoch: u64, task: JoinHandle<()> },
}

pub(crate) struct Driver {
    shared: Arc<Shared>,
    lifecycle: Lifecycle,
    epoch: u64,
    link: Link,
    retry: Option<Pin<Box<Sleep>>>,
    probe: Option<Interval>,
    events_tx: mpsc::UnboundedSender<LinkEvent>,
    events_rx: mpsc::UnboundedReceiver<LinkEvent>,
}

impl Driver {
    /// Spawn the driver task. It runs until `Command::Shutdown` or until every
    /// command sender is dropped.
    pub(crate) fn spawn(shared: Arc<Shared>) -> (mpsc::UnboundedSender<Command>, JoinHandle<()>) {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let driver = Driver {
            lifecycle: Lifecycle::new(shared.config.max_retries),
            shared,
            epoch: 0,
            link: Link::Idle,
            retry: None,
            probe: None,
            events_tx,
            events_rx,
        };

        (commands_tx, tokio::spawn(driver.run(commands_rx)))
    }

    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Connect) => {
                        let effects = self.lifecycle.connect();
                        self.apply(effects);
                    }
                    Some(Command::Shutdown) | None => {
                        let effects = self.lifecycle.shutdown();
                        self.apply(effects);
                        break;
                    }
                },
                Some(event) = self.events_rx.recv() => self.handle_event(event),
                () = wait_retry(&mut self.retry) => {
                    self.retry = None;
                    let effects = self.lifecycle.on_retry_elapsed();
                    self.apply(effects);
                }
                () = wait_probe(&mut self.probe) => self.send_keepalive(),
            }
        }

        tracing::debug!("Connection driver stopped");
    }

    fn handle_event(&mut self, event: LinkEvent) {
        match event {
            LinkEvent::Connected { epoch, stream } => {
                if !self.is_dialing(epoch) {
                    return;
                }
                tracing::info!(address = %self.shared.config.address(), "Connection established");
                self.open(epoch, stream);
                let effects = self.lifecycle.on_connected();
                self.apply(effects);
            }
            LinkEvent::ConnectFailed { epoch, error } => {
                if !self.is_dialing(epoch) {
                    return;
                }
                tracing::error!(error = %error, "Connect failed");
                self.disconnected();
            }
            LinkEvent::Closed { epoch } => {
                if !self.is_open(epoch) {
                    return;
                }
                tracing::info!("Connection closed");
                self.disconnected();
            }
            LinkEvent::Failed { epoch, error } => {
                if !self.is_open(epoch) {
                    return;
                }
                tracing::error!(error = %error, "Socket error");
                self.disconnected();
            }
        }
    }

    fn disconnected(&mut self) {
        self.close_link();
        let effects = self.lifecycle.on_disconnected();
        self.apply(effects);

        if self.lifecycle.state() == ConnectionState::Disconnected {
            tracing::warn!(
                retries = self.lifecycle.retry_count(),
                "Retry budget exhausted, staying disconnected"
            );
        }
    }

    fn apply(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::OpenSocket => {
                    self.close_link();
                    self.dial();
                }
                Effect::CloseSocket => self.close_link(),
                Effect::StartProbe => {
                    let period = self.shared.config.keepalive_interval.max(Duration::from_millis(1));
                    let mut interval = time::interval_at(Instant::now() + period, period);
                    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                    self.probe = Some(interval);
                }
                Effect::StopProbe => self.probe = None,
                Effect::ScheduleRetry => {
                    let delay = self.shared.config.retry_delay;
                    tracing::info!(
                        attempt = self.lifecycle.retry_count(),
                        delay_ms = delay.as_millis() as u64,
                        "Trying to reconnect"
                    );
                    self.retry = Some(Box::pin(time::sleep(delay)));
                }
                Effect::CancelRetry => self.retry = None,
            }
        }

        self.shared.publish(self.lifecycle.state());
    }

    fn dial(&mut self) {
        self.epoch += 1;
        let epoch = self.epoch;
        let address = self.shared.config.address();
        let timeout = self.shared.config.connect_timeout;
        let events = self.events_tx.clone();

        tracing::info!(%address, "Establishing connection");

        let task = tokio::spawn(async move {
            let event = match time::timeout(timeout, TcpStream::connect(address.as_str())).await {
                Ok(Ok(stream)) => LinkEvent::Connected { epoch, stream },
                Ok(Err(e)) => LinkEvent::ConnectFailed {
                    epoch,
                    error: ClientError::Io(e),
                },
                Err(_) => LinkEvent::ConnectFailed {
                    epoch,
                    error: ClientError::Io(std::io::Error::new(
                        std::io::ErrorKind::TimedOut,
                        "connect timed out",
                    )),
                },
            };
            let _ = events.send(event);
        });

        self.link = Link::Dialing { epoch, task };
    }

    /// Split the socket and run reader and writer on one session task.
    fn open(&mut self, epoch: u64, stream: TcpStream) {
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(error = %e, "Could not set TCP_NODELAY");
        }

        let (read_half, write_half) = stream.into_split();
        let (writer, queue) = writer_channel(&self.shared.config.writer);
        let router = Router::new(
            self.shared.pending.clone(),
            self.shared.handlers.clone(),
            writer.clone(),
            self.shared.semaphore.clone(),
        );
        self.shared.set_writer(Some(writer));

        let events = self.events_tx.clone();
        let task = tokio::spawn(async move {
            let outcome = tokio::select! {
                result = read_loop(read_half, router) => result,
                result = writer_loop(queue, write_half) => result,
            };
            let event = match outcome {
                Ok(()) => LinkEvent::Closed { epoch },
                Err(error) => LinkEvent::Failed { epoch, error },
            };
            let _ = events.send(event);
        });

        self.link = Link::Open { epoch, task };
    }

    fn close_link(&mut self) {
        match std::mem::replace(&mut self.link, Link::Idle) {
            Link::Idle => {}
            Link::Dialing { task, .. } | Link::Open { task, .. } => task.abort(),
        }
        self.shared.set_writer(None);
    }

    fn is_dialing(&self, epoch: u64) -> bool {
        matches!(self.link, Link::Dialing { epoch: current, .. } if current == epoch)
    }

    fn is_open(&self, epoch: u64) -> bool {
        matches!(self.link, Link::Open { epoch: current, .. } if current == epoch)
    }

    fn send_keepalive(&self) {
        let shared = self.shared.clone();
        tokio::spawn(async move {
            let packet = Packet::request(&shared.config.keepalive_action);
            match shared.request(packet, shared.config.response_timeout).await {
                Ok(_) => tracing::debug!("Keep-alive answered"),
                Err(e) => tracing::debug!(error = %e, "Keep-alive unanswered"),
            }
        });
    }
}

async fn wait_retry(retry: &mut Option<Pin<Box<Sleep>>>) {
    match retry {
        Some(sleep) => sleep.as_mut().await,
        None => pending().await,
    }
}

async fn wait_probe(probe: &mut Option<Interval>) {
    match probe {
        Some(interval) => {
            interval.tick().await;
        }
        None => pending().await,
    }
}

/// Read loop - feeds socket bytes to the frame buffer and routes every frame.
///
/// Returns `Ok(())` when the peer closes the connection.
pub(crate) async fn read_loop<R: AsyncRead + Unpin>(mut reader: R, router: Router) -> Result<()> {
    let mut frame_buffer = FrameBuffer::new();
    let mut buf = vec![0u8; READ_BUFFER_SIZE];

    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => return Ok(()),
            Ok(n) => n,
            Err(e) => return Err(ClientError::Io(e)),
        };

        tracing::debug!(bytes = n, "Receiving data");

        for frame in frame_buffer.push(&buf[..n]) {
            router.route_frame(&frame);
        }
    }
}
