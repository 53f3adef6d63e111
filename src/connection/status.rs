//! Connection state and the observer that mirrors it.

use serde::Serialize;

/// Lifecycle state of the single client connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No socket and no retry scheduled.
    #[default]
    Disconnected,
    /// Dialing the server.
    Connecting,
    /// Socket open; requests flow.
    Connected,
    /// Socket lost; a retry may be scheduled.
    Reconnecting,
}

impl ConnectionState {
    /// The flags reported to a [`StatusObserver`].
    pub fn status(self) -> ConnectionStatus {
        ConnectionStatus {
            is_connecting: self == ConnectionState::Connecting,
            is_connected: self == ConnectionState::Connected,
        }
    }
}

/// Flattened view of the connection state for UI-style consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatus {
    pub is_connecting: bool,
    pub is_connected: bool,
}

/// Receives a status update on every lifecycle transition.
pub trait StatusObserver: Send + Sync + 'static {
    fn update(&self, status: ConnectionStatus);
}

impl<F> StatusObserver for F
where
    F: Fn(ConnectionStatus) + Send + Sync + 'static,
{
    fn update(&self, status: ConnectionStatus) {
        self(status)
    }
}

/// Observer that ignores updates.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl StatusObserver for NoopObserver {
    fn update(&self, _status: ConnectionStatus) {}
}
