//! Connection lifecycle.
//!
//! [`Lifecycle`] is the pure state machine: it decides transitions and
//! returns the [`Effect`]s to carry out. The crate-private driver owns the
//! socket, the retry timer and the keep-alive timer and executes those
//! effects.

pub(crate) mod driver;
mod lifecycle;
mod status;

pub use lifecycle::{Effect, Lifecycle};
pub use status::{ConnectionState, ConnectionStatus, NoopObserver, StatusObserver};
