//! Pending-call registry: sequence number allocation and response correlation.
//!
//! Each outstanding request owns one entry keyed by its `sq`. The entry holds
//! the `oneshot` sender that settles the caller. An entry leaves the registry
//! exactly once: through [`PendingCalls::resolve`] when the response arrives,
//! or through [`PendingCalls::cancel`] when the caller times out or gives up.
//!
//! Sequence numbers run from 1 up to (but excluding) the configured maximum
//! and then wrap. A number still held by a live entry is skipped.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;

use crate::error::{ClientError, Result};
use crate::protocol::Packet;

/// Default wrap boundary for sequence numbers.
pub const DEFAULT_MAX_SEQUENCE_NUMBER: u32 = 65536;

/// First sequence number handed out (0 is never used).
const FIRST_SQ: u32 = 1;

/// Resolver for one outstanding request.
pub type Resolver = oneshot::Sender<Packet>;

/// Registry of outstanding requests.
#[derive(Debug)]
pub struct PendingCalls {
    /// Resolvers by sequence number.
    calls: HashMap<u32, Resolver>,
    /// Next sequence number to try.
    next_sq: u32,
    /// Exclusive upper bound of the sequence space.
    max_sq: u32,
}

impl PendingCalls {
    /// Create a registry whose sequence numbers wrap at `max_sequence_number`.
    pub fn new(max_sequence_number: u32) -> Self {
        Self {
            calls: HashMap::new(),
            next_sq: FIRST_SQ,
            max_sq: max_sequence_number.max(FIRST_SQ + 1),
        }
    }

    /// Allocate the next free sequence number and store `resolver` under it.
    pub fn register(&mut self, resolver: Resolver) -> Result<u32> {
        let capacity = (self.max_sq - FIRST_SQ) as usize;
        if self.calls.len() >= capacity {
            return Err(ClientError::SequenceExhausted { max: self.max_sq });
        }

        loop {
            let sq = self.next_sq;
            self.next_sq = if sq + 1 >= self.max_sq { FIRST_SQ } else { sq + 1 };

            if !self.calls.contains_key(&sq) {
                self.calls.insert(sq, resolver);
                return Ok(sq);
            }
        }
    }

    /// Settle the call registered under `sq` with `packet`.
    ///
    /// Returns false (and does nothing) when no entry exists, which is the
    /// normal outcome for a response arriving after its request timed out.
    pub fn resolve(&mut self, sq: u32, packet: Packet) -> bool {
        match self.calls.remove(&sq) {
            Some(resolver) => {
                if resolver.send(packet).is_err() {
                    tracing::debug!(sq, "Caller stopped waiting before response arrived");
                }
                true
            }
            None => {
                tracing::info!(sq, "Received response for unknown or expired request");
                false
            }
        }
    }

    /// Remove the entry for `sq` without settling it.
    pub fn cancel(&mut self, sq: u32) -> bool {
        self.calls.remove(&sq).is_some()
    }

    /// Whether an entry for `sq` is live.
    pub fn contains(&self, sq: u32) -> bool {
        self.calls.contains_key(&sq)
    }

    /// Number of outstanding requests.
    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}

impl Default for PendingCalls {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SEQUENCE_NUMBER)
    }
}

/// Cheaply cloneable handle to a registry shared between the reader task
/// and request callers. The lock is only held for map operations.
#[derive(Debug, Clone, Default)]
pub struct SharedPendingCalls(Arc<Mutex<PendingCalls>>);

impl SharedPendingCalls {
    pub fn new(max_sequence_number: u32) -> Self {
        Self(Arc::new(Mutex::new(PendingCalls::new(max_sequence_number))))
    }

    fn lock(&self) -> MutexGuard<'_, PendingCalls> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register(&self, resolver: Resolver) -> Result<u32> {
        self.lock().register(resolver)
    }

    pub fn resolve(&self, sq: u32, packet: Packet) -> bool {
        self.lock().resolve(sq, packet)
    }

    pub fn cancel(&self, sq: u32) -> bool {
        self.lock().cancel(sq)
    }

    pub fn contains(&self, sq: u32) -> bool {
        self.lock().contains(sq)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
