//! Batch edit coordination: per-connection transaction nesting.
//!
//! Each remote connection carries its own nesting counter, so an unbalanced
//! or late-closing connection can never desynchronize another connection's
//! transactions. A closed connection's counter holds a negative sentinel
//! forever; begin/end on it fail without side effects.
//!
//! The counter read-modify-write runs under a mutex even though the editing
//! session is single-threaded-cooperative: connection close can be
//! delivered from a different execution context than the in-flight calls
//! it races with.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

/// Permanently-closed sentinel for a nesting counter.
const CLOSED: i32 = -1;

/// Handle for one remote connection. Ids are never reused within a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub u64);

/// Outcome of a `begin` call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BeginResult {
    /// Unknown or closed connection; nothing changed.
    Rejected,
    /// Outermost begin: the 0 -> 1 transition. The caller opens the window.
    Entered,
    /// Nested begin.
    Nested,
}

/// Outcome of an `end` call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EndResult {
    /// Unknown, closed, or unbalanced; nothing changed.
    Rejected,
    /// Outermost end: the 1 -> 0 transition. The caller finalizes.
    Exited,
    /// Still nested.
    Nested,
}

/// Connection table with per-connection nesting counters.
///
/// Multiple connections exist over the session lifetime as the remote peer
/// detaches and reattaches, but only one is live at a time.
#[derive(Default)]
pub struct BatchCoordinator {
    counters: HashMap<ConnectionId, Arc<Mutex<i32>>>,
    live: Option<ConnectionId>,
    next_id: u64,
}

impl BatchCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// The currently live connection, if any.
    pub fn live(&self) -> Option<ConnectionId> {
        self.live
    }

    /// True if `id` names a connection that has not been closed.
    pub fn is_open(&self, id: ConnectionId) -> bool {
        self.counters
            .get(&id)
            .is_some_and(|c| *lock(c) >= 0)
    }

    /// Register a new connection and make it live. Any previous live
    /// connection must be force-closed by the caller first.
    pub fn open(&mut self) -> ConnectionId {
        let id = ConnectionId(self.next_id);
        self.next_id += 1;
        self.counters.insert(id, Arc::new(Mutex::new(0)));
        self.live = Some(id);
        debug!(target: "etch::ime", id = id.0, "connection registered");
        id
    }

    /// Increment the connection's nesting. Rejected (with no side effects)
    /// on an unknown or closed connection.
    pub fn begin(&self, id: ConnectionId) -> BeginResult {
        let Some(counter) = self.counters.get(&id) else {
            return BeginResult::Rejected;
        };
        let mut nesting = lock(counter);
        if *nesting < 0 {
            return BeginResult::Rejected;
        }
        *nesting += 1;
        if *nesting == 1 {
            BeginResult::Entered
        } else {
            BeginResult::Nested
        }
    }

    /// Decrement the connection's nesting. Rejected on an unknown or closed
    /// connection, and on an `end` with no matching `begin`.
    pub fn end(&self, id: ConnectionId) -> EndResult {
        let Some(counter) = self.counters.get(&id) else {
            return EndResult::Rejected;
        };
        let mut nesting = lock(counter);
        if *nesting <= 0 {
            return EndResult::Rejected;
        }
        *nesting -= 1;
        if *nesting == 0 {
            EndResult::Exited
        } else {
            EndResult::Nested
        }
    }

    /// Drain any outstanding nesting and permanently close the connection.
    ///
    /// Returns true when the drain crossed the 1 -> 0 transition, in which
    /// case the caller must run the normal finalization exactly once.
    /// Closing an already-closed or unknown connection is a no-op.
    pub fn force_close(&mut self, id: ConnectionId) -> bool {
        let Some(counter) = self.counters.get(&id) else {
            return false;
        };
        let mut nesting = lock(counter);
        if *nesting < 0 {
            return false;
        }
        let needs_finalize = *nesting > 0;
        *nesting = CLOSED;
        drop(nesting);
        if self.live == Some(id) {
            self.live = None;
        }
        debug!(target: "etch::ime", id = id.0, needs_finalize, "connection closed");
        needs_finalize
    }
}

// The session is single-threaded-cooperative; a poisoned counter can only
// come from a panic that is already unwinding past us.
fn lock(counter: &Mutex<i32>) -> std::sync::MutexGuard<'_, i32> {
    counter.lock().unwrap_or_else(PoisonError::into_inner)
}
