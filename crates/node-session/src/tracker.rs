//! Latest-snapshot cell shared between the receive pump and callers blocked
//! in peer queries.

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::debug;

use crate::error::{SessionError, SessionResult};
use crate::network::NetworkSnapshot;

#[derive(Default)]
struct TrackerState {
    latest: Option<NetworkSnapshot>,
    updates: u64,
    closed: bool,
    /// Why the network link ended, once it has.
    disconnected: Option<String>,
}

/// Holds the most recent network snapshot and wakes waiters on updates.
#[derive(Default)]
pub(crate) struct PeerTracker {
    state: Mutex<TrackerState>,
    updated: Condvar,
}

impl PeerTracker {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Replace the current snapshot.
    pub(crate) fn publish(&self, snapshot: NetworkSnapshot) {
        let mut state = self.state.lock();
        if state.closed {
            return;
        }
        debug!(
            reporter = %snapshot.reporter,
            peers = snapshot.peers.len(),
            "Network snapshot updated"
        );
        state.latest = Some(snapshot);
        state.updates += 1;
        drop(state);
        self.updated.notify_all();
    }

    /// Current snapshot, waiting up to `timeout` for the first one.
    pub(crate) fn wait(&self, timeout: Duration) -> SessionResult<NetworkSnapshot> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        loop {
            if state.closed {
                return Err(SessionError::Closed);
            }
            if let Some(reason) = &state.disconnected {
                return Err(SessionError::Connection(reason.clone()));
            }
            if let Some(snapshot) = &state.latest {
                return Ok(snapshot.clone());
            }
            if self.updated.wait_until(&mut state, deadline).timed_out() {
                return match (&state.latest, state.closed, &state.disconnected) {
                    (_, true, _) => Err(SessionError::Closed),
                    (_, false, Some(reason)) => Err(SessionError::Connection(reason.clone())),
                    (Some(snapshot), false, None) => Ok(snapshot.clone()),
                    (None, false, None) => Err(SessionError::Timeout(timeout)),
                };
            }
        }
    }

    /// Number of snapshots published so far.
    pub(crate) fn updates(&self) -> u64 {
        self.state.lock().updates
    }

    /// Record that the network link ended. Waiters fail with `Connection`.
    pub(crate) fn disconnect(&self, reason: impl Into<String>) {
        let mut state = self.state.lock();
        if state.closed || state.disconnected.is_some() {
            return;
        }
        state.disconnected = Some(reason.into());
        drop(state);
        self.updated.notify_all();
    }

    /// Whether the network link is still up.
    pub(crate) fn is_connected(&self) -> bool {
        self.state.lock().disconnected.is_none()
    }

    /// Wake all waiters with `Closed` and ignore further updates.
    pub(crate) fn close(&self) {
        self.state.lock().closed = true;
        self.updated.notify_all();
    }
}
