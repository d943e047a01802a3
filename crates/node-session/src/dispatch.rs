//! # Event Dispatch
//!
//! Two stages connect the network to the handlers:
//!
//! ```text
//!  transport ──► receive pump (async, session runtime) ──► dispatch queue
//!                     │                                          │
//!                     └─► PeerTracker (NET_MON snapshots)        ▼
//!                                                  dispatch worker (OS thread)
//!                                                          │
//!                                          on_heartbeat / on_payload
//! ```
//!
//! A single dispatch worker serves all nodes, so events are handled in
//! arrival order across the whole session. A slow handler delays every
//! later event.
//!
//! Handlers run under the read side of the session's drain lock and only
//! while the session is accepting. `close` flips the flag and takes the
//! write side, so once it returns no handler can start.

use std::any::Any;
use std::ops::ControlFlow;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread;

use tokio::sync::{mpsc, watch};
use tracing::{debug, error, warn};

use crate::error::SessionError;
use crate::events::{HeartbeatEvent, InboundMessage, Payload};
use crate::network::NetworkSnapshot;
use crate::session::{Session, SessionInner};
use crate::tracker::PeerTracker;
use crate::transport::InboundReceiver;

/// Dispatch counters for one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Heartbeats handed to `on_heartbeat`.
    pub heartbeats: u64,
    /// Payloads handed to `on_payload`.
    pub payloads: u64,
    /// Messages dropped because no handler was registered for their kind.
    pub unhandled: u64,
    /// Messages dropped by the node/pipeline/plugin filters.
    pub filtered: u64,
    /// Handler invocations that returned an error or panicked.
    pub handler_errors: u64,
    /// Network snapshots received.
    pub snapshots: u64,
}

#[derive(Default)]
pub(crate) struct DispatchCounters {
    heartbeats: AtomicU64,
    payloads: AtomicU64,
    unhandled: AtomicU64,
    filtered: AtomicU64,
    handler_errors: AtomicU64,
}

impl DispatchCounters {
    pub(crate) fn snapshot(&self, snapshots: u64) -> DispatchStats {
        DispatchStats {
            heartbeats: self.heartbeats.load(Ordering::Relaxed),
            payloads: self.payloads.load(Ordering::Relaxed),
            unhandled: self.unhandled.load(Ordering::Relaxed),
            filtered: self.filtered.load(Ordering::Relaxed),
            handler_errors: self.handler_errors.load(Ordering::Relaxed),
            snapshots,
        }
    }
}

// ============================================================================
// Receive pump
// ============================================================================

/// Forward transport messages to the dispatch queue, recording network
/// snapshots on the way.
///
/// When the transport ends the tracker is marked disconnected so peer
/// queries fail with `Connection` instead of serving stale data.
pub(crate) async fn pump(
    mut inbound: InboundReceiver,
    queue: mpsc::Sender<InboundMessage>,
    tracker: Arc<PeerTracker>,
    mut shutdown: watch::Receiver<bool>,
    endpoint: String,
) {
    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => {
                debug!(endpoint = %endpoint, "Receive pump stopping");
                break;
            }
            message = inbound.recv() => {
                let Some(message) = message else {
                    warn!(endpoint = %endpoint, "Network connection closed");
                    tracker.disconnect(format!("connection to {endpoint} lost"));
                    break;
                };

                if let InboundMessage::Payload(payload) = &message {
                    if let Some(snapshot) = NetworkSnapshot::from_payload(payload) {
                        tracker.publish(snapshot);
                    }
                }

                tokio::select! {
                    biased;
                    _ = shutdown.changed() => break,
                    sent = queue.send(message) => {
                        if sent.is_err() {
                            debug!(endpoint = %endpoint, "Dispatch queue closed");
                            break;
                        }
                    }
                }
            }
        }
    }
}

// ============================================================================
// Dispatch worker
// ============================================================================

/// Body of the dispatch thread.
pub(crate) fn run_dispatcher(session: Weak<SessionInner>, mut queue: mpsc::Receiver<InboundMessage>) {
    match session.upgrade() {
        Some(inner) => {
            let _ = inner.dispatch_thread_id.set(thread::current().id());
        }
        None => return,
    }

    while let Some(message) = queue.blocking_recv() {
        let Some(inner) = session.upgrade() else {
            break;
        };
        if Session::from_inner(inner).dispatch(message).is_break() {
            break;
        }
    }
    debug!("Dispatch worker stopped");
}

impl Session {
    /// Route one message to its handler.
    ///
    /// Returns `Break` once the session stopped accepting.
    pub(crate) fn dispatch(&self, message: InboundMessage) -> ControlFlow<()> {
        let inner = &self.inner;
        let _gate = inner.drain.read();
        if !inner.is_accepting() {
            return ControlFlow::Break(());
        }

        match message {
            InboundMessage::Heartbeat(event) => self.dispatch_heartbeat(&event),
            InboundMessage::Payload(payload) => self.dispatch_payload(&payload),
        }
        ControlFlow::Continue(())
    }

    fn dispatch_heartbeat(&self, event: &HeartbeatEvent) {
        let inner = &self.inner;
        if !inner.filters.accepts_node(&event.node_address) {
            inner.counters.filtered.fetch_add(1, Ordering::Relaxed);
            debug!(node = %event.node_address, "Heartbeat filtered out");
            return;
        }
        let Some(handler) = &inner.handlers.on_heartbeat else {
            inner.counters.unhandled.fetch_add(1, Ordering::Relaxed);
            debug!(node = %event.node_address, "No heartbeat handler, dropping");
            return;
        };

        inner.counters.heartbeats.fetch_add(1, Ordering::Relaxed);
        self.invoke("on_heartbeat", &event.node_address, || {
            handler(self, &event.node_address, &event.data)
        });
    }

    fn dispatch_payload(&self, payload: &Payload) {
        let inner = &self.inner;
        if !inner.filters.accepts_payload(payload) {
            inner.counters.filtered.fetch_add(1, Ordering::Relaxed);
            debug!(
                node = %payload.node_address,
                signature = %payload.plugin_signature,
                "Payload filtered out"
            );
            return;
        }
        let Some(handler) = &inner.handlers.on_payload else {
            inner.counters.unhandled.fetch_add(1, Ordering::Relaxed);
            debug!(node = %payload.node_address, "No payload handler, dropping");
            return;
        };

        inner.counters.payloads.fetch_add(1, Ordering::Relaxed);
        self.invoke("on_payload", &payload.node_address, || {
            handler(
                self,
                &payload.node_address,
                &payload.pipeline_name,
                &payload.plugin_signature,
                &payload.plugin_instance,
                payload,
            )
        });
    }

    /// Run a handler, containing errors and panics.
    fn invoke<F>(&self, slot: &'static str, node_address: &str, call: F)
    where
        F: FnOnce() -> anyhow::Result<()>,
    {
        let message = match panic::catch_unwind(AssertUnwindSafe(call)) {
            Ok(Ok(())) => return,
            Ok(Err(e)) => format!("{e:#}"),
            Err(panic) => panic_message(panic.as_ref()),
        };

        self.inner.counters.handler_errors.fetch_add(1, Ordering::Relaxed);
        let err = SessionError::Handler {
            handler: slot,
            message,
        };
        error!(
            session_id = %self.inner.id,
            node = %node_address,
            error = %err,
            "Handler failed, dispatch continues"
        );
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        return format!("panicked: {s}");
    }
    if let Some(s) = panic.downcast_ref::<String>() {
        return format!("panicked: {s}");
    }
    "panicked".to_string()
}
