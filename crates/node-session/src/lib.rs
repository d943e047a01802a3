//! # Node Session - Client Facade for Node Telemetry Networks
//!
//! A [`Session`] connects to a network of nodes, receives their heartbeats
//! and plugin payloads, and hands each one to a caller-supplied handler.
//!
//! ## Lifecycle
//!
//! ```text
//!  Session::builder()
//!     .plugin_filter("NET_MON_01")        validate + normalize filters
//!     .on_heartbeat(..) / .on_payload(..)
//!     .connect()?  ───────────────────►  runtime + transport + dispatch worker
//!                                               │
//!  get_network_known_nodes(true)? ◄── PeerTracker (NET_MON snapshots)
//!  sleep(..) / log(..)                          │
//!  close()  ─────────────────────────►  drain handlers, stop everything
//! ```
//!
//! ## Guarantees
//!
//! - Handler failures (errors or panics) are logged and counted; dispatch
//!   continues with the next event.
//! - Events are dispatched in arrival order by a single worker thread.
//! - After `close` returns no handler is invoked again. `close` is
//!   idempotent and may be called from inside a handler.
//!
//! ## Example
//!
//! ```no_run
//! use node_session::{Session, SessionConfig};
//!
//! # fn main() -> anyhow::Result<()> {
//! let session = Session::builder()
//!     .config(SessionConfig::from_env()?)
//!     .plugin_filter("NET_MON_01")
//!     .on_heartbeat(|session, node, data| {
//!         session.log(format!("{node} runs {:?}", data.ee_id()));
//!         Ok(())
//!     })
//!     .connect()?;
//!
//! let report = session.get_network_known_nodes(true)?;
//! println!("{report}");
//! session.close();
//! # Ok(())
//! # }
//! ```

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod config;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod handlers;
pub mod identity;
pub mod keys;
pub mod network;
pub mod session;
pub mod transport;

mod tracker;

// Re-export main types
pub use config::{FilterCase, FilterConfig, FilterSpec, SessionConfig, SessionFilters};
pub use dispatch::DispatchStats;
pub use error::{SessionError, SessionResult};
pub use events::{DataMap, HeartbeatData, HeartbeatEvent, InboundMessage, MessageKind, Payload};
pub use handlers::{HeartbeatHandler, PayloadHandler, SessionHandlers};
pub use identity::{AddressIdentity, StaticIdentity};
pub use network::{extract_peers, KnownNode, NetworkReport, NetworkSnapshot, NodeStatus, PeerRecord};
pub use session::{Session, SessionBuilder};
pub use transport::{InMemoryTransport, NetworkTransport, TcpJsonTransport, TransportError, TransportHandle};

/// Maximum inbound messages buffered before the network side waits.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_capacity() {
        assert_eq!(DEFAULT_CHANNEL_CAPACITY, 1000);
        assert_eq!(SessionConfig::default().channel_capacity, DEFAULT_CHANNEL_CAPACITY);
    }
}
