//! # Transport Port
//!
//! The session reaches the node network through [`NetworkTransport`].
//! Connecting yields a channel of classified [`InboundMessage`]s; the
//! transport feeds it from its own task on the session's runtime.
//!
//! ## Adapters
//!
//! - [`InMemoryTransport`] - in-process injection for tests and embedding
//! - [`TcpJsonTransport`] - newline-delimited JSON over TCP

mod memory;
mod tcp;

pub use memory::{InMemoryTransport, TransportHandle};
pub use tcp::TcpJsonTransport;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::events::InboundMessage;

/// Receiving end of a live connection.
pub type InboundReceiver = mpsc::Receiver<InboundMessage>;

/// Errors from transport operations.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The endpoint could not be reached.
    #[error("cannot reach {endpoint}: {reason}")]
    Unreachable {
        /// Endpoint that was dialed.
        endpoint: String,
        /// Underlying cause.
        reason: String,
    },

    /// `connect` was called on a transport that only supports one connection.
    #[error("transport already connected")]
    AlreadyConnected,

    /// The connection is gone.
    #[error("transport closed")]
    Closed,
}

/// Abstract interface for the node network.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; the session shares them with its
/// runtime.
#[async_trait]
pub trait NetworkTransport: Send + Sync {
    /// Establish connectivity.
    ///
    /// Called once, from inside the session's runtime. Messages must be sent
    /// on the returned channel in the order they were received from the
    /// network.
    async fn connect(&self) -> Result<InboundReceiver, TransportError>;

    /// Human-readable endpoint, for logs.
    fn endpoint(&self) -> String;
}
