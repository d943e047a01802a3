//! In-memory transport.
//!
//! Uses a bounded `tokio::sync::mpsc` channel: the [`TransportHandle`] is the
//! producer side, the session takes the consumer side on connect. Suitable
//! for tests and for embedding the session behind another network stack.

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

use super::{InboundReceiver, NetworkTransport, TransportError};
use crate::events::{HeartbeatData, HeartbeatEvent, InboundMessage, Payload};
use crate::DEFAULT_CHANNEL_CAPACITY;

/// Transport fed by a [`TransportHandle`].
pub struct InMemoryTransport {
    receiver: Mutex<Option<InboundReceiver>>,
    /// When set, `connect` fails as if the endpoint were down.
    unreachable: Option<String>,
}

impl InMemoryTransport {
    /// Create a transport with default capacity.
    #[must_use]
    pub fn new() -> (Self, TransportHandle) {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a transport with the given channel capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> (Self, TransportHandle) {
        let (sender, receiver) = mpsc::channel(capacity);
        let transport = Self {
            receiver: Mutex::new(Some(receiver)),
            unreachable: None,
        };
        (transport, TransportHandle { sender })
    }

    /// A transport whose `connect` always fails.
    pub fn unreachable(reason: impl Into<String>) -> Self {
        Self {
            receiver: Mutex::new(None),
            unreachable: Some(reason.into()),
        }
    }
}

#[async_trait]
impl NetworkTransport for InMemoryTransport {
    async fn connect(&self) -> Result<InboundReceiver, TransportError> {
        if let Some(reason) = &self.unreachable {
            return Err(TransportError::Unreachable {
                endpoint: self.endpoint(),
                reason: reason.clone(),
            });
        }
        let receiver = self
            .receiver
            .lock()
            .take()
            .ok_or(TransportError::AlreadyConnected)?;
        debug!("In-memory transport connected");
        Ok(receiver)
    }

    fn endpoint(&self) -> String {
        "in-memory".to_string()
    }
}

/// Producer side of an [`InMemoryTransport`].
///
/// The blocking methods must not be called from inside an async context.
#[derive(Clone)]
pub struct TransportHandle {
    sender: mpsc::Sender<InboundMessage>,
}

impl TransportHandle {
    /// Inject a message, blocking while the queue is full.
    pub fn inject(&self, message: impl Into<InboundMessage>) -> Result<(), TransportError> {
        self.sender
            .blocking_send(message.into())
            .map_err(|_| TransportError::Closed)
    }

    /// Inject a message from async code.
    pub async fn inject_async(&self, message: impl Into<InboundMessage>) -> Result<(), TransportError> {
        self.sender
            .send(message.into())
            .await
            .map_err(|_| TransportError::Closed)
    }

    /// Inject a heartbeat.
    pub fn heartbeat(
        &self,
        node_address: impl Into<String>,
        data: HeartbeatData,
    ) -> Result<(), TransportError> {
        self.inject(HeartbeatEvent::new(node_address, data))
    }

    /// Inject a payload.
    pub fn payload(&self, payload: Payload) -> Result<(), TransportError> {
        self.inject(payload)
    }

    /// Whether the session side has gone away.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}
