//! Callback slots.
//!
//! A session has exactly two slots, each with a fixed signature. Handlers
//! receive the session first so they can log, check whitelists, or query
//! peers from inside the callback.

use std::fmt;
use std::sync::Arc;

use crate::events::{HeartbeatData, Payload};
use crate::session::Session;

/// `on_heartbeat(session, node_address, heartbeat_data)`.
pub type HeartbeatHandler =
    Arc<dyn Fn(&Session, &str, &HeartbeatData) -> anyhow::Result<()> + Send + Sync>;

/// `on_payload(session, node_address, pipeline_name, plugin_signature,
/// plugin_instance, payload)`.
pub type PayloadHandler =
    Arc<dyn Fn(&Session, &str, &str, &str, &str, &Payload) -> anyhow::Result<()> + Send + Sync>;

/// The registered callback set.
#[derive(Clone, Default)]
pub struct SessionHandlers {
    /// Invoked for each accepted heartbeat.
    pub on_heartbeat: Option<HeartbeatHandler>,
    /// Invoked for each accepted payload.
    pub on_payload: Option<PayloadHandler>,
}

impl SessionHandlers {
    /// Whether no handler is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.on_heartbeat.is_none() && self.on_payload.is_none()
    }
}

impl fmt::Debug for SessionHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandlers")
            .field("on_heartbeat", &self.on_heartbeat.is_some())
            .field("on_payload", &self.on_payload.is_some())
            .finish()
    }
}
