//! # Inbound Events
//!
//! Message types that flow from the network into the session. Both kinds
//! are transient: classified, handed once to the matching handler, then
//! dropped.
//!
//! ## Wire Format
//!
//! One JSON object per message, tagged by `type`:
//!
//! ```text
//! {"type":"heartbeat","node_address":"0xai_A","data":{"EE_ID":"node-7","CPU":"x86-64 8c"}}
//! {"type":"payload","node_address":"0xai_A","pipeline":"admin_pipeline",
//!  "signature":"NET_MON_01","instance":"NET_MON_01_INST","data":{...}}
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::keys::{CPU, EE_ID, NETMON_CURRENT_NETWORK, NET_MON_SIGNATURE};

/// Free-form data map carried by heartbeats and payloads.
pub type DataMap = Map<String, Value>;

/// Named metrics reported in one heartbeat.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HeartbeatData(DataMap);

impl HeartbeatData {
    /// Wrap an existing data map.
    #[must_use]
    pub fn new(map: DataMap) -> Self {
        Self(map)
    }

    /// Raw value for a key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// String value for a key, if the value is a string.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Node alias (`EE_ID`).
    #[must_use]
    pub fn ee_id(&self) -> Option<&str> {
        self.get_str(EE_ID)
    }

    /// CPU descriptor (`CPU`).
    #[must_use]
    pub fn cpu(&self) -> Option<&str> {
        self.get_str(CPU)
    }

    /// Borrow the underlying map.
    #[must_use]
    pub fn as_map(&self) -> &DataMap {
        &self.0
    }

    /// Number of metrics.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no metrics were reported.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for HeartbeatData {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// One periodic liveness report from a remote node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatEvent {
    /// Address of the reporting node.
    pub node_address: String,
    /// Reported metrics.
    #[serde(default)]
    pub data: HeartbeatData,
}

impl HeartbeatEvent {
    /// Create a heartbeat event.
    pub fn new(node_address: impl Into<String>, data: HeartbeatData) -> Self {
        Self {
            node_address: node_address.into(),
            data,
        }
    }
}

/// One application-data message emitted by a plugin instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    /// Address of the emitting node.
    pub node_address: String,
    /// Pipeline the plugin runs in.
    #[serde(rename = "pipeline")]
    pub pipeline_name: String,
    /// Plugin type identifier.
    #[serde(rename = "signature")]
    pub plugin_signature: String,
    /// Plugin instance identifier.
    #[serde(rename = "instance")]
    pub plugin_instance: String,
    /// Domain-specific data.
    #[serde(default)]
    pub data: DataMap,
}

impl Payload {
    /// Create a payload.
    pub fn new(
        node_address: impl Into<String>,
        pipeline_name: impl Into<String>,
        plugin_signature: impl Into<String>,
        plugin_instance: impl Into<String>,
        data: DataMap,
    ) -> Self {
        Self {
            node_address: node_address.into(),
            pipeline_name: pipeline_name.into(),
            plugin_signature: plugin_signature.into(),
            plugin_instance: plugin_instance.into(),
            data,
        }
    }

    /// Whether this payload was emitted by the network monitor and carries
    /// a peer map.
    #[must_use]
    pub fn is_network_snapshot(&self) -> bool {
        self.plugin_signature.eq_ignore_ascii_case(NET_MON_SIGNATURE)
            && self
                .data
                .get(NETMON_CURRENT_NETWORK)
                .is_some_and(Value::is_object)
    }

    /// Size of the serialized data map, used in diagnostics.
    #[must_use]
    pub fn data_size(&self) -> usize {
        serde_json::to_string(&self.data).map_or(0, |s| s.len())
    }
}

/// Message kinds the dispatcher routes on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Routed to `on_heartbeat`.
    Heartbeat,
    /// Routed to `on_payload`.
    Payload,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Heartbeat => write!(f, "heartbeat"),
            Self::Payload => write!(f, "payload"),
        }
    }
}

/// A classified message received from the network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    /// Liveness report.
    Heartbeat(HeartbeatEvent),
    /// Application data.
    Payload(Payload),
}

impl InboundMessage {
    /// Kind used for routing.
    #[must_use]
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Heartbeat(_) => MessageKind::Heartbeat,
            Self::Payload(_) => MessageKind::Payload,
        }
    }

    /// Address of the originating node.
    #[must_use]
    pub fn node_address(&self) -> &str {
        match self {
            Self::Heartbeat(hb) => &hb.node_address,
            Self::Payload(p) => &p.node_address,
        }
    }

    /// Parse one wire line.
    pub fn from_json(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }
}

impl From<HeartbeatEvent> for InboundMessage {
    fn from(event: HeartbeatEvent) -> Self {
        Self::Heartbeat(event)
    }
}

impl From<Payload> for InboundMessage {
    fn from(payload: Payload) -> Self {
        Self::Payload(payload)
    }
}
