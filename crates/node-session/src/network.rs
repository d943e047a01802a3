//! # Network Topology View
//!
//! Peer records derived from network-monitor payloads, and the
//! [`NetworkReport`] returned by peer-discovery queries.
//!
//! A network-monitor payload carries a map of peer entries under
//! `CURRENT_NETWORK`:
//!
//! ```text
//! "CURRENT_NETWORK": {
//!     "node-a": { "address": "0xai_A", "eeid": "node-a", "working": "ONLINE",
//!                 "whitelist": ["0xai_me"], "last_seen_sec": 3.2, "version": "2.5.1" },
//!     "node-b": { "address": "0xai_B", "eeid": "node-b", "working": "LOST STATUS" }
//! }
//! ```

use std::fmt::{self, Write as _};
use std::time::Instant;

use serde::Serialize;
use serde_json::Value;

use crate::events::Payload;
use crate::identity::AddressIdentity;
use crate::keys::{
    NETMON_ADDRESS, NETMON_CURRENT_NETWORK, NETMON_EEID, NETMON_LAST_SEEN,
    NETMON_NODE_VERSION, NETMON_STATUS_KEY, NETMON_STATUS_ONLINE, NETMON_WHITELIST,
};

/// Online/offline status derived from the peer's status tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    /// Status tag equals the online sentinel.
    Online,
    /// Any other tag, or no tag.
    Offline,
}

impl NodeStatus {
    /// Classify a raw status tag.
    #[must_use]
    pub fn from_tag(tag: Option<&str>) -> Self {
        match tag {
            Some(NETMON_STATUS_ONLINE) => Self::Online,
            _ => Self::Offline,
        }
    }

    /// Lowercase label.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
        }
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One peer as reported by the network monitor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeerRecord {
    /// Peer address.
    pub address: String,
    /// Peer alias.
    pub alias: Option<String>,
    /// Addresses the peer authorizes.
    pub whitelist: Vec<String>,
    /// Derived status.
    pub status: NodeStatus,
    /// Seconds since last seen, when reported.
    pub last_seen_sec: Option<f64>,
    /// Software version, when reported.
    pub version: Option<String>,
}

impl PeerRecord {
    /// Build a record from one `CURRENT_NETWORK` entry.
    ///
    /// The address falls back to the map key when the entry omits it.
    /// Returns `None` when the entry is not an object.
    #[must_use]
    pub fn from_entry(key: &str, entry: &Value) -> Option<Self> {
        let obj = entry.as_object()?;
        let text = |k: &str| obj.get(k).and_then(Value::as_str).map(str::to_string);

        let whitelist = match obj.get(NETMON_WHITELIST) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            Some(Value::String(single)) => vec![single.clone()],
            _ => Vec::new(),
        };

        Some(Self {
            address: text(NETMON_ADDRESS).unwrap_or_else(|| key.to_string()),
            alias: text(NETMON_EEID),
            whitelist,
            status: NodeStatus::from_tag(obj.get(NETMON_STATUS_KEY).and_then(Value::as_str)),
            last_seen_sec: obj.get(NETMON_LAST_SEEN).and_then(Value::as_f64),
            version: text(NETMON_NODE_VERSION),
        })
    }

    /// Whether the peer is online.
    #[must_use]
    pub fn is_online(&self) -> bool {
        self.status == NodeStatus::Online
    }
}

/// Peer as seen from this session: the record plus whether its whitelist
/// authorizes us.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KnownNode {
    /// Reported peer data.
    #[serde(flatten)]
    pub peer: PeerRecord,
    /// Whether the peer's whitelist contains this client's address.
    pub allows_me: bool,
}

/// Latest peer map received from a network monitor.
#[derive(Debug, Clone)]
pub struct NetworkSnapshot {
    /// Address of the node that reported the map.
    pub reporter: String,
    /// Peers, sorted by address.
    pub peers: Vec<PeerRecord>,
    /// When the snapshot was received.
    pub received_at: Instant,
}

impl NetworkSnapshot {
    /// Extract a snapshot from a network-monitor payload.
    ///
    /// Returns `None` for any other payload.
    #[must_use]
    pub fn from_payload(payload: &Payload) -> Option<Self> {
        if !payload.is_network_snapshot() {
            return None;
        }
        let map = payload.data.get(NETMON_CURRENT_NETWORK)?.as_object()?;

        let mut peers: Vec<PeerRecord> = map
            .iter()
            .filter_map(|(key, entry)| PeerRecord::from_entry(key, entry))
            .collect();
        peers.sort_by(|a, b| a.address.cmp(&b.address));

        Some(Self {
            reporter: payload.node_address.clone(),
            peers,
            received_at: Instant::now(),
        })
    }

    /// Peers paired with their whitelist verdict.
    pub fn known_nodes(&self, identity: &dyn AddressIdentity, online_only: bool) -> Vec<KnownNode> {
        self.peers
            .iter()
            .filter(|peer| !online_only || peer.is_online())
            .map(|peer| KnownNode {
                allows_me: identity.contains_current_address(&peer.whitelist),
                peer: peer.clone(),
            })
            .collect()
    }
}

/// Derive the peer view from a network-monitor payload.
///
/// Handlers can call this on payloads they receive to get the same view the
/// session uses for [`NetworkReport`]. Non-monitor payloads yield nothing.
pub fn extract_peers(
    payload: &Payload,
    identity: &dyn AddressIdentity,
    online_only: bool,
) -> Vec<KnownNode> {
    NetworkSnapshot::from_payload(payload)
        .map(|snapshot| snapshot.known_nodes(identity, online_only))
        .unwrap_or_default()
}

/// Result of a peer-discovery query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkReport {
    /// Node that reported the underlying snapshot.
    pub reporter: String,
    /// Known peers, sorted by address.
    pub nodes: Vec<KnownNode>,
    /// Whether offline peers were excluded.
    pub online_only: bool,
    /// Human-readable summary table.
    pub report: String,
}

impl NetworkReport {
    /// Build a report from a snapshot.
    pub fn from_snapshot(
        snapshot: &NetworkSnapshot,
        identity: &dyn AddressIdentity,
        online_only: bool,
    ) -> Self {
        let nodes = snapshot.known_nodes(identity, online_only);
        let report = render_table(&snapshot.reporter, &nodes);
        Self {
            reporter: snapshot.reporter.clone(),
            nodes,
            online_only,
            report,
        }
    }

    /// Number of peers in the report.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the report lists no peers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of online peers.
    #[must_use]
    pub fn online_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.peer.is_online()).count()
    }

    /// Look up a peer by address.
    #[must_use]
    pub fn get(&self, address: &str) -> Option<&KnownNode> {
        self.nodes.iter().find(|n| n.peer.address == address)
    }
}

impl fmt::Display for NetworkReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.report)
    }
}

fn render_table(reporter: &str, nodes: &[KnownNode]) -> String {
    const HEADERS: [&str; 6] = ["Address", "Alias", "Status", "Allows me", "Last seen", "Version"];

    let rows: Vec<[String; 6]> = nodes
        .iter()
        .map(|n| {
            [
                n.peer.address.clone(),
                n.peer.alias.clone().unwrap_or_else(|| "-".to_string()),
                n.peer.status.to_string(),
                if n.allows_me { "yes" } else { "no" }.to_string(),
                n.peer
                    .last_seen_sec
                    .map_or_else(|| "-".to_string(), |s| format!("{s:.1}s")),
                n.peer.version.clone().unwrap_or_else(|| "-".to_string()),
            ]
        })
        .collect();

    let mut widths = HEADERS.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }

    let mut out = String::new();
    let _ = writeln!(out, "Network reported by <{reporter}>: {} node(s)", nodes.len());
    let mut push_row = |cells: &[&str]| {
        let line: Vec<String> = cells
            .iter()
            .zip(widths)
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect();
        let _ = writeln!(out, "{}", line.join("  ").trim_end());
    };

    push_row(&HEADERS);
    for row in &rows {
        let cells: Vec<&str> = row.iter().map(String::as_str).collect();
        push_row(&cells);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::DataMap;
    use crate::identity::StaticIdentity;
    use crate::keys::NET_MON_SIGNATURE;
    use serde_json::json;

    fn netmon_payload(network: Value) -> Payload {
        let mut data = DataMap::new();
        data.insert(NETMON_CURRENT_NETWORK.to_string(), network);
        Payload::new("0xai_supervisor", "admin_pipeline", NET_MON_SIGNATURE, "NET_MON_01_INST", data)
    }

    fn two_peers() -> Payload {
        netmon_payload(json!({
            "node-a": {
                "address": "0xai_A",
                "eeid": "node-a",
                "working": "ONLINE",
                "whitelist": ["0xai_me"],
                "last_seen_sec": 1.5,
                "version": "2.5.1"
            },
            "node-b": {
                "address": "0xai_B",
                "eeid": "node-b",
                "working": "LOST STATUS",
                "whitelist": []
            }
        }))
    }

    #[test]
    fn test_status_from_tag() {
        assert_eq!(NodeStatus::from_tag(Some("ONLINE")), NodeStatus::Online);
        assert_eq!(NodeStatus::from_tag(Some("online")), NodeStatus::Offline);
        assert_eq!(NodeStatus::from_tag(None), NodeStatus::Offline);
    }

    #[test]
    fn test_peer_record_address_falls_back_to_key() {
        let record = PeerRecord::from_entry("0xai_K", &json!({"eeid": "k"})).unwrap();
        assert_eq!(record.address, "0xai_K");
        assert_eq!(record.alias.as_deref(), Some("k"));
        assert_eq!(record.status, NodeStatus::Offline);
        assert!(record.whitelist.is_empty());

        assert!(PeerRecord::from_entry("x", &json!("not an object")).is_none());
    }

    #[test]
    fn test_online_only_extraction() {
        let identity = StaticIdentity::new("0xai_me");
        let peers = extract_peers(&two_peers(), &identity, true);

        assert_eq!(peers.len(), 1);
        assert_eq!(peers[0].peer.address, "0xai_A");
        assert!(peers[0].allows_me);

        let all = extract_peers(&two_peers(), &identity, false);
        assert_eq!(all.len(), 2);
        assert!(!all[1].allows_me);
    }

    #[test]
    fn test_extract_ignores_other_payloads() {
        let mut payload = two_peers();
        payload.plugin_signature = "CAM_01".to_string();
        assert!(extract_peers(&payload, &StaticIdentity::anonymous(), false).is_empty());
    }

    #[test]
    fn test_report_never_lists_offline_when_online_only() {
        let snapshot = NetworkSnapshot::from_payload(&two_peers()).unwrap();
        let report = NetworkReport::from_snapshot(&snapshot, &StaticIdentity::anonymous(), true);

        assert!(report.nodes.iter().all(|n| n.peer.is_online()));
        assert_eq!(report.len(), 1);
        assert_eq!(report.online_count(), 1);
        assert_eq!(report.reporter, "0xai_supervisor");
        assert!(report.get("0xai_B").is_none());
    }

    #[test]
    fn test_report_table() {
        let snapshot = NetworkSnapshot::from_payload(&two_peers()).unwrap();
        let report = NetworkReport::from_snapshot(&snapshot, &StaticIdentity::new("0xai_me"), false);
        let lines: Vec<&str> = report.report.lines().collect();

        assert_eq!(lines[0], "Network reported by <0xai_supervisor>: 2 node(s)");
        assert!(lines[1].starts_with("Address"));
        assert!(lines[2].starts_with("0xai_A"));
        assert!(lines[2].contains("online"));
        assert!(lines[2].contains("yes"));
        assert!(lines[2].contains("1.5s"));
        assert!(lines[3].contains("offline"));
        assert_eq!(report.to_string(), report.report);
    }

    #[test]
    fn test_known_node_serializes_flat() {
        let snapshot = NetworkSnapshot::from_payload(&two_peers()).unwrap();
        let nodes = snapshot.known_nodes(&StaticIdentity::new("0xai_me"), true);
        let value = serde_json::to_value(&nodes[0]).unwrap();

        assert_eq!(value["address"], "0xai_A");
        assert_eq!(value["status"], "online");
        assert_eq!(value["allows_me"], true);
    }
}
