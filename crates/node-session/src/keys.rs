//! Lookup keys shared with the node telemetry collaborator.
//!
//! These names are a wire contract. Heartbeat maps carry the node alias and
//! CPU descriptor; network-monitor payloads carry a map of peers under
//! [`NETMON_CURRENT_NETWORK`].

/// Node alias, present in heartbeats and payloads.
pub const EE_ID: &str = "EE_ID";

/// CPU descriptor in heartbeats.
pub const CPU: &str = "CPU";

/// Plugin signature of the network monitor.
pub const NET_MON_SIGNATURE: &str = "NET_MON_01";

/// Peer map inside a network-monitor payload.
pub const NETMON_CURRENT_NETWORK: &str = "CURRENT_NETWORK";

/// Peer address inside a peer entry.
pub const NETMON_ADDRESS: &str = "address";

/// Peer alias inside a peer entry.
pub const NETMON_EEID: &str = "eeid";

/// Peer whitelist inside a peer entry.
pub const NETMON_WHITELIST: &str = "whitelist";

/// Status tag inside a peer entry.
pub const NETMON_STATUS_KEY: &str = "working";

/// Status tag value meaning "online".
pub const NETMON_STATUS_ONLINE: &str = "ONLINE";

/// Seconds since the peer was last seen.
pub const NETMON_LAST_SEEN: &str = "last_seen_sec";

/// Software version reported by the peer.
pub const NETMON_NODE_VERSION: &str = "version";
