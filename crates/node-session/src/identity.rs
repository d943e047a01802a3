//! # Address Identity Port
//!
//! Whitelist checks belong to the addressing/identity subsystem. The session
//! exposes this port to handlers (`session.identity()`) but does not own the
//! key material or address derivation behind it.

/// Prefix carried by node addresses on the wire.
pub const ADDRESS_PREFIX: &str = "0xai_";

/// Strip the wire prefix from an address, if present.
#[must_use]
pub fn strip_address_prefix(address: &str) -> &str {
    address.strip_prefix(ADDRESS_PREFIX).unwrap_or(address)
}

/// Identity collaborator used for whitelist checks.
///
/// Implementations must be `Send + Sync`: they are called from the dispatch
/// worker as well as from the caller's thread.
pub trait AddressIdentity: Send + Sync {
    /// This client's own address (may be empty for anonymous sessions).
    fn current_address(&self) -> &str;

    /// Whether the whitelist authorizes this client.
    ///
    /// Entries are compared with and without the wire prefix. An anonymous
    /// identity is never whitelisted.
    fn contains_current_address(&self, whitelist: &[String]) -> bool {
        let own = strip_address_prefix(self.current_address());
        if own.is_empty() {
            return false;
        }
        whitelist.iter().any(|entry| strip_address_prefix(entry) == own)
    }
}

/// Identity backed by a fixed address.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StaticIdentity {
    address: String,
}

impl StaticIdentity {
    /// Identity for a known address.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }

    /// Identity without an address.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }
}

impl AddressIdentity for StaticIdentity {
    fn current_address(&self) -> &str {
        &self.address
    }
}
