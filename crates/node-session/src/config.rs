//! # Session Configuration
//!
//! Options recognized at construction time, plus the filter normalization
//! utility.
//!
//! ## Sources
//!
//! - Programmatic: [`SessionConfig::default`] and the builder setters.
//! - TOML: [`SessionConfig::from_toml_str`] / [`SessionConfig::from_file`].
//! - Environment: [`SessionConfig::from_env`].
//!
//! ## Config File Format
//!
//! ```toml
//! host = "10.0.0.5"
//! port = 7707
//! silent = false
//! address = "0xai_Amfnbt3N-qg2-qGtywZIPQBTVlAnoADVRmSAsdDhlQ-6"
//! network_timeout_secs = 20
//!
//! [filters]
//! plugin = "NET_MON_01"
//! node = ["0xai_A", "0xai_B"]
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{SessionError, SessionResult};
use crate::events::Payload;
use crate::DEFAULT_CHANNEL_CAPACITY;

/// Default network endpoint host.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default network endpoint port.
pub const DEFAULT_PORT: u16 = 7707;

/// Default window for blocking peer queries.
pub const DEFAULT_NETWORK_TIMEOUT_SECS: u64 = 20;

/// Default window for establishing connectivity.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

// ============================================================================
// Filters
// ============================================================================

/// A filter value as supplied by the caller: one string or a list.
///
/// Deserialization goes through [`FilterSpec::from_value`], so config files
/// get the same errors as dynamic input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FilterSpec {
    /// A single entry.
    One(String),
    /// Several entries.
    Many(Vec<String>),
}

/// Case handling applied during normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterCase {
    /// Entries are uppercased (plugin signatures).
    Upper,
    /// Entries keep their case (addresses, pipeline names).
    Preserve,
}

impl FilterSpec {
    /// Coerce a dynamic value into a filter.
    ///
    /// Accepts a string or an array of strings; anything else is a
    /// configuration error.
    pub fn from_value(name: &str, value: &Value) -> SessionResult<Self> {
        match value {
            Value::String(s) => Ok(Self::One(s.clone())),
            Value::Array(items) => items
                .iter()
                .map(|item| {
                    item.as_str().map(str::to_string).ok_or_else(|| {
                        SessionError::config(format!(
                            "{name} entries must be strings, got {item}"
                        ))
                    })
                })
                .collect::<SessionResult<Vec<_>>>()
                .map(Self::Many),
            other => Err(SessionError::config(format!(
                "{name} must be a string or a list of strings, got {other}"
            ))),
        }
    }

    /// Normalize into a list of entries.
    ///
    /// Blank entries and empty lists are rejected; leave the filter unset to
    /// accept everything.
    pub fn normalize(&self, name: &str, case: FilterCase) -> SessionResult<Vec<String>> {
        let entries: Vec<&str> = match self {
            Self::One(s) => vec![s.as_str()],
            Self::Many(items) if items.is_empty() => {
                return Err(SessionError::config(format!("{name} must not be an empty list")));
            }
            Self::Many(items) => items.iter().map(String::as_str).collect(),
        };

        entries
            .into_iter()
            .map(|entry| {
                let entry = entry.trim();
                if entry.is_empty() {
                    return Err(SessionError::config(format!("{name} contains an empty entry")));
                }
                Ok(match case {
                    FilterCase::Upper => entry.to_ascii_uppercase(),
                    FilterCase::Preserve => entry.to_string(),
                })
            })
            .collect()
    }
}

impl<'de> Deserialize<'de> for FilterSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value("filter", &value).map_err(serde::de::Error::custom)
    }
}

impl From<&str> for FilterSpec {
    fn from(s: &str) -> Self {
        Self::One(s.to_string())
    }
}

impl From<String> for FilterSpec {
    fn from(s: String) -> Self {
        Self::One(s)
    }
}

impl From<Vec<String>> for FilterSpec {
    fn from(items: Vec<String>) -> Self {
        Self::Many(items)
    }
}

impl From<Vec<&str>> for FilterSpec {
    fn from(items: Vec<&str>) -> Self {
        Self::Many(items.into_iter().map(str::to_string).collect())
    }
}

impl From<&[&str]> for FilterSpec {
    fn from(items: &[&str]) -> Self {
        Self::Many(items.iter().map(|s| (*s).to_string()).collect())
    }
}

/// Raw filter options, as loaded from configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Node addresses to accept.
    pub node: Option<FilterSpec>,
    /// Pipeline names to accept.
    pub pipeline: Option<FilterSpec>,
    /// Plugin signatures to accept.
    pub plugin: Option<FilterSpec>,
}

impl FilterConfig {
    /// Normalize every filter.
    pub fn normalize(&self) -> SessionResult<SessionFilters> {
        fn list(
            spec: &Option<FilterSpec>,
            name: &str,
            case: FilterCase,
        ) -> SessionResult<Vec<String>> {
            spec.as_ref()
                .map_or_else(|| Ok(Vec::new()), |s| s.normalize(name, case))
        }

        Ok(SessionFilters {
            node: list(&self.node, "node_filter", FilterCase::Preserve)?,
            pipeline: list(&self.pipeline, "pipeline_filter", FilterCase::Preserve)?,
            plugin: list(&self.plugin, "plugin_filter", FilterCase::Upper)?,
        })
    }
}

/// Normalized filters. An empty list accepts everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionFilters {
    /// Accepted node addresses.
    pub node: Vec<String>,
    /// Accepted pipeline names.
    pub pipeline: Vec<String>,
    /// Accepted plugin signatures (uppercase).
    pub plugin: Vec<String>,
}

impl SessionFilters {
    /// Whether events from this node pass the node filter.
    #[must_use]
    pub fn accepts_node(&self, node_address: &str) -> bool {
        self.node.is_empty() || self.node.iter().any(|n| n == node_address)
    }

    /// Whether a payload passes all three filters.
    #[must_use]
    pub fn accepts_payload(&self, payload: &Payload) -> bool {
        self.accepts_node(&payload.node_address)
            && (self.pipeline.is_empty() || self.pipeline.contains(&payload.pipeline_name))
            && (self.plugin.is_empty()
                || self
                    .plugin
                    .iter()
                    .any(|p| p.eq_ignore_ascii_case(&payload.plugin_signature)))
    }

    /// Whether any filter is active.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.node.is_empty() && self.pipeline.is_empty() && self.plugin.is_empty()
    }
}

// ============================================================================
// SessionConfig
// ============================================================================

/// Complete session configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Network endpoint host.
    pub host: String,
    /// Network endpoint port.
    pub port: u16,
    /// Suppress internal informational logging.
    pub silent: bool,
    /// This client's own address, used for whitelist checks.
    pub address: Option<String>,
    /// Window for blocking peer queries, in seconds.
    pub network_timeout_secs: u64,
    /// Window for establishing connectivity, in seconds.
    pub connect_timeout_secs: u64,
    /// Capacity of the inbound dispatch queue.
    pub channel_capacity: usize,
    /// Worker threads of the session's I/O runtime.
    pub io_threads: usize,
    /// Event filters.
    pub filters: FilterConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            silent: false,
            address: None,
            network_timeout_secs: DEFAULT_NETWORK_TIMEOUT_SECS,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            io_threads: 2,
            filters: FilterConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Parse configuration from TOML text.
    pub fn from_toml_str(text: &str) -> SessionResult<Self> {
        toml::from_str(text).map_err(|e| SessionError::config(format!("invalid config: {e}")))
    }

    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> SessionResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            SessionError::config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    /// Overlay environment variables on the defaults.
    ///
    /// # Environment Variables
    ///
    /// - `NS_HOST`, `NS_PORT`: network endpoint
    /// - `NS_SILENT`: `true`/`1` to suppress internal logging
    /// - `NS_ADDRESS`: own address for whitelist checks
    /// - `NS_NETWORK_TIMEOUT_SECS`, `NS_CONNECT_TIMEOUT_SECS`
    /// - `NS_NODE_FILTER`, `NS_PIPELINE_FILTER`, `NS_PLUGIN_FILTER`:
    ///   comma separated lists
    pub fn from_env() -> SessionResult<Self> {
        Self::default().overlay(|key| std::env::var(key).ok())
    }

    /// Overlay values from a key lookup (environment-style names).
    pub fn overlay<F>(mut self, lookup: F) -> SessionResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parse<T: std::str::FromStr>(key: &str, raw: &str) -> SessionResult<T> {
            raw.trim()
                .parse()
                .map_err(|_| SessionError::config(format!("{key} has invalid value `{raw}`")))
        }

        fn list(raw: &str) -> FilterSpec {
            FilterSpec::Many(raw.split(',').map(|s| s.trim().to_string()).collect())
        }

        if let Some(host) = lookup("NS_HOST") {
            self.host = host;
        }
        if let Some(port) = lookup("NS_PORT") {
            self.port = parse("NS_PORT", &port)?;
        }
        if let Some(silent) = lookup("NS_SILENT") {
            self.silent = silent.eq_ignore_ascii_case("true") || silent == "1";
        }
        if let Some(address) = lookup("NS_ADDRESS") {
            self.address = Some(address);
        }
        if let Some(secs) = lookup("NS_NETWORK_TIMEOUT_SECS") {
            self.network_timeout_secs = parse("NS_NETWORK_TIMEOUT_SECS", &secs)?;
        }
        if let Some(secs) = lookup("NS_CONNECT_TIMEOUT_SECS") {
            self.connect_timeout_secs = parse("NS_CONNECT_TIMEOUT_SECS", &secs)?;
        }
        if let Some(raw) = lookup("NS_NODE_FILTER") {
            self.filters.node = Some(list(&raw));
        }
        if let Some(raw) = lookup("NS_PIPELINE_FILTER") {
            self.filters.pipeline = Some(list(&raw));
        }
        if let Some(raw) = lookup("NS_PLUGIN_FILTER") {
            self.filters.plugin = Some(list(&raw));
        }
        Ok(self)
    }

    /// Validate options and normalize filters.
    pub fn validate(&self) -> SessionResult<SessionFilters> {
        if self.host.trim().is_empty() {
            return Err(SessionError::config("host is required"));
        }
        if self.port == 0 {
            return Err(SessionError::config("port must be non-zero"));
        }
        if self.network_timeout_secs == 0 {
            return Err(SessionError::config("network_timeout_secs must be non-zero"));
        }
        if self.channel_capacity == 0 {
            return Err(SessionError::config("channel_capacity must be non-zero"));
        }
        if self.io_threads == 0 {
            return Err(SessionError::config("io_threads must be non-zero"));
        }
        if self.address.as_deref().is_some_and(|a| a.trim().is_empty()) {
            return Err(SessionError::config("address must not be blank"));
        }
        self.filters.normalize()
    }

    /// Endpoint as `host:port`.
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Window for blocking peer queries.
    #[must_use]
    pub fn network_timeout(&self) -> Duration {
        Duration::from_secs(self.network_timeout_secs)
    }

    /// Window for establishing connectivity.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_single_plugin_filter_becomes_uppercase_list() {
        let filters = FilterConfig {
            plugin: Some("net_mon_01".into()),
            ..Default::default()
        }
        .normalize()
        .unwrap();

        assert_eq!(filters.plugin, vec!["NET_MON_01".to_string()]);
        assert!(filters.node.is_empty());
    }

    #[test]
    fn test_plain_string_plugin_filter() {
        let spec = FilterSpec::from("NET_MON_01");
        assert_eq!(
            spec.normalize("plugin_filter", FilterCase::Upper).unwrap(),
            vec!["NET_MON_01".to_string()]
        );
    }

    #[test]
    fn test_list_plugin_filter_is_supported() {
        let spec = FilterSpec::from(vec!["net_mon_01", "other"]);
        assert_eq!(
            spec.normalize("plugin_filter", FilterCase::Upper).unwrap(),
            vec!["NET_MON_01".to_string(), "OTHER".to_string()]
        );
    }

    #[test]
    fn test_node_filter_keeps_case() {
        let spec = FilterSpec::from("0xai_AbC");
        assert_eq!(
            spec.normalize("node_filter", FilterCase::Preserve).unwrap(),
            vec!["0xai_AbC".to_string()]
        );
    }

    #[test]
    fn test_filter_from_value_rejects_other_types() {
        assert!(FilterSpec::from_value("plugin_filter", &json!(42))
            .unwrap_err()
            .is_configuration());
        assert!(FilterSpec::from_value("plugin_filter", &json!(null)).is_err());
        assert!(FilterSpec::from_value("plugin_filter", &json!(["ok", 7])).is_err());

        let ok = FilterSpec::from_value("plugin_filter", &json!(["a", "b"])).unwrap();
        assert_eq!(ok, FilterSpec::Many(vec!["a".into(), "b".into()]));
    }

    #[test]
    fn test_blank_filter_entry_rejected() {
        let spec = FilterSpec::from(vec!["NET_MON_01", "  "]);
        assert!(spec.normalize("plugin_filter", FilterCase::Upper).is_err());
    }

    #[test]
    fn test_empty_filter_list_rejected() {
        let err = FilterConfig {
            node: Some(FilterSpec::Many(Vec::new())),
            ..Default::default()
        }
        .normalize()
        .unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("node_filter must not be an empty list"));
    }

    #[test]
    fn test_unset_filter_accepts_everything() {
        let filters = FilterConfig::default().normalize().unwrap();
        assert!(filters.is_empty());
    }

    #[test]
    fn test_upper_case_only_touches_ascii() {
        let spec = FilterSpec::from("straße_01");
        let normalized = spec.normalize("plugin_filter", FilterCase::Upper).unwrap();
        assert_eq!(normalized, vec!["STRAßE_01".to_string()]);

        let filters = SessionFilters {
            plugin: normalized,
            ..Default::default()
        };
        let payload = Payload::new("a", "p", "straße_01", "i", Default::default());
        assert!(filters.accepts_payload(&payload));
    }

    #[test]
    fn test_accepts_payload() {
        let filters = SessionFilters {
            plugin: vec!["NET_MON_01".into()],
            ..Default::default()
        };
        let netmon = Payload::new("a", "p", "NET_MON_01", "i", Default::default());
        let camera = Payload::new("a", "p", "CAM_01", "i", Default::default());

        assert!(filters.accepts_payload(&netmon));
        assert!(!filters.accepts_payload(&camera));
        assert!(SessionFilters::default().accepts_payload(&camera));
    }

    #[test]
    fn test_from_toml() {
        let config = SessionConfig::from_toml_str(
            r#"
            host = "10.0.0.5"
            port = 9000
            silent = true

            [filters]
            plugin = "net_mon_01"
            node = ["0xai_A", "0xai_B"]
            "#,
        )
        .unwrap();

        assert_eq!(config.endpoint(), "10.0.0.5:9000");
        assert!(config.silent);
        assert_eq!(config.network_timeout_secs, DEFAULT_NETWORK_TIMEOUT_SECS);

        let filters = config.validate().unwrap();
        assert_eq!(filters.plugin, vec!["NET_MON_01".to_string()]);
        assert_eq!(filters.node.len(), 2);
    }

    #[test]
    fn test_toml_non_string_filter_is_configuration_error() {
        let err = SessionConfig::from_toml_str("[filters]\nplugin = 17\n").unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("must be a string or a list of strings"));

        let err = SessionConfig::from_toml_str("[filters]\nnode = [\"0xai_A\", 3]\n").unwrap_err();
        assert!(err.to_string().contains("entries must be strings"), "{err}");
    }

    #[test]
    fn test_toml_empty_filter_list_fails_validation() {
        let config = SessionConfig::from_toml_str("[filters]\npipeline = []\n").unwrap();
        assert!(config.validate().unwrap_err().is_configuration());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "port = 7800\naddress = \"0xai_me\"").unwrap();

        let config = SessionConfig::from_file(file.path()).unwrap();
        assert_eq!(config.port, 7800);
        assert_eq!(config.address.as_deref(), Some("0xai_me"));
    }

    #[test]
    fn test_missing_file_is_configuration_error() {
        let err = SessionConfig::from_file("/nonexistent/node-session.toml").unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_overlay_from_lookup() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("NS_HOST", "node.local"),
            ("NS_PORT", "7801"),
            ("NS_SILENT", "1"),
            ("NS_PLUGIN_FILTER", "net_mon_01, other"),
        ]);

        let config = SessionConfig::default()
            .overlay(|k| vars.get(k).map(|v| (*v).to_string()))
            .unwrap();

        assert_eq!(config.endpoint(), "node.local:7801");
        assert!(config.silent);
        assert_eq!(
            config.validate().unwrap().plugin,
            vec!["NET_MON_01".to_string(), "OTHER".to_string()]
        );
    }

    #[test]
    fn test_overlay_rejects_bad_number() {
        let err = SessionConfig::default()
            .overlay(|k| (k == "NS_PORT").then(|| "seventy".to_string()))
            .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_validate_required_fields() {
        let config = SessionConfig {
            host: String::new(),
            ..Default::default()
        };
        assert!(config.validate().unwrap_err().is_configuration());

        let config = SessionConfig {
            network_timeout_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        assert!(SessionConfig::default().validate().is_ok());
    }
}
