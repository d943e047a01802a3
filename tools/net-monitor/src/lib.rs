//! net-monitor: watch a node network from the command line.
//!
//! Connects a session, prints every heartbeat, summarizes network-monitor
//! payloads as they arrive, and prints the known-nodes report once the first
//! network map is in.
//!
//! ## Configuration precedence
//!
//! ```text
//! defaults < --config FILE < NS_* environment < command-line flags
//! ```

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use node_session::keys::NET_MON_SIGNATURE;
use node_session::{extract_peers, FilterSpec, HeartbeatData, Payload, Session, SessionConfig};
use session_telemetry::{log_node_event, log_payload_event};

/// Service name used in log lines.
pub const SERVICE: &str = "net-monitor";

/// net-monitor: node network watcher
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "net-monitor")]
#[command(about = "Print heartbeats and the known-nodes report of a node network")]
pub struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Network endpoint host
    #[arg(long)]
    pub host: Option<String>,

    /// Network endpoint port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Own address, used to check peer whitelists
    #[arg(long)]
    pub address: Option<String>,

    /// Plugin signatures to receive (defaults to the network monitor)
    #[arg(long = "plugin-filter", value_delimiter = ',')]
    pub plugin_filter: Vec<String>,

    /// Node addresses to receive
    #[arg(long = "node-filter", value_delimiter = ',')]
    pub node_filter: Vec<String>,

    /// Seconds to wait for the network map
    #[arg(short, long)]
    pub timeout: Option<u64>,

    /// Seconds to keep listening after the report
    #[arg(short, long, default_value = "30")]
    pub wait: u64,

    /// Include offline nodes in the report
    #[arg(long)]
    pub all: bool,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,

    /// Suppress the session's own informational logs
    #[arg(short, long)]
    pub silent: bool,
}

impl Args {
    /// Resolve the session configuration.
    pub fn session_config(&self) -> anyhow::Result<SessionConfig> {
        let base = match &self.config {
            Some(path) => SessionConfig::from_file(path)?,
            None => SessionConfig::default(),
        };
        self.apply(base.overlay(|key| std::env::var(key).ok())?)
    }

    /// Apply command-line overrides to `config`.
    pub fn apply(&self, mut config: SessionConfig) -> anyhow::Result<SessionConfig> {
        if let Some(host) = &self.host {
            config.host.clone_from(host);
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(address) = &self.address {
            config.address = Some(address.clone());
        }
        if let Some(secs) = self.timeout {
            config.network_timeout_secs = secs;
        }
        if !self.node_filter.is_empty() {
            config.filters.node = Some(FilterSpec::from(self.node_filter.clone()));
        }
        if !self.plugin_filter.is_empty() {
            config.filters.plugin = Some(FilterSpec::from(self.plugin_filter.clone()));
        } else if config.filters.plugin.is_none() {
            config.filters.plugin = Some(NET_MON_SIGNATURE.into());
        }
        config.silent |= self.silent;

        config.validate().context("invalid session options")?;
        Ok(config)
    }
}

/// One-line description of a heartbeat.
pub fn describe_heartbeat(node: &str, data: &HeartbeatData) -> String {
    let alias = data.ee_id().unwrap_or("?");
    match data.cpu() {
        Some(cpu) => format!("{node} ({alias}) has a {cpu}"),
        None => format!("{node} ({alias}) sent a heartbeat"),
    }
}

/// One-line description of a plugin payload.
pub fn describe_payload(
    node: &str,
    pipeline: &str,
    signature: &str,
    instance: &str,
    bytes: usize,
) -> String {
    format!("{node} / {pipeline} / {signature}:{instance} sent a payload with {bytes} bytes of data")
}

fn on_heartbeat(session: &Session, node: &str, data: &HeartbeatData) -> anyhow::Result<()> {
    log_node_event!(debug, SERVICE, "Heartbeat", node, fields = data.len());
    session.log_colored(describe_heartbeat(node, data), "cyan");
    Ok(())
}

fn on_payload(
    session: &Session,
    node: &str,
    pipeline: &str,
    signature: &str,
    instance: &str,
    payload: &Payload,
) -> anyhow::Result<()> {
    if !signature.eq_ignore_ascii_case(NET_MON_SIGNATURE) {
        let bytes = payload.data_size();
        log_payload_event!(debug, SERVICE, "Payload", node, signature, pipeline, instance, bytes);
        session.log_colored(describe_payload(node, pipeline, signature, instance, bytes), "magenta");
        return Ok(());
    }

    let peers = extract_peers(payload, session.identity(), false);
    let online = peers.iter().filter(|p| p.peer.is_online()).count();
    log_payload_event!(
        info,
        SERVICE,
        "Network map received",
        node,
        signature,
        peers = peers.len(),
        online
    );
    session.log_colored(
        format!("{node} reports {} node(s), {online} online", peers.len()),
        "green",
    );
    Ok(())
}

/// Connect, print the report, listen, close.
pub fn run(args: &Args) -> anyhow::Result<()> {
    let config = args.session_config()?;
    let endpoint = config.endpoint();
    let session = Session::builder()
        .config(config)
        .on_heartbeat(on_heartbeat)
        .on_payload(on_payload)
        .connect()
        .with_context(|| format!("cannot open session to {endpoint}"))?;

    let result = report(&session, args);
    session.close();
    result
}

fn report(session: &Session, args: &Args) -> anyhow::Result<()> {
    let report = session
        .get_network_known_nodes(!args.all)
        .context("no network map received")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{report}");
    }

    if args.wait > 0 {
        session.log_colored(format!("Listening for {}s", args.wait), "dim");
        session.sleep(Duration::from_secs(args.wait));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use node_session::keys::{CPU, EE_ID};
    use serde_json::json;
    use std::io::Write;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("net-monitor").chain(argv.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults() {
        let args = parse(&[]);
        assert_eq!(args.wait, 30);
        assert!(!args.all);
        assert!(args.plugin_filter.is_empty());
    }

    #[test]
    fn test_default_plugin_filter_is_network_monitor() {
        let config = parse(&[]).apply(SessionConfig::default()).unwrap();
        let filters = config.validate().unwrap();
        assert_eq!(filters.plugin, vec![NET_MON_SIGNATURE.to_string()]);
    }

    #[test]
    fn test_flags_override_config() {
        let args = parse(&[
            "--host",
            "10.0.0.5",
            "-p",
            "9000",
            "--plugin-filter",
            "net_mon_01,custom_01",
            "--timeout",
            "5",
            "--silent",
        ]);
        let config = args.apply(SessionConfig::default()).unwrap();

        assert_eq!(config.endpoint(), "10.0.0.5:9000");
        assert_eq!(config.network_timeout_secs, 5);
        assert!(config.silent);
        assert_eq!(
            config.validate().unwrap().plugin,
            vec!["NET_MON_01".to_string(), "CUSTOM_01".to_string()]
        );
    }

    #[test]
    fn test_config_file_is_loaded() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "host = \"node.local\"\nport = 7000\n[filters]\nnode = \"0xai_A\"").unwrap();

        let args = parse(&["--config", file.path().to_str().unwrap()]);
        let config = args.apply(SessionConfig::from_file(file.path()).unwrap()).unwrap();
        assert_eq!(config.host, "node.local");
        assert_eq!(config.port, 7000);
        assert_eq!(config.validate().unwrap().node, vec!["0xai_A".to_string()]);
    }

    #[test]
    fn test_invalid_override_is_rejected() {
        let args = parse(&["--timeout", "0"]);
        assert!(args.apply(SessionConfig::default()).is_err());
    }

    #[test]
    fn test_describe_heartbeat() {
        let data: HeartbeatData = [(EE_ID, json!("node-7")), (CPU, json!("x86-64 8c"))]
            .into_iter()
            .collect();
        assert_eq!(describe_heartbeat("addr-A", &data), "addr-A (node-7) has a x86-64 8c");
        assert_eq!(
            describe_heartbeat("addr-B", &HeartbeatData::default()),
            "addr-B (?) sent a heartbeat"
        );
    }

    #[test]
    fn test_describe_payload_reports_data_size() {
        let payload = Payload::new(
            "0xai_A",
            "camera",
            "VIEW_SCENE_01",
            "cam-1",
            [("IMG".to_string(), json!("abcd"))].into_iter().collect(),
        );
        let bytes = payload.data_size();
        assert_eq!(bytes, r#"{"IMG":"abcd"}"#.len());
        assert_eq!(
            describe_payload("0xai_A", "camera", "VIEW_SCENE_01", "cam-1", bytes),
            format!("0xai_A / camera / VIEW_SCENE_01:cam-1 sent a payload with {bytes} bytes of data")
        );
    }
}
