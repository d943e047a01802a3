//! net-monitor: print heartbeats and the known-nodes report of a node network.

use clap::Parser;
use net_monitor::{run, Args, SERVICE};
use session_telemetry::{init_telemetry, TelemetryConfig};

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_telemetry(&TelemetryConfig::for_service(SERVICE))?;
    run(&args)
}
