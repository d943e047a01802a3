//! # Session Telemetry
//!
//! Logging setup shared by node-session consumers.
//!
//! The `node-session` library only emits `tracing` events; binaries call
//! [`init_telemetry`] once at startup to decide where they go.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use session_telemetry::{init_telemetry, TelemetryConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     init_telemetry(&TelemetryConfig::for_service("net-monitor"))?;
//!     // Session logs now reach stderr
//!     Ok(())
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `NS_LOG_LEVEL` / `RUST_LOG` | `info` | Filter directive |
//! | `NS_JSON_LOGS` | `false` (`true` in containers) | JSON line output |
//! | `NS_CONSOLE_OUTPUT` | `true` | Write logs to stderr |
//! | `NS_SERVICE_NAME` | `node-session` | Service name field |
//! | `NO_COLOR` | unset | Disable ANSI colors |

mod config;
mod logging;

pub use config::{TelemetryConfig, DEFAULT_LOG_LEVEL};
pub use logging::{env_filter, init_logging, paint, OperatorLayer, OPERATOR_TARGET};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// The filter directive or another option is malformed.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A global subscriber is already installed.
    #[error("Failed to install log subscriber: {0}")]
    SubscriberInit(String),
}

/// Install logging for the process.
///
/// Fails if a global subscriber was already set.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    logging::init_logging(config)
}
