//! Subscriber installation and structured logging helpers.
//!
//! Log lines carry consistent fields so they can be grepped or parsed:
//! - `service`: emitting tool or library
//! - `session_id`: session correlation id (set by the session itself)
//! - `node`: remote node address, for per-node events
//! - Additional context fields
//!
//! Operator messages (target [`OPERATOR_TARGET`]) skip the fmt layer and are
//! printed bare to stdout by [`OperatorLayer`], painted with their `color`
//! field when ANSI output is enabled.

use std::fmt;
use std::io::Write;

use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{TelemetryConfig, TelemetryError};

/// Target of the session's operator-visible messages.
pub const OPERATOR_TARGET: &str = "node_session::operator";

/// Build the filter from the configured directive.
pub fn env_filter(config: &TelemetryConfig) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_new(&config.log_level)
        .map_err(|e| TelemetryError::Config(format!("invalid log filter `{}`: {e}", config.log_level)))
}

/// Install the global subscriber.
pub fn init_logging(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let env_filter = env_filter(config)?;

    if config.json_logs {
        let json_layer = config.console_output.then(|| {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_names(true)
        });
        tracing_subscriber::registry()
            .with(env_filter)
            .with(json_layer)
            .try_init()
            .map_err(|e| TelemetryError::SubscriberInit(e.to_string()))?;
    } else {
        let fmt_layer = config.console_output.then(|| {
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_names(false)
                .with_ansi(config.ansi)
                .with_filter(filter_fn(|meta| meta.target() != OPERATOR_TARGET))
        });
        let operator_layer = config
            .console_output
            .then(|| OperatorLayer::new(std::io::stdout).with_ansi(config.ansi));
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .with(operator_layer)
            .try_init()
            .map_err(|e| TelemetryError::SubscriberInit(e.to_string()))?;
    }

    tracing::debug!(
        service = %config.service_name,
        json_logs = config.json_logs,
        filter = %config.log_level,
        "Logging initialized"
    );
    Ok(())
}

/// Wrap `message` in the ANSI sequence for a named color.
///
/// Unknown color names leave the message unchanged.
pub fn paint(message: &str, color: &str) -> String {
    let code = match color.to_ascii_lowercase().as_str() {
        "red" | "r" => "31",
        "green" | "g" => "32",
        "yellow" | "y" => "33",
        "blue" | "b" => "34",
        "magenta" | "m" => "35",
        "cyan" | "c" => "36",
        "dim" | "gray" | "grey" => "2",
        _ => return message.to_string(),
    };
    format!("\x1b[{code}m{message}\x1b[0m")
}

/// Prints operator messages as bare lines, optionally colored.
pub struct OperatorLayer<W> {
    writer: W,
    ansi: bool,
}

impl<W> OperatorLayer<W>
where
    W: for<'a> MakeWriter<'a> + 'static,
{
    pub fn new(writer: W) -> Self {
        Self { writer, ansi: true }
    }

    pub fn with_ansi(mut self, ansi: bool) -> Self {
        self.ansi = ansi;
        self
    }
}

impl<S, W> Layer<S> for OperatorLayer<W>
where
    S: Subscriber,
    W: for<'a> MakeWriter<'a> + 'static,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if event.metadata().target() != OPERATOR_TARGET {
            return;
        }
        let mut visitor = OperatorMessage::default();
        event.record(&mut visitor);

        let line = match (&visitor.color, self.ansi) {
            (Some(color), true) => paint(&visitor.message, color),
            _ => visitor.message,
        };
        let _ = writeln!(self.writer.make_writer(), "{line}");
    }
}

#[derive(Default)]
struct OperatorMessage {
    message: String,
    color: Option<String>,
}

impl Visit for OperatorMessage {
    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "message" => self.message = value.to_string(),
            "color" => self.color = Some(value.to_string()),
            _ => {}
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        match field.name() {
            "message" => self.message = format!("{value:?}"),
            "color" => self.color = Some(format!("{value:?}").trim_matches('"').to_string()),
            _ => {}
        }
    }
}

/// Log a node-related event with standard fields.
#[macro_export]
macro_rules! log_node_event {
    ($level:ident, $service:expr, $msg:expr, $node:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            service = $service,
            node = %$node,
            $($($field)*,)?
            $msg
        )
    };
}

/// Log a payload-related event with standard fields.
#[macro_export]
macro_rules! log_payload_event {
    ($level:ident, $service:expr, $msg:expr, $node:expr, $signature:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            service = $service,
            node = %$node,
            signature = %$signature,
            $($($field)*,)?
            $msg
        )
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_env_filter_rejects_garbage() {
        let config = TelemetryConfig::default().with_log_level("node_session=loud");
        assert!(matches!(env_filter(&config), Err(TelemetryError::Config(_))));
    }

    #[test]
    fn test_env_filter_accepts_directives() {
        let config = TelemetryConfig::default().with_log_level("node_session=debug,warn");
        assert!(env_filter(&config).is_ok());
    }

    #[test]
    fn test_paint() {
        assert_eq!(paint("up", "green"), "\x1b[32mup\x1b[0m");
        assert_eq!(paint("up", "G"), "\x1b[32mup\x1b[0m");
        assert_eq!(paint("up", "plaid"), "up");
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Captured {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn operator_output(ansi: bool, emit: impl FnOnce()) -> String {
        let out = Captured::default();
        let writer = out.clone();
        let layer = OperatorLayer::new(move || writer.clone()).with_ansi(ansi);
        tracing::subscriber::with_default(tracing_subscriber::registry().with(layer), emit);
        out.text()
    }

    #[test]
    fn test_operator_messages_are_painted() {
        let out = operator_output(true, || {
            tracing::info!(target: OPERATOR_TARGET, color = "green", "3 node(s) online");
            tracing::info!(target: OPERATOR_TARGET, "plain note");
        });
        assert_eq!(out, "\x1b[32m3 node(s) online\x1b[0m\nplain note\n");
    }

    #[test]
    fn test_operator_colors_dropped_without_ansi() {
        let out = operator_output(false, || {
            tracing::info!(target: OPERATOR_TARGET, color = "magenta", "payload of 12 bytes");
        });
        assert_eq!(out, "payload of 12 bytes\n");
    }

    #[test]
    fn test_operator_layer_ignores_other_targets() {
        let out = operator_output(true, || {
            tracing::info!(target: "node_session::session", "Session connected");
        });
        assert!(out.is_empty());
    }

    #[test]
    fn test_macros_expand() {
        crate::log_node_event!(info, "test", "heartbeat", "0xai_A", cpu = "x86");
        crate::log_payload_event!(debug, "test", "payload", "0xai_A", "NET_MON_01");
    }
}
