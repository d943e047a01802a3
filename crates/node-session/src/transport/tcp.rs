//! Newline-delimited JSON over TCP.
//!
//! Each line is one [`InboundMessage`]. Lines that fail to parse are logged
//! and skipped; the connection stays up.

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::{InboundReceiver, NetworkTransport, TransportError};
use crate::config::SessionConfig;
use crate::events::InboundMessage;

/// TCP transport reading JSON lines.
#[derive(Debug, Clone)]
pub struct TcpJsonTransport {
    host: String,
    port: u16,
    connect_timeout: Duration,
    capacity: usize,
}

impl TcpJsonTransport {
    /// Create a transport for `host:port`.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        let defaults = SessionConfig::default();
        Self {
            host: host.into(),
            port,
            connect_timeout: defaults.connect_timeout(),
            capacity: defaults.channel_capacity,
        }
    }

    /// Create a transport from session configuration.
    #[must_use]
    pub fn from_config(config: &SessionConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            connect_timeout: config.connect_timeout(),
            capacity: config.channel_capacity,
        }
    }

    /// Override the connect timeout.
    #[must_use]
    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }
}

#[async_trait]
impl NetworkTransport for TcpJsonTransport {
    async fn connect(&self) -> Result<InboundReceiver, TransportError> {
        let endpoint = self.endpoint();
        let unreachable = |reason: String| TransportError::Unreachable {
            endpoint: endpoint.clone(),
            reason,
        };

        let stream = timeout(
            self.connect_timeout,
            TcpStream::connect((self.host.as_str(), self.port)),
        )
        .await
        .map_err(|_| unreachable(format!("no answer within {:?}", self.connect_timeout)))?
        .map_err(|e| unreachable(e.to_string()))?;

        info!(endpoint = %endpoint, "TCP transport connected");

        let (sender, receiver) = mpsc::channel(self.capacity);
        tokio::spawn(read_lines(stream, sender, endpoint.clone()));
        Ok(receiver)
    }

    fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

async fn read_lines(stream: TcpStream, sender: mpsc::Sender<InboundMessage>, endpoint: String) {
    let mut lines = BufReader::new(stream).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                info!(endpoint = %endpoint, "Remote closed the connection");
                break;
            }
            Err(e) => {
                warn!(endpoint = %endpoint, error = %e, "TCP read failed");
                break;
            }
        };

        if line.trim().is_empty() {
            continue;
        }

        let message = match InboundMessage::from_json(&line) {
            Ok(message) => message,
            Err(e) => {
                warn!(endpoint = %endpoint, error = %e, "Skipping malformed message");
                continue;
            }
        };

        if sender.send(message).await.is_err() {
            debug!(endpoint = %endpoint, "Session dropped the receiver");
            break;
        }
    }
}
