//! # Session Errors
//!
//! Error taxonomy for the session facade.
//!
//! - `Configuration` and `Connection` surface synchronously from
//!   [`SessionBuilder::connect`](crate::SessionBuilder::connect).
//! - `Timeout` surfaces from blocking peer queries.
//! - `Handler` is never returned to a caller. It is built by the dispatcher
//!   when a registered callback fails, logged, and counted.

use std::time::Duration;

use thiserror::Error;

use crate::transport::TransportError;

/// Errors produced by the session facade.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Construction options are missing or malformed.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The network could not be reached, or the connection failed.
    #[error("connection error: {0}")]
    Connection(String),

    /// A blocking query exceeded its window.
    #[error("timed out after {0:?} waiting for a network snapshot")]
    Timeout(Duration),

    /// A caller-supplied handler failed or panicked.
    #[error("handler `{handler}` failed: {message}")]
    Handler {
        /// Callback slot that failed (`on_heartbeat` or `on_payload`).
        handler: &'static str,
        /// Rendered error or panic message.
        message: String,
    },

    /// The session was closed before or during the operation.
    #[error("session is closed")]
    Closed,
}

impl SessionError {
    /// Shorthand for a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Whether this error came from construction options.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    /// Whether this error came from the network layer.
    #[must_use]
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }

    /// Whether this error is a query timeout.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

impl From<TransportError> for SessionError {
    fn from(e: TransportError) -> Self {
        Self::Connection(e.to_string())
    }
}

/// Result alias used across the crate.
pub type SessionResult<T> = Result<T, SessionError>;
