use std::io;
use std::str::Utf8Error;

use thiserror::Error;

/// Everything that can go wrong between the socket and the game.
///
/// Cloneable so a failed connection can keep its cause around for queries
/// while the same error is handed back to the caller.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NetError {
    #[error("connect to {target} failed: {reason}")]
    Connect {
        target: String,
        kind: io::ErrorKind,
        reason: String,
    },

    #[error("connection i/o failed: {reason}")]
    Io { kind: io::ErrorKind, reason: String },

    #[error("received unit is not valid utf-8: {0}")]
    Decode(#[from] Utf8Error),

    #[error("protocol violation: {0}")]
    Protocol(String),

    #[error("send backlog full: {pending} bytes pending, limit {limit}")]
    Backpressure { pending: usize, limit: usize },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<io::Error> for NetError {
    fn from(e: io::Error) -> Self {
        Self::Io {
            kind: e.kind(),
            reason: e.to_string(),
        }
    }
}

impl NetError {
    pub fn connect(target: impl Into<String>, source: io::Error) -> Self {
        Self::Connect {
            target: target.into(),
            kind: source.kind(),
            reason: source.to_string(),
        }
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    pub fn not_connected() -> Self {
        Self::Io {
            kind: io::ErrorKind::NotConnected,
            reason: "connection is not open".into(),
        }
    }

    /// Connect and I/O failures are healed by reconnecting; the rest mean the
    /// peer sent something we cannot use.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Connect { .. } | Self::Io { .. } | Self::Backpressure { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, NetError>;
