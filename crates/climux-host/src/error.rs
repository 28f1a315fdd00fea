//! Error types for the host side.

use std::path::PathBuf;

use climux_protocol::ProtocolError;
use climux_tmux::BackendError;
use thiserror::Error;

/// Errors from the match receiver.
#[derive(Debug, Error)]
pub enum ReceiverError {
    #[error("Match receiver already started")]
    AlreadyStarted,

    #[error("Failed to bind match receiver: {0}")]
    Bind(#[source] std::io::Error),

    #[error("Match receiver stopped before its port was known")]
    Stopped,

    #[error("Connection read failed: {0}")]
    Read(#[from] std::io::Error),

    #[error("Connection timed out before the report was complete")]
    ReadTimeout,

    #[error("Malformed match report: {0}")]
    Malformed(#[from] ProtocolError),
}

/// Errors from a host terminal.
#[derive(Debug, Error)]
pub enum TerminalError {
    #[error("Failed to launch terminal {name}: {reason}")]
    Launch { name: String, reason: String },

    #[error("Failed to send text to terminal {name}: {reason}")]
    SendText { name: String, reason: String },
}

/// Errors from session orchestration.
#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("{tool} is not available")]
    BackendUnavailable { tool: String },

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Receiver error: {0}")]
    Receiver(#[from] ReceiverError),

    #[error("Terminal error: {0}")]
    Terminal(#[from] TerminalError),

    #[error("Unknown profile: {0}")]
    UnknownProfile(String),
}

/// Errors loading the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}
