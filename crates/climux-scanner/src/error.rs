//! Error types for the scanner process.

use climux_core::DomainError;
use climux_protocol::ProtocolError;
use thiserror::Error;

/// Errors that can occur while running a scanner.
#[derive(Debug, Error)]
pub enum ScannerError {
    /// The invocation argument could not be parsed
    #[error("invalid scanner arguments: {0}")]
    InvalidArguments(#[from] DomainError),

    /// The pattern is not a valid regex
    #[error("invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// The pseudo-terminal or its child could not be created
    #[error("failed to spawn {shell}: {reason}")]
    Spawn { shell: String, reason: String },

    /// The pseudo-terminal rejected a resize
    #[error("failed to resize pty: {0}")]
    Resize(String),

    /// A report could not be encoded
    #[error("failed to encode report: {0}")]
    Protocol(#[from] ProtocolError),

    /// I/O error passthrough
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
