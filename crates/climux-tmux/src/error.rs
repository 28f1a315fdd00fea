//! Error types for backend operations.

use thiserror::Error;

/// Errors that can occur while talking to the session backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The backend tool could not be started at all
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The backend tool ran but reported failure
    #[error("{command} failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    /// The backend tool is not installed or not reachable
    #[error("{tool} is not available")]
    Unavailable { tool: String },
}
