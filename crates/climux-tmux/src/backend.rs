//! The session backend interface.

use async_trait::async_trait;

use crate::error::BackendError;

/// A program plus arguments, run inside a scanner's pseudo-terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl LaunchCommand {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

/// Named, detachable terminal sessions hosted in a shared long-lived process.
///
/// Names passed in and returned are display names; implementations encode
/// them for storage.
#[async_trait]
pub trait SessionBackend: Send + Sync {
    /// Name of the tool the backend drives, for user-facing messages.
    fn tool_name(&self) -> &str;

    /// Returns true if the backend tool is installed and responding.
    async fn is_available(&self) -> bool;

    /// Returns true if the shared backend process is running.
    async fn backend_running(&self) -> Result<bool, BackendError>;

    /// Starts the shared backend process unless it is already running.
    async fn ensure_running(&self) -> Result<(), BackendError>;

    /// Lists surviving sessions by display name.
    ///
    /// Returns an empty list when the shared backend process is not running.
    async fn list_sessions(&self) -> Result<Vec<String>, BackendError>;

    /// Creates a detached session running `command`.
    async fn start_session(&self, name: &str, command: &str) -> Result<(), BackendError>;

    /// Command that attaches a terminal to an existing session.
    ///
    /// The command exits when the session ends.
    fn attach_command(&self, name: &str) -> LaunchCommand;

    /// Types `line` followed by Enter into the session.
    async fn send_keys(&self, name: &str, line: &str) -> Result<(), BackendError>;

    /// Ends a session.
    async fn kill_session(&self, name: &str) -> Result<(), BackendError>;
}
