//! User-facing notifications.
//!
//! Every failure the orchestrator cannot handle itself, and every auth code
//! found in a session, goes through one [`Notifier`].

use climux_core::MatchResult;
use tracing::{error, info, warn};

/// Sink for orchestration notices.
pub trait Notifier: Send + Sync {
    /// The backend tool is missing; `remediation` tells the user what to do.
    fn backend_unavailable(&self, tool: &str, remediation: &str);

    /// An operation failed and was abandoned.
    fn operation_failed(&self, operation: &str, error: &dyn std::error::Error);

    /// A scanner found an auth code.
    fn auth_code(&self, result: &MatchResult);
}

/// Logs every notice.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn backend_unavailable(&self, tool: &str, remediation: &str) {
        error!(tool, remediation, "Session backend unavailable");
    }

    fn operation_failed(&self, operation: &str, error: &dyn std::error::Error) {
        warn!(operation, error = %error, "Operation failed");
    }

    fn auth_code(&self, result: &MatchResult) {
        info!(code = result.code().unwrap_or_default(), "Auth code found");
    }
}

/// Logs every notice and also writes it to stderr.
///
/// Lines end in `\r\n` since a scanner may hold the terminal in raw mode.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn backend_unavailable(&self, tool: &str, remediation: &str) {
        TracingNotifier.backend_unavailable(tool, remediation);
        eprint!("climux: {tool} is not available. {remediation}\r\n");
    }

    fn operation_failed(&self, operation: &str, error: &dyn std::error::Error) {
        TracingNotifier.operation_failed(operation, error);
        eprint!("climux: {operation} failed: {error}\r\n");
    }

    fn auth_code(&self, result: &MatchResult) {
        TracingNotifier.auth_code(result);
        if let Some(code) = result.code() {
            eprint!("\r\nclimux: sign-in code {code}\r\n");
        }
    }
}
