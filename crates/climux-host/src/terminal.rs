//! Host terminals wrapping scanner processes.
//!
//! A host terminal is whatever the user looks at: a panel in an editor, a
//! window, or the current TTY. The orchestrator only needs to create one
//! from scanner arguments, show it, type into it, and hear when it closes.
//!
//! [`ProcessTerminalHost`] is the plain command-line host: each terminal is
//! a `climux-scan` child inheriting the current TTY. Only one child can own
//! the TTY, so shown terminals run one after another in a foreground queue.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use climux_core::{ScannerArguments, Session, TerminalId};
use climux_tmux::SessionBackend;
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::TerminalError;

// ============================================================================
// Traits
// ============================================================================

/// Something that happened to a host terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalEvent {
    /// The terminal closed; `exit_code` is the scanner's status if known.
    Closed {
        id: TerminalId,
        exit_code: Option<i32>,
    },
}

/// A host terminal bound to one session.
#[async_trait]
pub trait TerminalHandle: Send + Sync {
    fn id(&self) -> TerminalId;

    /// Display name of the session shown in this terminal.
    fn name(&self) -> &str;

    /// Brings the terminal to the foreground.
    async fn show(&self) -> Result<(), TerminalError>;

    /// Types `text` followed by Enter.
    async fn send_text(&self, text: &str) -> Result<(), TerminalError>;
}

/// Creates host terminals.
#[async_trait]
pub trait TerminalHost: Send + Sync {
    /// Creates a terminal for `session` running a scanner with `args`.
    ///
    /// The terminal is not shown until [`TerminalHandle::show`] is called.
    async fn create_terminal(
        &self,
        session: &Session,
        args: ScannerArguments,
    ) -> Result<Arc<dyn TerminalHandle>, TerminalError>;
}

// ============================================================================
// Process Terminal Host
// ============================================================================

/// A scanner process waiting for the TTY.
struct QueuedTerminal {
    id: TerminalId,
    name: String,
    scanner_args: String,
}

/// Runs each terminal as a foreground `climux-scan` process.
pub struct ProcessTerminalHost {
    backend: Arc<dyn SessionBackend>,
    queue_tx: mpsc::UnboundedSender<QueuedTerminal>,
}

impl ProcessTerminalHost {
    /// Creates the host and starts its foreground queue.
    ///
    /// Returns the host and the stream of terminal events. Each shown
    /// terminal produces exactly one `TerminalEvent::Closed`.
    pub fn spawn(
        scanner_path: impl Into<PathBuf>,
        backend: Arc<dyn SessionBackend>,
    ) -> (Self, mpsc::UnboundedReceiver<TerminalEvent>) {
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        tokio::spawn(run_foreground_queue(scanner_path.into(), queue_rx, event_tx));

        (Self { backend, queue_tx }, event_rx)
    }
}

#[async_trait]
impl TerminalHost for ProcessTerminalHost {
    async fn create_terminal(
        &self,
        session: &Session,
        args: ScannerArguments,
    ) -> Result<Arc<dyn TerminalHandle>, TerminalError> {
        let scanner_args = args.to_arg().map_err(|e| TerminalError::Launch {
            name: session.name().to_string(),
            reason: e.to_string(),
        })?;

        let terminal = ProcessTerminal {
            id: TerminalId::next(),
            name: session.name().to_string(),
            scanner_args,
            shown: AtomicBool::new(false),
            backend: Arc::clone(&self.backend),
            queue_tx: self.queue_tx.clone(),
        };
        debug!(id = %terminal.id, name = %terminal.name, "Created terminal");
        Ok(Arc::new(terminal))
    }
}

/// A terminal that becomes a scanner process once shown.
struct ProcessTerminal {
    id: TerminalId,
    name: String,
    scanner_args: String,
    shown: AtomicBool,
    backend: Arc<dyn SessionBackend>,
    queue_tx: mpsc::UnboundedSender<QueuedTerminal>,
}

#[async_trait]
impl TerminalHandle for ProcessTerminal {
    fn id(&self) -> TerminalId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn show(&self) -> Result<(), TerminalError> {
        if self.shown.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        self.queue_tx
            .send(QueuedTerminal {
                id: self.id,
                name: self.name.clone(),
                scanner_args: self.scanner_args.clone(),
            })
            .map_err(|_| TerminalError::Launch {
                name: self.name.clone(),
                reason: "terminal queue stopped".to_string(),
            })
    }

    // Goes through the backend; works before the scanner is attached.
    async fn send_text(&self, text: &str) -> Result<(), TerminalError> {
        self.backend
            .send_keys(&self.name, text)
            .await
            .map_err(|e| TerminalError::SendText {
                name: self.name.clone(),
                reason: e.to_string(),
            })
    }
}

async fn run_foreground_queue(
    scanner_path: PathBuf,
    mut queue_rx: mpsc::UnboundedReceiver<QueuedTerminal>,
    event_tx: mpsc::UnboundedSender<TerminalEvent>,
) {
    while let Some(terminal) = queue_rx.recv().await {
        info!(id = %terminal.id, name = %terminal.name, "Terminal in foreground");

        let exit_code = run_scanner(&scanner_path, &terminal).await;
        info!(id = %terminal.id, name = %terminal.name, ?exit_code, "Terminal closed");

        let event = TerminalEvent::Closed {
            id: terminal.id,
            exit_code,
        };
        if event_tx.send(event).is_err() {
            debug!("Terminal event receiver gone");
            break;
        }
    }
}

/// Runs one scanner on the current TTY and returns its exit code.
async fn run_scanner(scanner_path: &Path, terminal: &QueuedTerminal) -> Option<i32> {
    let child = Command::new(scanner_path)
        .arg(&terminal.scanner_args)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .kill_on_drop(true)
        .spawn();

    let mut child = match child {
        Ok(child) => child,
        Err(e) => {
            warn!(
                scanner = %scanner_path.display(),
                error = %e,
                "Failed to start scanner"
            );
            return Some(1);
        }
    };

    match child.wait().await {
        Ok(status) => status.code(),
        Err(e) => {
            warn!(error = %e, "Failed to wait for scanner");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use climux_tmux::{BackendError, LaunchCommand};
    use std::sync::Mutex;

    #[derive(Default)]
    struct KeysBackend {
        keys: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl SessionBackend for KeysBackend {
        fn tool_name(&self) -> &str {
            "fake"
        }
        async fn is_available(&self) -> bool {
            true
        }
        async fn backend_running(&self) -> Result<bool, BackendError> {
            Ok(true)
        }
        async fn ensure_running(&self) -> Result<(), BackendError> {
            Ok(())
        }
        async fn list_sessions(&self) -> Result<Vec<String>, BackendError> {
            Ok(Vec::new())
        }
        async fn start_session(&self, _name: &str, _command: &str) -> Result<(), BackendError> {
            Ok(())
        }
        fn attach_command(&self, name: &str) -> LaunchCommand {
            LaunchCommand::new("attach", vec![name.to_string()])
        }
        async fn send_keys(&self, name: &str, line: &str) -> Result<(), BackendError> {
            self.keys
                .lock()
                .unwrap()
                .push((name.to_string(), line.to_string()));
            Ok(())
        }
        async fn kill_session(&self, _name: &str) -> Result<(), BackendError> {
            Ok(())
        }
    }

    fn args() -> ScannerArguments {
        ScannerArguments::new(4242, "code", "sh", None)
    }

    #[tokio::test]
    async fn test_send_text_goes_to_session() {
        let backend = Arc::new(KeysBackend::default());
        let (host, _events) = ProcessTerminalHost::spawn("/bin/false", backend.clone());

        let terminal = host
            .create_terminal(&Session::new("Azure CLI"), args())
            .await
            .unwrap();
        terminal.send_text("az login").await.unwrap();

        assert_eq!(
            *backend.keys.lock().unwrap(),
            vec![("Azure CLI".to_string(), "az login".to_string())]
        );
    }

    #[tokio::test]
    async fn test_terminals_get_distinct_ids() {
        let (host, _events) = ProcessTerminalHost::spawn("/bin/false", Arc::new(KeysBackend::default()));

        let a = host.create_terminal(&Session::new("a"), args()).await.unwrap();
        let b = host.create_terminal(&Session::new("b"), args()).await.unwrap();
        assert_ne!(a.id(), b.id());
        assert_eq!(a.name(), "a");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_shown_terminals_close_in_order() {
        let (host, mut events) = ProcessTerminalHost::spawn("/bin/false", Arc::new(KeysBackend::default()));

        let a = host.create_terminal(&Session::new("a"), args()).await.unwrap();
        let b = host.create_terminal(&Session::new("b"), args()).await.unwrap();
        a.show().await.unwrap();
        b.show().await.unwrap();
        // A second show does not queue the terminal again.
        a.show().await.unwrap();

        assert_eq!(
            events.recv().await,
            Some(TerminalEvent::Closed {
                id: a.id(),
                exit_code: Some(1)
            })
        );
        assert_eq!(
            events.recv().await,
            Some(TerminalEvent::Closed {
                id: b.id(),
                exit_code: Some(1)
            })
        );
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_missing_scanner_closes_with_failure() {
        let (host, mut events) = ProcessTerminalHost::spawn(
            "/nonexistent/climux-scan",
            Arc::new(KeysBackend::default()),
        );

        let terminal = host.create_terminal(&Session::new("x"), args()).await.unwrap();
        terminal.show().await.unwrap();

        assert_eq!(
            events.recv().await,
            Some(TerminalEvent::Closed {
                id: terminal.id(),
                exit_code: Some(1)
            })
        );
    }
}
