//! Session orchestration.
//!
//! [`SessionManager`] ties the pieces together:
//!
//! ```text
//!   open / activate
//!         │
//!         ▼
//! ┌─────────────────┐ list/start/kill ┌─────────────────┐
//! │ SessionManager  │────────────────▶│ SessionBackend  │
//! │                 │                 └─────────────────┘
//! │  active: id →   │ create/show     ┌─────────────────┐
//! │   session       │────────────────▶│  TerminalHost   │──▶ scanner processes
//! │                 │                 └─────────────────┘          │
//! │                 │ port, results   ┌─────────────────┐          │ reports
//! │                 │◀────────────────│  MatchReceiver  │◀─────────┘
//! └───────┬─────────┘                 └─────────────────┘
//!         │ auth codes, failures
//!         ▼
//!     Notifier
//! ```
//!
//! Sessions outlive the host: on activation every session still present in
//! the backend gets a fresh terminal, and nothing new is started.
//!
//! # Panic-Free Guarantees
//!
//! No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`.
//! Failures are returned as `ManagerError` and reported through the
//! notifier.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use climux_core::{unique_name, MatchResult, ScannerArguments, Session, TerminalId};
use climux_tmux::SessionBackend;
use tokio::sync::{broadcast, Mutex};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::config::Profile;
use crate::error::ManagerError;
use crate::notify::Notifier;
use crate::receiver::MatchReceiver;
use crate::terminal::{TerminalHandle, TerminalHost};

/// Remediation shown when the backend tool is missing.
pub const BACKEND_REMEDIATION: &str =
    "Install Docker and make sure the Docker daemon is running, then try again.";

/// A session with a live host terminal.
struct ActiveSession {
    session: Session,
    handle: Arc<dyn TerminalHandle>,
}

/// Sessions this manager tracks.
#[derive(Default)]
struct Registry {
    active: HashMap<TerminalId, ActiveSession>,
    /// Names chosen by an open that has not attached yet
    pending: HashSet<String>,
}

/// Owns the receiver, the active terminals, and the match subscription.
pub struct SessionManager {
    backend: Arc<dyn SessionBackend>,
    terminals: Arc<dyn TerminalHost>,
    notifier: Arc<dyn Notifier>,
    receiver: MatchReceiver,
    pattern: String,
    registry: Mutex<Registry>,
    cleanup: TaskTracker,
    cancel_token: CancellationToken,
}

impl SessionManager {
    /// Creates a manager. Nothing runs until [`start`](Self::start).
    ///
    /// # Arguments
    ///
    /// * `backend` - Session backend holding the durable sessions
    /// * `terminals` - Creates the host terminals
    /// * `notifier` - Receives failures and auth codes
    /// * `pattern` - Auth-code regex handed to every scanner
    pub fn new(
        backend: Arc<dyn SessionBackend>,
        terminals: Arc<dyn TerminalHost>,
        notifier: Arc<dyn Notifier>,
        pattern: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            terminals,
            notifier,
            receiver: MatchReceiver::new(),
            pattern: pattern.into(),
            registry: Mutex::new(Registry::default()),
            cleanup: TaskTracker::new(),
            cancel_token: CancellationToken::new(),
        }
    }

    /// Replaces the match receiver before starting.
    pub fn with_receiver(mut self, receiver: MatchReceiver) -> Self {
        self.receiver = receiver;
        self
    }

    /// Starts the match receiver and forwards its results to the notifier.
    ///
    /// # Errors
    ///
    /// Returns `ManagerError::Receiver` if the receiver cannot start.
    pub async fn start(&self) -> Result<u16, ManagerError> {
        let results = self.receiver.subscribe();
        let port = self.receiver.start(self.cancel_token.child_token()).await?;
        spawn_match_forwarder(results, Arc::clone(&self.notifier), self.cancel_token.clone());
        Ok(port)
    }

    /// Starts the manager and reattaches every surviving session.
    ///
    /// Returns the number of reattached sessions.
    ///
    /// # Errors
    ///
    /// Returns `ManagerError` if the receiver cannot start or the backend
    /// cannot list sessions.
    pub async fn activate(&self) -> Result<usize, ManagerError> {
        self.start().await?;
        self.on_activate().await
    }

    /// Reattaches a terminal to every session present in the backend.
    ///
    /// Never starts a session. A session that fails to attach is reported
    /// and skipped.
    ///
    /// # Errors
    ///
    /// Returns `ManagerError::Backend` if sessions cannot be listed.
    pub async fn on_activate(&self) -> Result<usize, ManagerError> {
        let names = match self.backend.list_sessions().await {
            Ok(names) => names,
            Err(e) => {
                self.notifier.operation_failed("list sessions", &e);
                return Err(e.into());
            }
        };
        info!(count = names.len(), "Reattaching surviving sessions");

        let mut attached = 0;
        for name in names {
            match self.reattach(&name).await {
                Ok(()) => attached += 1,
                Err(e) => self.notifier.operation_failed("attach session", &e),
            }
        }
        Ok(attached)
    }

    async fn reattach(&self, name: &str) -> Result<(), ManagerError> {
        self.attach_and_show(name).await?;
        Ok(())
    }

    /// Attaches a terminal to `name` and shows it. A terminal that cannot be
    /// shown is forgotten again.
    async fn attach_and_show(&self, name: &str) -> Result<Arc<dyn TerminalHandle>, ManagerError> {
        let args = self.scanner_arguments_for(name).await?;
        let handle = self.attach_session(name, args).await?;
        if let Err(e) = handle.show().await {
            self.registry.lock().await.active.remove(&handle.id());
            return Err(e.into());
        }
        Ok(handle)
    }

    /// Opens a new session for `profile`.
    ///
    /// Picks a name unique among backend, active and still-opening sessions,
    /// starts the profile's worker in the backend, attaches and shows a
    /// terminal, then types the profile's login command.
    ///
    /// # Errors
    ///
    /// Returns `ManagerError::BackendUnavailable` (after notifying) if the
    /// backend tool is missing, in which case nothing is created. A session
    /// started before a later step failed is killed in the background.
    pub async fn open_session(&self, profile: &Profile) -> Result<TerminalId, ManagerError> {
        match self.try_open_session(profile).await {
            Ok(id) => Ok(id),
            Err(e @ ManagerError::BackendUnavailable { .. }) => Err(e),
            Err(e) => {
                self.notifier.operation_failed("open session", &e);
                Err(e)
            }
        }
    }

    async fn try_open_session(&self, profile: &Profile) -> Result<TerminalId, ManagerError> {
        if !self.backend.is_available().await {
            let tool = self.backend.tool_name().to_string();
            self.notifier.backend_unavailable(&tool, BACKEND_REMEDIATION);
            return Err(ManagerError::BackendUnavailable { tool });
        }

        let name = self.reserve_name(&profile.terminal_name).await?;
        let opened = self.create_session(&name, profile).await;
        self.registry.lock().await.pending.remove(&name);
        opened
    }

    /// Chooses a free name for `prefix` and holds it until the open finishes.
    async fn reserve_name(&self, prefix: &str) -> Result<String, ManagerError> {
        let listed = self.backend.list_sessions().await?;

        let mut registry = self.registry.lock().await;
        let mut existing = listed;
        existing.extend(registry.active.values().map(|s| s.handle.name().to_string()));
        existing.extend(registry.pending.iter().cloned());

        let name = unique_name(prefix, &existing);
        registry.pending.insert(name.clone());
        Ok(name)
    }

    async fn create_session(&self, name: &str, profile: &Profile) -> Result<TerminalId, ManagerError> {
        self.backend.ensure_running().await?;
        self.backend
            .start_session(name, &profile.worker_command())
            .await?;
        info!(name = %name, image = %profile.docker_image, "Started session");

        let handle = match self.attach_and_show(name).await {
            Ok(handle) => handle,
            Err(e) => {
                warn!(name = %name, error = %e, "Attach failed, killing new session");
                self.kill_in_background(name);
                return Err(e);
            }
        };

        if let Err(e) = handle.send_text(&profile.login_command).await {
            self.notifier.operation_failed("send login command", &e);
        }

        Ok(handle.id())
    }

    /// Creates a terminal attached to the existing session `name`.
    ///
    /// The terminal is tracked as active until it closes.
    ///
    /// # Errors
    ///
    /// Returns `ManagerError::Terminal` if the host cannot create it.
    pub async fn attach_session(
        &self,
        name: &str,
        args: ScannerArguments,
    ) -> Result<Arc<dyn TerminalHandle>, ManagerError> {
        let session = Session::new(name);
        let handle = self.terminals.create_terminal(&session, args).await?;
        debug!(id = %handle.id(), name = %session.name(), "Attached session");

        self.registry.lock().await.active.insert(
            handle.id(),
            ActiveSession {
                session,
                handle: Arc::clone(&handle),
            },
        );
        Ok(handle)
    }

    /// Scanner arguments that attach to session `name`.
    ///
    /// # Errors
    ///
    /// Returns `ManagerError::Receiver` if the receiver stopped.
    pub async fn scanner_arguments_for(&self, name: &str) -> Result<ScannerArguments, ManagerError> {
        let attach = self.backend.attach_command(name);
        Ok(self
            .receiver
            .scanner_arguments(&self.pattern, &attach.program, Some(attach.args))
            .await?)
    }

    /// Forgets a closed terminal and kills its session in the background.
    ///
    /// The kill is not awaited or retried; failures are only logged.
    /// Returns the session name, or `None` for an unknown terminal.
    pub async fn on_terminal_closed(&self, id: TerminalId) -> Option<String> {
        let closed = self.registry.lock().await.active.remove(&id)?;
        let name = closed.session.name().to_string();
        info!(id = %id, name = %name, "Terminal closed, killing session");

        self.kill_in_background(&name);
        Some(name)
    }

    fn kill_in_background(&self, name: &str) {
        let backend = Arc::clone(&self.backend);
        let name = name.to_string();
        self.cleanup.spawn(async move {
            if let Err(e) = backend.kill_session(&name).await {
                warn!(name = %name, error = %e, "Failed to kill session");
            }
        });
    }

    /// Display names of sessions with a live terminal.
    pub async fn active_names(&self) -> Vec<String> {
        self.registry
            .lock()
            .await
            .active
            .values()
            .map(|s| s.handle.name().to_string())
            .collect()
    }

    /// Number of live terminals.
    pub async fn active_count(&self) -> usize {
        self.registry.lock().await.active.len()
    }

    pub fn receiver(&self) -> &MatchReceiver {
        &self.receiver
    }

    /// Stops the receiver and the match forwarder.
    ///
    /// Sessions stay alive in the backend for the next activation.
    pub fn deactivate(&self) {
        info!("Session manager deactivating");
        self.cancel_token.cancel();
    }

    /// Deactivates and waits for outstanding session kills.
    pub async fn shutdown(&self) {
        self.deactivate();
        self.cleanup.close();
        self.cleanup.wait().await;
    }
}

fn spawn_match_forwarder(
    mut results: broadcast::Receiver<MatchResult>,
    notifier: Arc<dyn Notifier>,
    cancel_token: CancellationToken,
) {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => {
                    debug!("Match forwarder shutting down");
                    break;
                }

                result = results.recv() => {
                    match result {
                        Ok(result) => notifier.auth_code(&result),
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!(skipped = n, "Match forwarder lagged, skipped results");
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            debug!("Match channel closed");
                            break;
                        }
                    }
                }
            }
        }
    });
}
