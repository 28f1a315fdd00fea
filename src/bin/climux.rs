//! climux - durable containerised CLI sessions
//!
//! Opens interactive CLI sessions (Azure CLI and friends) in throwaway
//! worker containers, multiplexed by tmux inside a long-lived jumpbox so
//! they survive the host process. Device-login codes printed in a session
//! are picked up and reported.
//!
//! # Usage
//!
//! ```bash
//! climux open "Azure CLI"     # open a new session in the foreground
//! climux resume               # reattach every surviving session
//! climux list                 # list surviving sessions
//! climux kill "Azure CLI (2)" # end a session
//! climux profiles             # list configured profiles
//! ```

use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use climux_host::{
    Config, ConsoleNotifier, ProcessTerminalHost, SessionManager, TerminalEvent, BACKEND_REMEDIATION,
};
use climux_tmux::{DockerTmuxBackend, SessionBackend};

// ============================================================================
// CLI Arguments
// ============================================================================

/// climux - durable containerised CLI sessions
#[derive(Parser, Debug)]
#[command(name = "climux")]
#[command(about = "Durable containerised CLI sessions with sign-in code detection")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Config file (default: $CLIMUX_CONFIG or <config dir>/climux/config.toml)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Open a new session for a profile (command id or terminal name)
    Open { profile: String },
    /// Reattach every session that survived a previous run
    Resume,
    /// List surviving sessions
    List,
    /// Kill a session by name
    Kill { name: String },
    /// List configured profiles
    Profiles,
}

// ============================================================================
// Logging
// ============================================================================

fn get_log_dir() -> Option<PathBuf> {
    if let Ok(xdg_state) = std::env::var("XDG_STATE_HOME") {
        return Some(PathBuf::from(xdg_state).join("climux"));
    }
    dirs::home_dir().map(|home| home.join(".local/state/climux"))
}

fn create_log_file() -> Option<fs::File> {
    let log_dir = get_log_dir()?;

    if let Err(e) = fs::create_dir_all(&log_dir) {
        eprintln!("Warning: Failed to create log directory {log_dir:?}: {e}");
        return None;
    }

    let log_path = log_dir.join("climux.log");

    match OpenOptions::new().create(true).append(true).open(&log_path) {
        Ok(file) => Some(file),
        Err(e) => {
            eprintln!("Warning: Failed to open log file {log_path:?}: {e}");
            None
        }
    }
}

/// Logs to a file; the terminal belongs to the sessions.
fn init_logging() {
    match create_log_file() {
        Some(file) => {
            let filter = EnvFilter::from_default_env()
                .add_directive(
                    "climux=info"
                        .parse()
                        .unwrap_or_else(|_| tracing_subscriber::filter::Directive::from(tracing::Level::INFO)),
                )
                .add_directive(
                    "climux_host=info"
                        .parse()
                        .unwrap_or_else(|_| tracing_subscriber::filter::Directive::from(tracing::Level::INFO)),
                );
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(EnvFilter::new("off"))
                .init();
        }
    }
}

// ============================================================================
// Commands
// ============================================================================

fn load_config(path: Option<PathBuf>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::load_from(&path),
        None => Config::load(),
    };
    config.context("Failed to load configuration")
}

fn print_profiles(config: &Config) {
    for profile in &config.profiles {
        println!(
            "{:<36} {:<20} {}",
            profile.command_id, profile.terminal_name, profile.docker_image
        );
    }
}

async fn require_backend(backend: &dyn SessionBackend) -> Result<()> {
    if !backend.is_available().await {
        bail!("{} is not available. {BACKEND_REMEDIATION}", backend.tool_name());
    }
    Ok(())
}

/// Builds a manager whose terminals run in the foreground of this TTY.
fn build_manager(
    config: &Config,
    backend: Arc<dyn SessionBackend>,
) -> (SessionManager, mpsc::UnboundedReceiver<TerminalEvent>) {
    let scanner_path = config.scanner_path();
    info!(scanner = %scanner_path.display(), "Using scanner");

    let (host, events) = ProcessTerminalHost::spawn(scanner_path, Arc::clone(&backend));
    let manager = SessionManager::new(
        backend,
        Arc::new(host),
        Arc::new(ConsoleNotifier),
        config.pattern.clone(),
    );
    (manager, events)
}

/// Handles terminal events until no terminal is left.
async fn run_terminals(
    manager: &SessionManager,
    events: &mut mpsc::UnboundedReceiver<TerminalEvent>,
) -> Option<i32> {
    let mut last_exit = None;

    while manager.active_count().await > 0 {
        match events.recv().await {
            Some(TerminalEvent::Closed { id, exit_code }) => {
                last_exit = exit_code;
                if let Some(name) = manager.on_terminal_closed(id).await {
                    info!(name = %name, ?exit_code, "Session terminal closed");
                }
            }
            None => {
                warn!("Terminal host stopped");
                break;
            }
        }
    }

    last_exit
}

#[tokio::main(flavor = "current_thread")]
async fn run(command: Command, config: Config) -> Result<i32> {
    let backend: Arc<dyn SessionBackend> = Arc::new(DockerTmuxBackend::new(config.backend.clone()));

    match command {
        Command::Profiles => {
            print_profiles(&config);
            Ok(0)
        }
        Command::List => {
            require_backend(backend.as_ref()).await?;
            let sessions = backend
                .list_sessions()
                .await
                .context("Failed to list sessions")?;
            for name in sessions {
                println!("{name}");
            }
            Ok(0)
        }
        Command::Kill { name } => {
            require_backend(backend.as_ref()).await?;
            backend
                .kill_session(&name)
                .await
                .with_context(|| format!("Failed to kill session {name}"))?;
            println!("Killed {name}");
            Ok(0)
        }
        Command::Open { profile } => {
            let Some(profile) = config.profile(&profile).cloned() else {
                bail!("Unknown profile: {profile} (see `climux profiles`)");
            };

            let (manager, mut events) = build_manager(&config, backend);
            manager.start().await?;
            manager.open_session(&profile).await?;

            let exit = run_terminals(&manager, &mut events).await;
            manager.shutdown().await;
            Ok(exit.unwrap_or(0))
        }
        Command::Resume => {
            let (manager, mut events) = build_manager(&config, backend);
            let attached = manager.activate().await?;
            if attached == 0 {
                println!("No sessions to resume.");
                manager.shutdown().await;
                return Ok(0);
            }

            let exit = run_terminals(&manager, &mut events).await;
            manager.shutdown().await;
            Ok(exit.unwrap_or(0))
        }
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging();
    info!(version = env!("CARGO_PKG_VERSION"), "climux starting");

    let config = load_config(args.config)?;
    let code = run(args.command, config)?;

    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
