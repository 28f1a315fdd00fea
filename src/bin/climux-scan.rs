//! climux Scanner - runs one interactive session and watches it for auth codes
//!
//! Launched by the climux host with a single JSON argument:
//!
//! ```bash
//! climux-scan '{"port":41234,"pattern":"code ([A-Z0-9]+)","shell":"docker","shellArgs":["exec","-it","climux-jumpbox","tmux","attach-session","-t","=Azure CLI"]}'
//! ```
//!
//! Exits with the child's exit code, or 1 if the child could not be run.

use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::process;
use std::sync::Mutex;

use climux_core::ScannerArguments;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

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
    fs::create_dir_all(&log_dir).ok()?;
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("scanner.log"))
        .ok()
}

/// Logs to a file; stdout and stderr belong to the proxied session.
fn init_logging() {
    match create_log_file() {
        Some(file) => {
            let filter = EnvFilter::from_default_env().add_directive(
                "climux_scanner=info"
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
// Main Entry Point
// ============================================================================

fn main() {
    init_logging();

    let code = match std::env::args().nth(1) {
        Some(arg) => run(&arg),
        None => {
            error!("Missing scanner arguments");
            eprintln!("usage: climux-scan '<json>'");
            1
        }
    };

    // Raw mode has been restored by the time `run` returns.
    process::exit(code);
}

#[tokio::main]
async fn run(arg: &str) -> i32 {
    let args = match ScannerArguments::from_arg(arg) {
        Ok(args) => args,
        Err(e) => {
            error!(error = %e, "Invalid scanner arguments");
            eprintln!("climux-scan: invalid arguments: {e}");
            return 1;
        }
    };

    info!(pid = process::id(), port = args.port(), "Scanner starting");

    match climux_scanner::run(&args).await {
        Ok(code) => {
            info!(code, "Scanner exiting");
            code
        }
        Err(e) => {
            error!(error = %e, "Scanner failed");
            eprintln!("climux-scan: {e}");
            1
        }
    }
}
