//! Host terminal helpers: window size and raw mode.

use std::io::IsTerminal;

use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use tracing::{debug, warn};

use crate::pty::WindowSize;

/// Size used when stdout is not a terminal.
pub const FALLBACK_WINDOW_SIZE: WindowSize = WindowSize { cols: 80, rows: 30 };

/// Current size of the host terminal, or the fallback.
pub fn window_size() -> WindowSize {
    if !std::io::stdout().is_terminal() {
        return FALLBACK_WINDOW_SIZE;
    }

    match crossterm::terminal::size() {
        Ok((cols, rows)) if cols > 0 && rows > 0 => WindowSize::new(cols, rows),
        Ok(_) => FALLBACK_WINDOW_SIZE,
        Err(e) => {
            debug!(error = %e, "Could not read window size");
            FALLBACK_WINDOW_SIZE
        }
    }
}

/// Puts the host terminal into raw mode for as long as it lives.
///
/// The nested session does its own line editing and echo, so the host
/// terminal must pass keystrokes through untouched. Does nothing when
/// stdin is not a terminal.
#[derive(Debug)]
pub struct RawModeGuard {
    enabled: bool,
}

impl RawModeGuard {
    pub fn enable() -> Self {
        if !std::io::stdin().is_terminal() {
            return Self { enabled: false };
        }

        match enable_raw_mode() {
            Ok(()) => Self { enabled: true },
            Err(e) => {
                warn!(error = %e, "Failed to enable raw mode");
                Self { enabled: false }
            }
        }
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if self.enabled {
            if let Err(e) = disable_raw_mode() {
                warn!(error = %e, "Failed to restore terminal mode");
            }
        }
    }
}
