//! Pseudo-terminal capability and its portable-pty implementation.
//!
//! The proxy loop only needs four things from a pseudo-terminal: write
//! input, resize, kill, and a stream of [`PtyEvent`]s (output and exit).
//! [`Pty`] captures the first three; the event stream is the channel
//! returned alongside the handle at spawn time.
//!
//! ```text
//!              input queue           ┌──────────────┐
//!  Pty::write ─────────────▶ writer ─▶│              │
//!                            thread   │  PTY master  │◀──▶ child
//!  PtyEvent  ◀───────────── reader ◀─│              │
//!             event channel  thread   └──────────────┘
//! ```
//!
//! A child that stops reading its input never stalls the output side.

use std::io::{Read, Write};
use std::path::Path;
use std::thread;

use portable_pty::{native_pty_system, ChildKiller, CommandBuilder, MasterPty, PtySize};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::ScannerError;

/// Size of each read from the pseudo-terminal master.
const READ_BUFFER_SIZE: usize = 8192;

/// Capacity of the event channel from the reader thread.
const EVENT_BUFFER: usize = 256;

/// Terminal dimensions in character cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSize {
    pub cols: u16,
    pub rows: u16,
}

impl WindowSize {
    pub fn new(cols: u16, rows: u16) -> Self {
        Self { cols, rows }
    }
}

/// Something that happened on the child side of the pseudo-terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PtyEvent {
    /// Output bytes, exactly as read
    Data(Vec<u8>),
    /// The child exited; no further events follow
    Exit(i32),
}

/// Control surface of a running pseudo-terminal child.
///
/// Implementations must not block: the proxy loop calls them between
/// output reads.
pub trait Pty: Send {
    /// Queues input bytes for the child.
    fn write(&mut self, data: &[u8]) -> std::io::Result<()>;

    /// Changes the terminal size seen by the child.
    fn resize(&mut self, size: WindowSize) -> Result<(), ScannerError>;

    /// Terminates the child.
    fn kill(&mut self) -> Result<(), ScannerError>;
}

/// A child process running in a native pseudo-terminal.
pub struct NativePty {
    master: Box<dyn MasterPty + Send>,
    input: mpsc::UnboundedSender<Vec<u8>>,
    killer: Box<dyn ChildKiller + Send + Sync>,
}

impl NativePty {
    /// Spawns `shell args...` in a new pseudo-terminal of `size`.
    ///
    /// Starts a reader thread that forwards output as `PtyEvent::Data` and,
    /// once output ends, waits for the child and sends `PtyEvent::Exit`
    /// with its exit code. Input is written by a second thread in the
    /// order it was queued.
    ///
    /// # Errors
    ///
    /// Returns `ScannerError::Spawn` if the pseudo-terminal cannot be
    /// opened or the child cannot be started.
    pub fn spawn(
        shell: &str,
        args: &[String],
        cwd: Option<&Path>,
        size: WindowSize,
    ) -> Result<(Self, mpsc::Receiver<PtyEvent>), ScannerError> {
        let spawn_err = |reason: String| ScannerError::Spawn {
            shell: shell.to_string(),
            reason,
        };

        let pair = native_pty_system()
            .openpty(to_pty_size(size))
            .map_err(|e| spawn_err(e.to_string()))?;

        let mut cmd = CommandBuilder::new(shell);
        cmd.args(args);
        if let Some(cwd) = cwd {
            cmd.cwd(cwd);
        }

        let mut child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| spawn_err(e.to_string()))?;
        // The master only sees EOF once no slave handle remains open here.
        drop(pair.slave);

        let killer = child.clone_killer();
        let mut reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| spawn_err(e.to_string()))?;
        let mut writer = pair
            .master
            .take_writer()
            .map_err(|e| spawn_err(e.to_string()))?;

        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);

        thread::spawn(move || {
            let mut buffer = [0u8; READ_BUFFER_SIZE];
            loop {
                match reader.read(&mut buffer) {
                    Ok(0) => break,
                    Ok(n) => {
                        let data = buffer.get(..n).unwrap_or_default().to_vec();
                        if event_tx.blocking_send(PtyEvent::Data(data)).is_err() {
                            break;
                        }
                    }
                    // Linux reports EIO on the master once the child is gone.
                    Err(e) => {
                        debug!(error = %e, "PTY read ended");
                        break;
                    }
                }
            }

            let code = match child.wait() {
                Ok(status) => i32::try_from(status.exit_code()).unwrap_or(1),
                Err(e) => {
                    warn!(error = %e, "Failed to wait for child");
                    1
                }
            };
            let _ = event_tx.blocking_send(PtyEvent::Exit(code));
        });

        let (input, mut input_rx) = mpsc::unbounded_channel::<Vec<u8>>();

        thread::spawn(move || {
            while let Some(data) = input_rx.blocking_recv() {
                let written = writer.write_all(&data).and_then(|()| writer.flush());
                if let Err(e) = written {
                    debug!(error = %e, "PTY write ended");
                    break;
                }
            }
        });

        Ok((
            Self {
                master: pair.master,
                input,
                killer,
            },
            event_rx,
        ))
    }
}

impl Pty for NativePty {
    fn write(&mut self, data: &[u8]) -> std::io::Result<()> {
        self.input.send(data.to_vec()).map_err(|_| {
            std::io::Error::new(std::io::ErrorKind::BrokenPipe, "PTY writer stopped")
        })
    }

    fn resize(&mut self, size: WindowSize) -> Result<(), ScannerError> {
        self.master
            .resize(to_pty_size(size))
            .map_err(|e| ScannerError::Resize(e.to_string()))
    }

    fn kill(&mut self) -> Result<(), ScannerError> {
        self.killer.kill().map_err(ScannerError::Io)
    }
}

fn to_pty_size(size: WindowSize) -> PtySize {
    PtySize {
        rows: size.rows.max(1),
        cols: size.cols.max(1),
        pixel_width: 0,
        pixel_height: 0,
    }
}
