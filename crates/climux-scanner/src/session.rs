//! The scanner's proxy loop.
//!
//! [`ScannerSession`] owns the pseudo-terminal handle and the output
//! scanner and multiplexes two streams:
//!
//! - host events (keystrokes, resizes, hangup) flowing towards the child
//! - pty events (output, exit) flowing towards the host terminal
//!
//! [`run`] wires a real pseudo-terminal, stdin, stdout and signals into a
//! session; the loop itself only sees channels and an `AsyncWrite`, which is
//! what the tests drive.

use std::io::Read;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use climux_core::ScannerArguments;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::ScannerError;
use crate::matcher::PatternMatcher;
use crate::pty::{NativePty, Pty, PtyEvent, WindowSize};
use crate::reporter::{ReportSink, TcpReporter};
use crate::scanner::OutputScanner;
use crate::terminal::{window_size, RawModeGuard};

/// Capacity of the host event channel.
const HOST_EVENT_BUFFER: usize = 256;

/// Size of each read from the host's stdin.
const STDIN_BUFFER_SIZE: usize = 4096;

/// Exit code when the child vanished without reporting a status.
const LOST_CHILD_EXIT_CODE: i32 = 1;

/// How long a finished scanner waits for reports still being sent.
const REPORT_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Something the host side asks of the child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    /// Keystrokes, forwarded verbatim
    Input(Vec<u8>),
    /// The host terminal changed size
    Resize(WindowSize),
    /// The host is going away; terminate the child
    Hangup,
}

/// One proxied child plus its output scanner.
pub struct ScannerSession<P: Pty> {
    pty: P,
    scanner: OutputScanner,
    sink: Arc<dyn ReportSink>,
}

impl<P: Pty> ScannerSession<P> {
    pub fn new(pty: P, scanner: OutputScanner, sink: Arc<dyn ReportSink>) -> Self {
        Self { pty, scanner, sink }
    }

    /// Runs until the child exits and returns its exit code.
    ///
    /// Host events are handled before pending output so that keystrokes
    /// and resizes are never starved by a chatty child.
    pub async fn run<W>(
        mut self,
        mut pty_events: mpsc::Receiver<PtyEvent>,
        mut host_events: mpsc::Receiver<HostEvent>,
        output: &mut W,
    ) -> i32
    where
        W: AsyncWrite + Unpin,
    {
        let mut host_open = true;

        loop {
            tokio::select! {
                biased;

                event = host_events.recv(), if host_open => match event {
                    Some(event) => self.handle_host_event(event),
                    None => {
                        debug!("Host event stream closed");
                        host_open = false;
                    }
                },

                event = pty_events.recv() => match event {
                    Some(PtyEvent::Data(data)) => self.handle_output(&data, output).await,
                    Some(PtyEvent::Exit(code)) => {
                        info!(code, "Child exited");
                        return code;
                    }
                    None => {
                        warn!("PTY closed without an exit status");
                        return LOST_CHILD_EXIT_CODE;
                    }
                },
            }
        }
    }

    fn handle_host_event(&mut self, event: HostEvent) {
        match event {
            HostEvent::Input(data) => {
                if let Err(e) = self.pty.write(&data) {
                    warn!(error = %e, "Failed to forward input");
                }
            }
            HostEvent::Resize(size) => {
                debug!(cols = size.cols, rows = size.rows, "Resizing PTY");
                if let Err(e) = self.pty.resize(size) {
                    warn!(error = %e, "Failed to resize PTY");
                }
            }
            HostEvent::Hangup => {
                info!("Hangup received, terminating child");
                if let Err(e) = self.pty.kill() {
                    warn!(error = %e, "Failed to kill child");
                }
            }
        }
    }

    /// Mirrors output to the host, then scans it.
    async fn handle_output<W>(&mut self, data: &[u8], output: &mut W)
    where
        W: AsyncWrite + Unpin,
    {
        let written = async {
            output.write_all(data).await?;
            output.flush().await
        }
        .await;
        if let Err(e) = written {
            debug!(error = %e, "Failed to write to host terminal");
        }

        if let Some(report) = self.scanner.feed(data) {
            debug!(matches = report.len(), "Pattern matched");
            self.sink.deliver(report);
        }
    }
}

/// Runs a scanner for `args` against the real terminal.
///
/// Spawns the child in a pseudo-terminal sized like the host window, puts
/// the host terminal in raw mode, and proxies until the child exits.
/// Reports sent from the last output are awaited briefly before returning.
///
/// # Errors
///
/// Returns `ScannerError::InvalidPattern` if the pattern does not compile
/// and `ScannerError::Spawn` if the child cannot be started.
pub async fn run(args: &ScannerArguments) -> Result<i32, ScannerError> {
    let matcher = PatternMatcher::new(args.pattern())?;

    let home = dirs::home_dir();
    let size = window_size();
    let (pty, pty_events) = NativePty::spawn(args.shell(), args.shell_args(), home.as_deref(), size)?;
    info!(
        shell = %args.shell(),
        cols = size.cols,
        rows = size.rows,
        port = args.port(),
        "Scanner started"
    );

    let _raw_mode = RawModeGuard::enable();

    let (host_tx, host_rx) = mpsc::channel(HOST_EVENT_BUFFER);
    spawn_stdin_reader(host_tx.clone());
    spawn_signal_watcher(host_tx);

    let reporter = Arc::new(TcpReporter::new(args.port()));
    let session = ScannerSession::new(
        pty,
        OutputScanner::new(matcher),
        Arc::clone(&reporter) as Arc<dyn ReportSink>,
    );

    let mut stdout = tokio::io::stdout();
    let code = session.run(pty_events, host_rx, &mut stdout).await;
    reporter.drain(REPORT_DRAIN_TIMEOUT).await;
    Ok(code)
}

/// Reads stdin on a dedicated thread.
///
/// A blocking stdin read cannot be cancelled, so it must not live on the
/// runtime where it would hold up shutdown.
fn spawn_stdin_reader(tx: mpsc::Sender<HostEvent>) {
    thread::spawn(move || {
        let mut stdin = std::io::stdin().lock();
        let mut buffer = [0u8; STDIN_BUFFER_SIZE];
        loop {
            match stdin.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => {
                    let data = buffer.get(..n).unwrap_or_default().to_vec();
                    if tx.blocking_send(HostEvent::Input(data)).is_err() {
                        break;
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    debug!(error = %e, "Stdin read failed");
                    break;
                }
            }
        }
    });
}

/// Turns SIGWINCH into resizes and SIGHUP/SIGTERM into a hangup.
#[cfg(unix)]
fn spawn_signal_watcher(tx: mpsc::Sender<HostEvent>) {
    use tokio::signal::unix::{signal, SignalKind};

    let signals = (
        signal(SignalKind::window_change()),
        signal(SignalKind::hangup()),
        signal(SignalKind::terminate()),
    );
    let (mut winch, mut hup, mut term) = match signals {
        (Ok(winch), Ok(hup), Ok(term)) => (winch, hup, term),
        _ => {
            warn!("Failed to install signal handlers; resize disabled");
            return;
        }
    };

    tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                Some(()) = winch.recv() => HostEvent::Resize(window_size()),
                Some(()) = hup.recv() => HostEvent::Hangup,
                Some(()) = term.recv() => HostEvent::Hangup,
                else => break,
            };
            if tx.send(event).await.is_err() {
                break;
            }
        }
    });
}

#[cfg(not(unix))]
fn spawn_signal_watcher(_tx: mpsc::Sender<HostEvent>) {}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use climux_core::MatchReport;

    #[derive(Default)]
    struct Recorded {
        input: Vec<u8>,
        resizes: Vec<WindowSize>,
        kills: usize,
    }

    struct FakePty(Arc<Mutex<Recorded>>);

    impl Pty for FakePty {
        fn write(&mut self, data: &[u8]) -> std::io::Result<()> {
            self.0.lock().unwrap().input.extend_from_slice(data);
            Ok(())
        }

        fn resize(&mut self, size: WindowSize) -> Result<(), ScannerError> {
            self.0.lock().unwrap().resizes.push(size);
            Ok(())
        }

        fn kill(&mut self) -> Result<(), ScannerError> {
            self.0.lock().unwrap().kills += 1;
            Ok(())
        }
    }

    #[derive(Default)]
    struct CollectingSink(Mutex<Vec<MatchReport>>);

    impl ReportSink for CollectingSink {
        fn deliver(&self, report: MatchReport) {
            self.0.lock().unwrap().push(report);
        }
    }

    struct Harness {
        recorded: Arc<Mutex<Recorded>>,
        sink: Arc<CollectingSink>,
        pty_tx: mpsc::Sender<PtyEvent>,
        host_tx: mpsc::Sender<HostEvent>,
        session: ScannerSession<FakePty>,
        pty_rx: mpsc::Receiver<PtyEvent>,
        host_rx: mpsc::Receiver<HostEvent>,
    }

    fn harness() -> Harness {
        let recorded = Arc::new(Mutex::new(Recorded::default()));
        let sink = Arc::new(CollectingSink::default());
        let (pty_tx, pty_rx) = mpsc::channel(64);
        let (host_tx, host_rx) = mpsc::channel(64);
        let session = ScannerSession::new(
            FakePty(Arc::clone(&recorded)),
            OutputScanner::new(PatternMatcher::new(r"code (\w+)").unwrap()),
            Arc::clone(&sink) as Arc<dyn ReportSink>,
        );
        Harness {
            recorded,
            sink,
            pty_tx,
            host_tx,
            session,
            pty_rx,
            host_rx,
        }
    }

    #[tokio::test]
    async fn test_exit_code_is_propagated() {
        let h = harness();
        h.pty_tx.send(PtyEvent::Exit(42)).await.unwrap();

        let mut out = Vec::new();
        let code = h.session.run(h.pty_rx, h.host_rx, &mut out).await;
        assert_eq!(code, 42);
    }

    #[tokio::test]
    async fn test_lost_child_exits_with_one() {
        let h = harness();
        drop(h.pty_tx);

        let mut out = Vec::new();
        let code = h.session.run(h.pty_rx, h.host_rx, &mut out).await;
        assert_eq!(code, 1);
    }

    #[tokio::test]
    async fn test_output_is_mirrored_verbatim() {
        let h = harness();
        let bytes = b"\x1b[1mbold\x1b[0m\r\npartial".to_vec();
        h.pty_tx.send(PtyEvent::Data(bytes.clone())).await.unwrap();
        h.pty_tx.send(PtyEvent::Exit(0)).await.unwrap();

        let mut out = Vec::new();
        h.session.run(h.pty_rx, h.host_rx, &mut out).await;
        assert_eq!(out, bytes);
    }

    #[tokio::test]
    async fn test_input_is_forwarded_verbatim() {
        let h = harness();
        h.host_tx.send(HostEvent::Input(b"az login\r".to_vec())).await.unwrap();
        h.host_tx.send(HostEvent::Input(vec![0x03])).await.unwrap();
        h.pty_tx.send(PtyEvent::Exit(0)).await.unwrap();

        let mut out = Vec::new();
        h.session.run(h.pty_rx, h.host_rx, &mut out).await;
        assert_eq!(h.recorded.lock().unwrap().input, b"az login\r\x03".to_vec());
    }

    #[tokio::test]
    async fn test_one_report_per_chunk() {
        let h = harness();
        h.pty_tx
            .send(PtyEvent::Data(b"code A\ncode B\nnoise\n".to_vec()))
            .await
            .unwrap();
        h.pty_tx.send(PtyEvent::Data(b"nothing\n".to_vec())).await.unwrap();
        h.pty_tx.send(PtyEvent::Data(b"code C\n".to_vec())).await.unwrap();
        h.pty_tx.send(PtyEvent::Exit(0)).await.unwrap();

        let mut out = Vec::new();
        h.session.run(h.pty_rx, h.host_rx, &mut out).await;

        let reports = h.sink.0.lock().unwrap();
        assert_eq!(reports.len(), 2);
        let first: Vec<_> = reports[0].iter().filter_map(|m| m.group(1)).collect();
        assert_eq!(first, vec!["A", "B"]);
        assert_eq!(reports[1].matches()[0].group(1), Some("C"));
    }

    #[tokio::test]
    async fn test_resize_between_chunks_keeps_partial_line() {
        let h = harness();
        h.pty_tx.send(PtyEvent::Data(b"enter code XY".to_vec())).await.unwrap();
        h.host_tx
            .send(HostEvent::Resize(WindowSize::new(100, 40)))
            .await
            .unwrap();
        h.pty_tx.send(PtyEvent::Data(b"Z now\n".to_vec())).await.unwrap();
        h.pty_tx.send(PtyEvent::Exit(0)).await.unwrap();

        let mut out = Vec::new();
        h.session.run(h.pty_rx, h.host_rx, &mut out).await;

        assert_eq!(
            h.recorded.lock().unwrap().resizes,
            vec![WindowSize::new(100, 40)]
        );
        let reports = h.sink.0.lock().unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].matches()[0].group(1), Some("XYZ"));
    }

    #[tokio::test]
    async fn test_hangup_kills_child_and_waits_for_exit() {
        let h = harness();
        h.host_tx.send(HostEvent::Hangup).await.unwrap();

        let recorded = Arc::clone(&h.recorded);
        let pty_tx = h.pty_tx.clone();
        let run = tokio::spawn(async move {
            let mut out = Vec::new();
            h.session.run(h.pty_rx, h.host_rx, &mut out).await
        });

        // The child reports its exit only after being killed.
        while recorded.lock().unwrap().kills == 0 {
            tokio::task::yield_now().await;
        }
        pty_tx.send(PtyEvent::Exit(129)).await.unwrap();

        assert_eq!(run.await.unwrap(), 129);
        assert_eq!(recorded.lock().unwrap().kills, 1);
    }

    #[tokio::test]
    async fn test_closed_host_stream_keeps_proxying() {
        let h = harness();
        drop(h.host_tx);
        h.pty_tx.send(PtyEvent::Data(b"code LATE\n".to_vec())).await.unwrap();
        h.pty_tx.send(PtyEvent::Exit(0)).await.unwrap();

        let mut out = Vec::new();
        let code = h.session.run(h.pty_rx, h.host_rx, &mut out).await;
        assert_eq!(code, 0);
        assert_eq!(h.sink.0.lock().unwrap().len(), 1);
    }
}
