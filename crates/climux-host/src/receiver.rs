//! Loopback listener for scanner match reports.
//!
//! Each scanner reports matches by connecting, writing one JSON document and
//! closing its write side. The receiver reads every connection to EOF,
//! parses it once, and fans the contained match results out to subscribers.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  MatchReceiver  │
//! │  TcpListener    │  127.0.0.1:<ephemeral>
//! └───────┬─────────┘
//!         │ accept()
//!         ▼
//! ┌─────────────────┐  MatchReport  ┌─────────────┐  MatchResult  ┌─────────────┐
//! │ connection task │──────────────▶│ dispatcher  │──────────────▶│ subscribers │
//! │ (per scanner)   │     mpsc      │             │   broadcast   │             │
//! └─────────────────┘               └─────────────┘               └─────────────┘
//! ```
//!
//! A single dispatcher publishes every result, so the results of one report
//! reach subscribers contiguously and in order.
//!
//! # Panic-Free Guarantees
//!
//! No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`.
//! Malformed or stalled connections are logged and dropped; they never stop
//! the listener.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use climux_core::{MatchReport, MatchResult, ScannerArguments};
use climux_protocol::{parse_report, MAX_REPORT_SIZE};
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::ReceiverError;

/// How long a connection may stay open without finishing its report.
pub const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Capacity of the match result broadcast channel.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Capacity of the report queue feeding the dispatcher.
const REPORT_QUEUE_CAPACITY: usize = 64;

/// Accepts match reports from scanners and publishes their results.
pub struct MatchReceiver {
    started: AtomicBool,
    port_tx: watch::Sender<Option<u16>>,
    events: broadcast::Sender<MatchResult>,
    read_timeout: Duration,
}

impl Default for MatchReceiver {
    fn default() -> Self {
        Self::new()
    }
}

impl MatchReceiver {
    pub fn new() -> Self {
        let (port_tx, _) = watch::channel(None);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            started: AtomicBool::new(false),
            port_tx,
            events,
            read_timeout: READ_TIMEOUT,
        }
    }

    /// Overrides the per-connection read timeout.
    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    /// Binds the listener and starts accepting reports.
    ///
    /// Returns the OS-assigned port. The listener runs until `cancel_token`
    /// fires.
    ///
    /// # Errors
    ///
    /// Returns `ReceiverError::AlreadyStarted` on a second call and
    /// `ReceiverError::Bind` if the loopback listener cannot be bound.
    pub async fn start(&self, cancel_token: CancellationToken) -> Result<u16, ReceiverError> {
        if self
            .started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(ReceiverError::AlreadyStarted);
        }

        let listener = match TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await {
            Ok(listener) => listener,
            Err(e) => {
                self.started.store(false, Ordering::SeqCst);
                return Err(ReceiverError::Bind(e));
            }
        };
        let port = listener.local_addr().map_err(ReceiverError::Bind)?.port();

        let (report_tx, report_rx) = mpsc::channel(REPORT_QUEUE_CAPACITY);
        spawn_dispatcher(report_rx, self.events.clone());
        spawn_accept_loop(listener, report_tx, self.read_timeout, cancel_token);

        self.port_tx.send_replace(Some(port));
        info!(port, "Match receiver listening");
        Ok(port)
    }

    /// The bound port, if started.
    pub fn port(&self) -> Option<u16> {
        *self.port_tx.borrow()
    }

    /// Builds scanner arguments bound to this receiver's port.
    ///
    /// Waits for [`start`](Self::start) if it has not finished yet.
    ///
    /// # Errors
    ///
    /// Returns `ReceiverError::Stopped` if the port can never become known.
    pub async fn scanner_arguments(
        &self,
        pattern: &str,
        shell: &str,
        shell_args: Option<Vec<String>>,
    ) -> Result<ScannerArguments, ReceiverError> {
        let mut port_rx = self.port_tx.subscribe();
        let port = *port_rx
            .wait_for(Option::is_some)
            .await
            .map_err(|_| ReceiverError::Stopped)?;
        let port = port.ok_or(ReceiverError::Stopped)?;

        Ok(ScannerArguments::new(port, pattern, shell, shell_args))
    }

    /// Subscribes to match results.
    ///
    /// Only results of reports received after subscribing are seen.
    pub fn subscribe(&self) -> broadcast::Receiver<MatchResult> {
        self.events.subscribe()
    }
}

fn spawn_accept_loop(
    listener: TcpListener,
    report_tx: mpsc::Sender<MatchReport>,
    read_timeout: Duration,
    cancel_token: CancellationToken,
) {
    tokio::spawn(async move {
        let mut connection_number: u64 = 0;
        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => {
                    info!("Match receiver shutting down");
                    break;
                }

                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            connection_number += 1;
                            handle_connection(stream, addr, connection_number, read_timeout, report_tx.clone());
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                        }
                    }
                }
            }
        }
    });
}

fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    connection_number: u64,
    read_timeout: Duration,
    report_tx: mpsc::Sender<MatchReport>,
) {
    tokio::spawn(async move {
        match read_report(stream, read_timeout).await {
            Ok(report) => {
                debug!(connection_number, %addr, matches = report.len(), "Received match report");
                if report_tx.send(report).await.is_err() {
                    debug!(connection_number, "Dispatcher gone, dropping report");
                }
            }
            Err(e) => {
                warn!(connection_number, %addr, error = %e, "Dropping match report");
            }
        }
    });
}

/// Reads one connection to EOF and parses it as a report.
async fn read_report(stream: TcpStream, read_timeout: Duration) -> Result<MatchReport, ReceiverError> {
    // One byte past the limit is enough to tell an oversize report apart.
    let limit = u64::try_from(MAX_REPORT_SIZE).unwrap_or(u64::MAX).saturating_add(1);
    let mut reader = stream.take(limit);
    let mut buffer = Vec::new();

    timeout(read_timeout, reader.read_to_end(&mut buffer))
        .await
        .map_err(|_| ReceiverError::ReadTimeout)??;

    Ok(parse_report(&buffer)?)
}

fn spawn_dispatcher(
    mut report_rx: mpsc::Receiver<MatchReport>,
    events: broadcast::Sender<MatchResult>,
) {
    tokio::spawn(async move {
        while let Some(report) = report_rx.recv().await {
            for result in report {
                if events.send(result).is_err() {
                    debug!("No match subscribers");
                }
            }
        }
        debug!("Match dispatcher stopped");
    });
}
