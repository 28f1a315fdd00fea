//! Delivery of match reports to the host.
//!
//! Every report travels over its own short-lived TCP connection to the
//! host's loopback receiver: connect, write the JSON document, shut down
//! the write side. Delivery runs on a spawned task so that a slow or
//! absent receiver never stalls the proxy loop; [`TcpReporter::drain`]
//! lets the scanner wait for those tasks before it exits.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use climux_core::MatchReport;
use climux_protocol::encode_report;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

use crate::error::ScannerError;

/// Destination for match reports.
pub trait ReportSink: Send + Sync {
    /// Hands off one report. Must not block and must not fail the caller.
    fn deliver(&self, report: MatchReport);
}

/// Sends reports to the match receiver on `127.0.0.1:<port>`.
#[derive(Debug, Clone)]
pub struct TcpReporter {
    port: u16,
    in_flight: TaskTracker,
}

impl TcpReporter {
    pub fn new(port: u16) -> Self {
        Self {
            port,
            in_flight: TaskTracker::new(),
        }
    }

    /// Waits up to `limit` for reports still being delivered.
    ///
    /// Returns `true` if every delivery finished. Reports handed over
    /// afterwards are still sent but no longer waited for.
    pub async fn drain(&self, limit: Duration) -> bool {
        self.in_flight.close();
        let pending = self.in_flight.len();
        if tokio::time::timeout(limit, self.in_flight.wait()).await.is_err() {
            warn!(pending, "Match reports still in flight at exit");
            return false;
        }
        true
    }
}

impl ReportSink for TcpReporter {
    fn deliver(&self, report: MatchReport) {
        let port = self.port;
        self.in_flight.spawn(async move {
            match send_report(port, &report).await {
                Ok(()) => debug!(port, matches = report.len(), "Delivered match report"),
                Err(e) => warn!(port, error = %e, "Failed to deliver match report"),
            }
        });
    }
}

/// Sends one report over a fresh connection and closes it.
///
/// # Errors
///
/// Returns `ScannerError::Protocol` if the report cannot be encoded and
/// `ScannerError::Io` if connecting or writing fails.
pub async fn send_report(port: u16, report: &MatchReport) -> Result<(), ScannerError> {
    let payload = encode_report(report)?;

    let mut stream = TcpStream::connect(SocketAddr::from((Ipv4Addr::LOCALHOST, port))).await?;
    stream.write_all(&payload).await?;
    stream.shutdown().await?;
    Ok(())
}
