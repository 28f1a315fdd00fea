//! Parsing inbound match reports.
//!
//! Reports arrive from separate processes over a local socket, so every
//! payload is treated as untrusted: anything that is not an array of arrays
//! of strings and nulls is rejected as a whole.

use climux_core::{MatchReport, MatchResult};
use thiserror::Error;

use crate::message::MAX_REPORT_SIZE;

/// Errors that can occur while encoding or parsing a report.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Payload exceeds the size limit
    #[error("report too large: {size} bytes (max: {max})")]
    TooLarge { size: usize, max: usize },

    /// Payload is not UTF-8
    #[error("report is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    /// Payload is not a JSON array of match arrays
    #[error("malformed report: {0}")]
    Json(#[from] serde_json::Error),

    /// Attempted to send a report with no matches
    #[error("report contains no matches")]
    EmptyReport,
}

/// Parses one complete message into a report.
///
/// An empty array is accepted and yields an empty report.
///
/// # Errors
///
/// - `ProtocolError::TooLarge` if the payload exceeds `MAX_REPORT_SIZE`
/// - `ProtocolError::InvalidUtf8` if the payload is not UTF-8
/// - `ProtocolError::Json` if the payload is not an array of arrays whose
///   elements are strings or nulls
pub fn parse_report(payload: &[u8]) -> Result<MatchReport, ProtocolError> {
    if payload.len() > MAX_REPORT_SIZE {
        return Err(ProtocolError::TooLarge {
            size: payload.len(),
            max: MAX_REPORT_SIZE,
        });
    }

    let text = std::str::from_utf8(payload)?;
    let raw: Vec<Vec<Option<String>>> = serde_json::from_str(text)?;

    Ok(raw.into_iter().map(MatchResult::new).collect())
}
