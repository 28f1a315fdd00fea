//! Encoding match reports for the wire.

use climux_core::MatchReport;

use crate::parse::ProtocolError;

/// Largest report the receiver accepts (1 MB).
pub const MAX_REPORT_SIZE: usize = 1_048_576;

/// Encodes a report as the single message of one connection.
///
/// # Errors
///
/// - `ProtocolError::EmptyReport` if the report holds no matches; empty
///   reports are never sent
/// - `ProtocolError::TooLarge` if the encoded form exceeds `MAX_REPORT_SIZE`
/// - `ProtocolError::Json` if serialisation fails
pub fn encode_report(report: &MatchReport) -> Result<Vec<u8>, ProtocolError> {
    if report.is_empty() {
        return Err(ProtocolError::EmptyReport);
    }

    let bytes = serde_json::to_vec(report)?;
    if bytes.len() > MAX_REPORT_SIZE {
        return Err(ProtocolError::TooLarge {
            size: bytes.len(),
            max: MAX_REPORT_SIZE,
        });
    }

    Ok(bytes)
}
