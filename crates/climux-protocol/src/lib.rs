//! climux Protocol - Wire format for match reports
//!
//! A scanner reports matches by opening a fresh TCP connection to the
//! host's loopback receiver, writing one JSON document, and closing its
//! write side. The document is an array of match arrays:
//!
//! ```text
//! [["full text", "group 1", null, ...], ...]
//! ```
//!
//! Connection lifetime is the framing; there is no length prefix.

pub mod message;
pub mod parse;

pub use message::{encode_report, MAX_REPORT_SIZE};
pub use parse::{parse_report, ProtocolError};
