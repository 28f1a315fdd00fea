//! climux Core - Shared types for durable CLI sessions
//!
//! This crate provides the domain types shared between the scanner
//! process (`climux-scan`) and the host side (`climux-host`).
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod error;
pub mod matching;
pub mod naming;
pub mod scanner_args;
pub mod session;

// Re-exports for convenience
pub use error::{DomainError, DomainResult};
pub use matching::{MatchReport, MatchResult};
pub use naming::{decode_session_name, encode_session_name, unique_name};
pub use scanner_args::ScannerArguments;
pub use session::{Session, TerminalId};
