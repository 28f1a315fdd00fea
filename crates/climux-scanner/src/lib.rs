//! climux Scanner - pseudo-terminal proxy with output scanning
//!
//! The scanner sits between the user's terminal and an interactive child
//! running in a pseudo-terminal:
//!
//! ```text
//!  host stdin ──raw bytes──▶ ┌───────────────┐ ──▶ pty child (docker exec … tmux attach)
//!                            │ ScannerSession │
//!  host stdout ◀─raw bytes── └───────┬───────┘ ◀── pty output
//!                                    │ lines
//!                                    ▼
//!                             OutputScanner ──MatchReport──▶ ReportSink (TCP to host)
//! ```
//!
//! The child's exit code becomes the scanner's exit code.
//!
//! # Panic-Free Guarantees
//!
//! No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()` in
//! production code. Reporting and resize failures are logged and never
//! interrupt the proxy loop.

pub mod error;
pub mod line_buffer;
pub mod matcher;
pub mod pty;
pub mod reporter;
pub mod scanner;
pub mod session;
pub mod terminal;

pub use error::ScannerError;
pub use line_buffer::LineBuffer;
pub use matcher::PatternMatcher;
pub use pty::{NativePty, Pty, PtyEvent, WindowSize};
pub use reporter::{send_report, ReportSink, TcpReporter};
pub use scanner::OutputScanner;
pub use session::{run, HostEvent, ScannerSession};
pub use terminal::{window_size, RawModeGuard, FALLBACK_WINDOW_SIZE};
