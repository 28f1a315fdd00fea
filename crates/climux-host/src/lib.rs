//! climux Host - receiver, terminals and session orchestration
//!
//! The host side of climux:
//!
//! - [`MatchReceiver`]: loopback listener that scanners report auth codes to
//! - [`TerminalHost`] / [`TerminalHandle`]: the UI surface wrapping scanners
//! - [`SessionManager`]: opens, reattaches and cleans up durable sessions
//! - [`Config`]: profiles, pattern and backend settings from `config.toml`
//!
//! # Panic-Free Guarantees
//!
//! No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()` in
//! production code. Failures surface as `Result` and are reported through a
//! [`Notifier`].

pub mod config;
pub mod error;
pub mod manager;
pub mod notify;
pub mod receiver;
pub mod terminal;

pub use config::{default_profiles, Config, Profile, DEFAULT_PATTERN};
pub use error::{ConfigError, ManagerError, ReceiverError, TerminalError};
pub use manager::{SessionManager, BACKEND_REMEDIATION};
pub use notify::{ConsoleNotifier, Notifier, TracingNotifier};
pub use receiver::{MatchReceiver, READ_TIMEOUT};
pub use terminal::{ProcessTerminalHost, TerminalEvent, TerminalHandle, TerminalHost};
