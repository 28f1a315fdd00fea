//! climux Tmux - Session backend
//!
//! Sessions live in a tmux server that runs inside one long-lived
//! "jumpbox" container. Every operation is a `docker exec` into that
//! container, so sessions survive the host process that created them.
//!
//! - `backend` - the `SessionBackend` trait the orchestrator consumes
//! - `docker` - the docker + tmux implementation
//! - `runner` - process execution, swappable for tests
//!
//! # Panic-Free Guarantees
//!
//! No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()` in
//! production code; command failures are returned as `BackendError`.

pub mod backend;
pub mod config;
pub mod docker;
pub mod error;
pub mod runner;

pub use backend::{LaunchCommand, SessionBackend};
pub use config::BackendConfig;
pub use docker::DockerTmuxBackend;
pub use error::BackendError;
pub use runner::{CommandOutput, CommandRunner, TokioCommandRunner};
