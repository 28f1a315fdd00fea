//! Scanner invocation arguments.
//!
//! The host serialises a [`ScannerArguments`] into a single JSON argument
//! when it spawns `climux-scan`. Field names are camelCase on the wire:
//! `{"port": 4711, "pattern": "...", "shell": "docker", "shellArgs": [...]}`.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Everything a scanner process needs to start.
///
/// Immutable once constructed; one instance per spawned scanner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScannerArguments {
    port: u16,
    pattern: String,
    shell: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    shell_args: Option<Vec<String>>,
}

impl ScannerArguments {
    /// Creates scanner arguments bound to a receiver port.
    pub fn new(
        port: u16,
        pattern: impl Into<String>,
        shell: impl Into<String>,
        shell_args: Option<Vec<String>>,
    ) -> Self {
        Self {
            port,
            pattern: pattern.into(),
            shell: shell.into(),
            shell_args,
        }
    }

    /// Port of the match receiver on the loopback interface.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Regex source the scanner compiles.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Program run inside the pseudo-terminal.
    pub fn shell(&self) -> &str {
        &self.shell
    }

    /// Arguments for the shell; empty when none were given.
    pub fn shell_args(&self) -> &[String] {
        self.shell_args.as_deref().unwrap_or(&[])
    }

    /// Serialises into the single command-line argument for `climux-scan`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::ParseError` if serialisation fails.
    pub fn to_arg(&self) -> DomainResult<String> {
        serde_json::to_string(self).map_err(|e| DomainError::ParseError {
            field: "scanner arguments".to_string(),
            reason: e.to_string(),
        })
    }

    /// Parses the command-line argument given to `climux-scan`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::ParseError` if the argument is not valid JSON
    /// or lacks a required field, and `DomainError::InvalidFieldValue` if
    /// the port is zero.
    pub fn from_arg(arg: &str) -> DomainResult<Self> {
        let args: Self = serde_json::from_str(arg).map_err(|e| DomainError::ParseError {
            field: "scanner arguments".to_string(),
            reason: e.to_string(),
        })?;

        if args.port == 0 {
            return Err(DomainError::InvalidFieldValue {
                field: "port".to_string(),
                value: "0".to_string(),
                expected: "a bound receiver port".to_string(),
            });
        }

        Ok(args)
    }
}
