//! Session and terminal identity.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::naming::{decode_session_name, encode_session_name};

// ============================================================================
// Type-Safe Identifiers
// ============================================================================

/// Process-unique identifier for a host terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TerminalId(u64);

static NEXT_TERMINAL_ID: AtomicU64 = AtomicU64::new(1);

impl TerminalId {
    /// Allocates the next terminal ID.
    pub fn next() -> Self {
        Self(NEXT_TERMINAL_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for TerminalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "term-{}", self.0)
    }
}

// ============================================================================
// Session
// ============================================================================

/// A named session living in the session backend.
///
/// `name` is what the user sees; `backend_name` is the encoded form the
/// backend stores.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Session {
    name: String,
    backend_name: String,
}

impl Session {
    /// Creates a session from its display name.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let backend_name = encode_session_name(&name);
        Self { name, backend_name }
    }

    /// Creates a session from the name the backend reported.
    pub fn from_backend(backend_name: impl Into<String>) -> Self {
        let backend_name = backend_name.into();
        let name = decode_session_name(&backend_name);
        Self { name, backend_name }
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Identifier in the backend.
    pub fn backend_name(&self) -> &str {
        &self.backend_name
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
