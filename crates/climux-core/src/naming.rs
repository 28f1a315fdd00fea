//! Session naming.
//!
//! Display names such as "Azure CLI 2.0" are made unique against the names
//! already in use, then encoded into a form tmux accepts as a session name.
//!
//! tmux rejects `.` in session names (it separates window and pane in target
//! syntax), so the encoding swaps one period for an underscore. Only the
//! FIRST occurrence is translated in either direction. A name with two or
//! more periods (or with a literal underscore) does not survive the trip
//! through the backend. Existing sessions were created with this mapping,
//! so changing it would orphan them on reattach.

use std::collections::HashSet;

/// Character tmux forbids in session names.
const FORBIDDEN: char = '.';

/// Replacement stored in the backend.
const REPLACEMENT: char = '_';

/// Returns `prefix` if unused, otherwise the first free `"prefix (k)"`, k ≥ 2.
///
/// The result is never a member of `existing`.
///
/// # Example
///
/// ```
/// use climux_core::unique_name;
///
/// assert_eq!(unique_name("Azure CLI", ["Bash"]), "Azure CLI");
/// assert_eq!(unique_name("Azure CLI", ["Azure CLI"]), "Azure CLI (2)");
/// ```
pub fn unique_name<I, S>(prefix: &str, existing: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let taken: HashSet<String> = existing
        .into_iter()
        .map(|s| s.as_ref().to_string())
        .collect();

    if !taken.contains(prefix) {
        return prefix.to_string();
    }

    // `taken` is finite, so this terminates within taken.len() + 2 steps.
    let mut k: usize = 2;
    loop {
        let candidate = format!("{prefix} ({k})");
        if !taken.contains(&candidate) {
            return candidate;
        }
        k += 1;
    }
}

/// Encodes a display name for use as a tmux session name.
pub fn encode_session_name(name: &str) -> String {
    replace_first(name, FORBIDDEN, REPLACEMENT)
}

/// Decodes a tmux session name back to its display name.
pub fn decode_session_name(name: &str) -> String {
    replace_first(name, REPLACEMENT, FORBIDDEN)
}

fn replace_first(s: &str, from: char, to: char) -> String {
    let mut buf = [0u8; 4];
    s.replacen(from, to.encode_utf8(&mut buf), 1)
}
