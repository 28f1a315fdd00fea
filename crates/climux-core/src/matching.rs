//! Match results produced by the output scanner.
//!
//! A [`MatchResult`] is an ordered list of capture slots: the full matched
//! text first, then each capture group. A group that did not participate in
//! the match is `None`. On the wire it is a JSON array of strings and nulls.

use serde::{Deserialize, Serialize};

// ============================================================================
// Match Result
// ============================================================================

/// One pattern match over a single complete line.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchResult(Vec<Option<String>>);

impl MatchResult {
    /// Creates a match result from capture slots (full text first).
    pub fn new(slots: Vec<Option<String>>) -> Self {
        Self(slots)
    }

    /// Returns the full matched text (slot 0).
    pub fn full_text(&self) -> Option<&str> {
        self.slot(0)
    }

    /// Returns capture group `index` (1-based, like regex groups).
    ///
    /// Returns `None` if the group is absent or out of range.
    pub fn group(&self, index: usize) -> Option<&str> {
        if index == 0 {
            return None;
        }
        self.slot(index)
    }

    /// Returns the slot at `index`, where slot 0 is the full text.
    pub fn slot(&self, index: usize) -> Option<&str> {
        self.0.get(index).and_then(|s| s.as_deref())
    }

    /// Returns all capture slots.
    pub fn slots(&self) -> &[Option<String>] {
        &self.0
    }

    /// Number of slots, including the full-text slot.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the result carries no slots at all.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the last present capture group, falling back to the full text.
    ///
    /// Auth-code patterns put the code in their final group, so this is what
    /// the host surfaces to the user.
    pub fn code(&self) -> Option<&str> {
        self.0
            .iter()
            .skip(1)
            .rev()
            .find_map(|s| s.as_deref())
            .or_else(|| self.full_text())
    }
}

impl From<Vec<Option<String>>> for MatchResult {
    fn from(slots: Vec<Option<String>>) -> Self {
        Self(slots)
    }
}

// ============================================================================
// Match Report
// ============================================================================

/// All matches found while processing one chunk of terminal output.
///
/// A report is delivered as one message; an empty report is never sent.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchReport(Vec<MatchResult>);

impl MatchReport {
    /// Creates an empty report.
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Appends a match, preserving line order.
    pub fn push(&mut self, result: MatchResult) {
        self.0.push(result);
    }

    /// Number of matches in the report.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the report holds no matches.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates the matches in order.
    pub fn iter(&self) -> std::slice::Iter<'_, MatchResult> {
        self.0.iter()
    }

    /// Returns the matches as a slice.
    pub fn matches(&self) -> &[MatchResult] {
        &self.0
    }
}

impl From<Vec<MatchResult>> for MatchReport {
    fn from(matches: Vec<MatchResult>) -> Self {
        Self(matches)
    }
}

impl FromIterator<MatchResult> for MatchReport {
    fn from_iter<I: IntoIterator<Item = MatchResult>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for MatchReport {
    type Item = MatchResult;
    type IntoIter = std::vec::IntoIter<MatchResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a MatchReport {
    type Item = &'a MatchResult;
    type IntoIter = std::slice::Iter<'a, MatchResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
