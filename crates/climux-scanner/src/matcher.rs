//! Pattern matching over complete lines.

use climux_core::MatchResult;
use regex::Regex;

/// Compiled auth-code pattern.
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    regex: Regex,
}

impl PatternMatcher {
    /// Compiles `pattern`.
    ///
    /// # Errors
    ///
    /// Returns the regex error if the pattern does not compile.
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            regex: Regex::new(pattern)?,
        })
    }

    /// Tests one line; returns the first match with all capture slots.
    pub fn match_line(&self, line: &str) -> Option<MatchResult> {
        let captures = self.regex.captures(line)?;
        let slots = captures
            .iter()
            .map(|slot| slot.map(|m| m.as_str().to_string()))
            .collect();
        Some(MatchResult::new(slots))
    }

    /// Returns the pattern source.
    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}
