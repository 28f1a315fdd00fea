//! Chunk-level scanning: line assembly plus matching, batched per chunk.

use climux_core::MatchReport;

use crate::line_buffer::LineBuffer;
use crate::matcher::PatternMatcher;

/// Scans pseudo-terminal output for the auth-code pattern.
///
/// Each call to [`feed`](Self::feed) corresponds to one read from the
/// pseudo-terminal. Every line completed by that read is tested exactly
/// once, and all resulting matches are returned together.
#[derive(Debug)]
pub struct OutputScanner {
    buffer: LineBuffer,
    matcher: PatternMatcher,
}

impl OutputScanner {
    pub fn new(matcher: PatternMatcher) -> Self {
        Self {
            buffer: LineBuffer::new(),
            matcher,
        }
    }

    /// Feeds one output chunk.
    ///
    /// Returns `None` when the chunk completes no matching line.
    pub fn feed(&mut self, chunk: &[u8]) -> Option<MatchReport> {
        let report: MatchReport = self
            .buffer
            .push(chunk)
            .iter()
            .filter_map(|line| self.matcher.match_line(line))
            .collect();

        if report.is_empty() {
            None
        } else {
            Some(report)
        }
    }

    /// The incomplete trailing fragment held between chunks.
    pub fn leftover(&self) -> &str {
        self.buffer.leftover()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scanner() -> OutputScanner {
        OutputScanner::new(PatternMatcher::new(r"code (\w+)").unwrap())
    }

    #[test]
    fn test_matches_from_one_chunk_form_one_report() {
        let mut s = scanner();
        let report = s.feed(b"code A\nnoise\ncode B\ncode C\n").unwrap();

        let codes: Vec<_> = report.iter().filter_map(|m| m.group(1)).collect();
        assert_eq!(codes, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_chunk_without_matches_yields_nothing() {
        let mut s = scanner();
        assert!(s.feed(b"hello\nworld\n").is_none());
        assert!(s.feed(b"").is_none());
    }

    #[test]
    fn test_incomplete_line_is_not_matched_until_completed() {
        let mut s = scanner();
        assert!(s.feed(b"code XY").is_none());
        assert_eq!(s.leftover(), "code XY");

        let report = s.feed(b"Z\n").unwrap();
        assert_eq!(report.len(), 1);
        assert_eq!(report.matches()[0].group(1), Some("XYZ"));
    }

    #[test]
    fn test_line_is_never_matched_twice() {
        let mut s = scanner();
        let first = s.feed(b"code ONE\n").unwrap();
        assert_eq!(first.len(), 1);
        assert!(s.feed(b"\n").is_none());
        assert!(s.feed(b"other\n").is_none());
    }

    #[test]
    fn test_chunking_does_not_change_matched_lines() {
        let stream: &[u8] = b"code A\r\nx\ncode B trailing\ncode C\npartial code D";
        let collect = |chunks: Vec<&[u8]>| {
            let mut s = scanner();
            chunks
                .into_iter()
                .filter_map(|c| s.feed(c))
                .flat_map(|r| r.into_iter())
                .filter_map(|m| m.full_text().map(String::from))
                .collect::<Vec<_>>()
        };

        let whole = collect(vec![stream]);
        assert_eq!(whole, vec!["code A", "code B", "code C"]);

        for cut in 0..=stream.len() {
            assert_eq!(collect(vec![&stream[..cut], &stream[cut..]]), whole, "cut at {cut}");
        }
        assert_eq!(collect(stream.chunks(3).collect()), whole);
    }
}
