//! Line assembly across output chunks.
//!
//! Pseudo-terminal reads split output at arbitrary byte offsets, including
//! in the middle of a line or of a UTF-8 sequence. [`LineBuffer`] turns a
//! stream of chunks into complete lines.
//!
//! Invariant: between calls the buffer holds only the trailing fragment
//! after the last `\n` (possibly empty), never a complete line.

/// Separator between lines.
const LINE_SEPARATOR: char = '\n';

/// Accumulates chunks and yields complete lines.
#[derive(Debug, Default, Clone)]
pub struct LineBuffer {
    /// Text after the last separator seen
    leftover: String,
    /// Bytes of a UTF-8 sequence cut off at the end of the previous chunk
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one chunk and returns every line it completes, in order.
    ///
    /// Returned lines exclude the separator and a trailing `\r`.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let text = self.decode(chunk);
        if text.is_empty() {
            return Vec::new();
        }

        self.leftover.push_str(&text);
        let buffered = std::mem::take(&mut self.leftover);

        let mut segments: Vec<&str> = buffered.split(LINE_SEPARATOR).collect();
        // split() always yields at least one segment; the last is incomplete.
        if let Some(tail) = segments.pop() {
            self.leftover = tail.to_string();
        }

        segments
            .into_iter()
            .map(|line| line.strip_suffix('\r').unwrap_or(line).to_string())
            .collect()
    }

    /// Returns the incomplete trailing fragment.
    pub fn leftover(&self) -> &str {
        &self.leftover
    }

    /// Decodes `chunk` as UTF-8, carrying an incomplete trailing sequence
    /// over to the next call. Invalid sequences become U+FFFD.
    fn decode(&mut self, chunk: &[u8]) -> String {
        let mut bytes = std::mem::take(&mut self.pending);
        bytes.extend_from_slice(chunk);

        let mut out = String::with_capacity(bytes.len());
        let mut rest: &[u8] = &bytes;

        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    break;
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    // valid_up_to() marks a verified UTF-8 boundary.
                    out.push_str(&String::from_utf8_lossy(valid));

                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = after.get(len..).unwrap_or_default();
                        }
                        None => {
                            self.pending = after.to_vec();
                            break;
                        }
                    }
                }
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines_of(chunks: &[&[u8]]) -> (Vec<String>, String) {
        let mut buffer = LineBuffer::new();
        let mut lines = Vec::new();
        for chunk in chunks {
            lines.extend(buffer.push(chunk));
        }
        (lines, buffer.leftover().to_string())
    }

    #[test]
    fn test_complete_lines_and_leftover() {
        let (lines, leftover) = lines_of(&[b"one\ntwo\nthr"]);
        assert_eq!(lines, vec!["one", "two"]);
        assert_eq!(leftover, "thr");
    }

    #[test]
    fn test_line_split_across_chunks() {
        let (lines, leftover) = lines_of(&[b"hel", b"lo wor", b"ld\n"]);
        assert_eq!(lines, vec!["hello world"]);
        assert_eq!(leftover, "");
    }

    #[test]
    fn test_trailing_separator_leaves_empty_fragment() {
        let mut buffer = LineBuffer::new();
        assert_eq!(buffer.push(b"a\n"), vec!["a"]);
        assert_eq!(buffer.leftover(), "");
        assert!(!buffer.leftover().contains('\n'));
    }

    #[test]
    fn test_empty_lines_are_kept() {
        let (lines, _) = lines_of(&[b"\n\nx\n"]);
        assert_eq!(lines, vec!["", "", "x"]);
    }

    #[test]
    fn test_crlf_split_between_chunks() {
        let (lines, _) = lines_of(&[b"prompt\r", b"\nnext\r\n"]);
        assert_eq!(lines, vec!["prompt", "next"]);
    }

    #[test]
    fn test_utf8_sequence_split_across_chunks() {
        let bytes = "caf\u{e9} \u{1f600}\n".as_bytes();
        // Cut inside both the two-byte and the four-byte sequence.
        let (lines, _) = lines_of(&[&bytes[..4], &bytes[4..7], &bytes[7..]]);
        assert_eq!(lines, vec!["caf\u{e9} \u{1f600}"]);
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let (lines, _) = lines_of(&[b"bad \xff byte\n"]);
        assert_eq!(lines, vec!["bad \u{fffd} byte"]);
    }

    #[test]
    fn test_every_chunking_yields_the_same_lines() {
        let stream = b"first line\r\nsecond\n\nthird caf\xc3\xa9\nunterminated";
        let (expected, expected_leftover) = lines_of(&[stream]);

        for cut in 0..=stream.len() {
            let (lines, leftover) = lines_of(&[&stream[..cut], &stream[cut..]]);
            assert_eq!(lines, expected, "cut at {cut}");
            assert_eq!(leftover, expected_leftover, "cut at {cut}");
        }

        let single_bytes: Vec<&[u8]> = stream.chunks(1).collect();
        let (lines, leftover) = lines_of(&single_bytes);
        assert_eq!(lines, expected);
        assert_eq!(leftover, expected_leftover);
    }
}
