//! Plain-text format and charset classification.
//!
//! Runs last in the candidate order: it has no signature and accepts any
//! data already classified as text.

use crate::error::FormatError;
use crate::format::{FileFormat, FormatProbe, MatchContext, ParsedValue, TextInfo};

/// Charset guess over a head window.
///
/// A UTF-8 decode error inside the final three bytes of a truncated window
/// is ignored: it is almost always a multi-byte sequence cut by the window
/// boundary, not invalid data.
pub fn detect_charset(head: &[u8], window_truncated: bool) -> &'static str {
    if head.iter().all(u8::is_ascii) {
        return "US-ASCII";
    }
    match std::str::from_utf8(head) {
        Ok(_) => "UTF-8",
        Err(err) if window_truncated && err.valid_up_to() + 3 >= head.len() => "UTF-8",
        Err(_) => "ISO-8859-1",
    }
}

/// Fallback text format descriptor.
pub struct TextFormat;

impl FileFormat for TextFormat {
    fn name(&self) -> &'static str {
        "text"
    }

    fn media_type(&self) -> &'static str {
        "text/plain"
    }

    fn extension(&self) -> &'static str {
        "txt"
    }

    fn binary_required(&self) -> bool {
        false
    }

    fn check_header(&self, header: &[u8], _is_short: bool, is_binary: bool) -> bool {
        !is_binary && !header.is_empty()
    }

    fn parse(
        &self,
        probe: &FormatProbe<'_>,
        _ctx: &MatchContext,
    ) -> Result<Option<ParsedValue>, FormatError> {
        let window_truncated = !probe.is_short
            && probe.len_hint.map_or(true, |len| len > probe.header.len() as u64);
        let charset = detect_charset(probe.header, window_truncated);
        Ok(Some(ParsedValue::Text(TextInfo { charset })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_utf8_latin1() {
        assert_eq!(detect_charset(b"plain ascii", false), "US-ASCII");
        assert_eq!(detect_charset("naïve".as_bytes(), false), "UTF-8");
        assert_eq!(detect_charset(&[b'a', 0xE9, b'b'], false), "ISO-8859-1");
    }

    #[test]
    fn split_multibyte_at_window_edge_still_utf8() {
        let mut bytes = "caf".as_bytes().to_vec();
        bytes.push(0xC3); // first half of 'é'
        assert_eq!(detect_charset(&bytes, true), "UTF-8");
        assert_eq!(detect_charset(&bytes, false), "ISO-8859-1");
    }
}
