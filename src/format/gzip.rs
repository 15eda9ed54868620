//! gzip detection and member access.
//!
//! # Invariants
//! - Member decompression is sequential; no seeking.
//! - The optional FNAME header field is parsed from a bounded prefix and
//!   treated as untrusted display data.
//!
//! # Design Notes
//! - `flate2::read::GzDecoder` performs the actual inflation; this module
//!   only sniffs the header and extracts the stored name.

use std::io::Read;

use flate2::read::GzDecoder;

use crate::error::FormatError;
use crate::format::{
    ByteSource, ContainerKind, FileFormat, FormatProbe, MatchContext, ParsedValue, SourceReader,
};

/// gzip magic bytes (RFC 1952).
pub const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const GZIP_CM_DEFLATE: u8 = 8;
const GZIP_FLAG_FEXTRA: u8 = 0x04;
const GZIP_FLAG_FNAME: u8 = 0x08;

#[inline(always)]
pub fn is_gzip_magic(header: &[u8]) -> bool {
    header.len() >= 2 && header[0] == GZIP_MAGIC[0] && header[1] == GZIP_MAGIC[1]
}

/// Best-effort parse of the gzip FNAME field from a bounded prefix.
///
/// Returns `None` when the name is absent, truncated, or longer than
/// `max_name_len`.
pub fn parse_member_name(prefix: &[u8], max_name_len: usize) -> Option<String> {
    if prefix.len() < 10 || !is_gzip_magic(prefix) || prefix[2] != GZIP_CM_DEFLATE {
        return None;
    }

    let flg = prefix[3];
    let mut idx = 10usize;

    if (flg & GZIP_FLAG_FEXTRA) != 0 {
        if idx + 2 > prefix.len() {
            return None;
        }
        let xlen = u16::from_le_bytes([prefix[idx], prefix[idx + 1]]) as usize;
        idx += 2;
        if idx + xlen > prefix.len() {
            return None;
        }
        idx += xlen;
    }

    if (flg & GZIP_FLAG_FNAME) == 0 {
        return None;
    }

    let mut end = idx;
    while end < prefix.len() && prefix[end] != 0 {
        if end - idx >= max_name_len {
            return None;
        }
        end += 1;
    }
    if end >= prefix.len() || end == idx {
        return None;
    }
    Some(String::from_utf8_lossy(&prefix[idx..end]).into_owned())
}

/// Open the decompressed member stream of a gzip source.
pub fn open_member(source: &ByteSource) -> Result<GzDecoder<SourceReader>, FormatError> {
    let reader = source.open()?;
    Ok(GzDecoder::new(reader))
}

/// gzip container format descriptor.
pub struct GzipFormat;

impl FileFormat for GzipFormat {
    fn name(&self) -> &'static str {
        "gzip"
    }

    fn signature(&self) -> Option<&'static [u8]> {
        Some(&GZIP_MAGIC)
    }

    fn media_type(&self) -> &'static str {
        "application/gzip"
    }

    fn extension(&self) -> &'static str {
        "gz"
    }

    fn check_header(&self, header: &[u8], _is_short: bool, _is_binary: bool) -> bool {
        if !is_gzip_magic(header) {
            return false;
        }
        // Compression methods other than deflate never occur in practice;
        // reject them so the improvised-format path can describe the data.
        header.len() < 3 || header[2] == GZIP_CM_DEFLATE
    }

    fn parse(
        &self,
        probe: &FormatProbe<'_>,
        _ctx: &MatchContext,
    ) -> Result<Option<ParsedValue>, FormatError> {
        if probe.header.len() < 10 {
            return Err(FormatError::Corrupt {
                format: "gzip",
                detail: "header shorter than 10 bytes".to_string(),
            });
        }
        // A quick probe read confirms the deflate stream actually starts.
        let mut dec = open_member(probe.source)?;
        let mut buf = [0u8; 1];
        if let Err(err) = dec.read(&mut buf) {
            return Err(FormatError::Corrupt { format: "gzip", detail: err.to_string() });
        }
        Ok(Some(ParsedValue::Container(ContainerKind::Gzip)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniff_gzip_magic() {
        assert!(is_gzip_magic(&[0x1f, 0x8b, 0x08, 0x00]));
        assert!(!is_gzip_magic(&[0x1f]));
        assert!(!is_gzip_magic(&[0x50, 0x4b]));
    }

    #[test]
    fn member_name_parses_fname() {
        // magic, deflate, FNAME flag, mtime 0, xfl 0, os 3, "hello.txt\0"
        let mut hdr = vec![0x1f, 0x8b, 0x08, 0x08, 0, 0, 0, 0, 0, 3];
        hdr.extend_from_slice(b"hello.txt\0");
        assert_eq!(parse_member_name(&hdr, 256).as_deref(), Some("hello.txt"));
        assert_eq!(parse_member_name(&hdr, 4), None);
        assert_eq!(parse_member_name(&hdr[..12], 256), None); // truncated
    }

    #[test]
    fn member_name_absent_without_flag() {
        let hdr = [0x1f, 0x8b, 0x08, 0x00, 0, 0, 0, 0, 0, 3];
        assert_eq!(parse_member_name(&hdr, 256), None);
    }
}
