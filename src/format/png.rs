//! PNG detection and IHDR metadata.
//!
//! The whole parse lives in the head window: signature (8 bytes) plus the
//! IHDR chunk (8-byte chunk header + 13-byte payload) always open the file.

use crate::error::FormatError;
use crate::format::{FileFormat, FormatProbe, ImageInfo, MatchContext, ParsedValue};

pub const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

const IHDR_END: usize = 8 + 8 + 13;

/// PNG raster image format descriptor.
pub struct PngFormat;

impl FileFormat for PngFormat {
    fn name(&self) -> &'static str {
        "png"
    }

    fn signature(&self) -> Option<&'static [u8]> {
        Some(&PNG_SIGNATURE)
    }

    fn media_type(&self) -> &'static str {
        "image/png"
    }

    fn extension(&self) -> &'static str {
        "png"
    }

    fn class_iri(&self) -> Option<&'static str> {
        Some(crate::rdf::vocab::nfo::RASTER_IMAGE)
    }

    fn check_header(&self, header: &[u8], _is_short: bool, _is_binary: bool) -> bool {
        header.starts_with(&PNG_SIGNATURE)
    }

    fn parse(
        &self,
        probe: &FormatProbe<'_>,
        _ctx: &MatchContext,
    ) -> Result<Option<ParsedValue>, FormatError> {
        let h = probe.header;
        if h.len() < IHDR_END {
            return Err(FormatError::Corrupt {
                format: "png",
                detail: "file ends before IHDR".to_string(),
            });
        }
        let chunk_len = u32::from_be_bytes([h[8], h[9], h[10], h[11]]);
        if chunk_len != 13 || &h[12..16] != b"IHDR" {
            return Err(FormatError::Corrupt {
                format: "png",
                detail: "first chunk is not a 13-byte IHDR".to_string(),
            });
        }
        let width = u32::from_be_bytes([h[16], h[17], h[18], h[19]]);
        let height = u32::from_be_bytes([h[20], h[21], h[22], h[23]]);
        let bit_depth = h[24];
        let color_type = h[25];
        if width == 0 || height == 0 {
            return Err(FormatError::Corrupt {
                format: "png",
                detail: format!("zero dimension {width}x{height}"),
            });
        }
        Ok(Some(ParsedValue::Image(ImageInfo { width, height, bit_depth, color_type })))
    }
}

/// Minimal well-formed PNG bytes for a given size (used by tests and
/// simulations; the IDAT payload is not a real compressed image).
pub fn synthesize_png(width: u32, height: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity(64);
    out.extend_from_slice(&PNG_SIGNATURE);
    out.extend_from_slice(&13u32.to_be_bytes());
    out.extend_from_slice(b"IHDR");
    out.extend_from_slice(&width.to_be_bytes());
    out.extend_from_slice(&height.to_be_bytes());
    out.extend_from_slice(&[8, 6, 0, 0, 0]); // depth 8, RGBA
    out.extend_from_slice(&[0, 0, 0, 0]); // crc (unchecked)
    out.extend_from_slice(&0u32.to_be_bytes());
    out.extend_from_slice(b"IEND");
    out.extend_from_slice(&[0, 0, 0, 0]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::ByteSource;

    fn probe<'a>(header: &'a [u8], source: &'a ByteSource) -> FormatProbe<'a> {
        FormatProbe {
            header,
            is_short: false,
            is_binary: true,
            source,
            len_hint: Some(header.len() as u64),
            max_parse_bytes: 1 << 20,
        }
    }

    #[test]
    fn parses_dimensions() {
        let bytes = synthesize_png(640, 480);
        let source = ByteSource::from_bytes(bytes.clone());
        let ctx = MatchContext::default();
        let parsed = PngFormat.parse(&probe(&bytes, &source), &ctx).unwrap().unwrap();
        match parsed {
            ParsedValue::Image(info) => {
                assert_eq!(info.width, 640);
                assert_eq!(info.height, 480);
                assert_eq!(info.bit_depth, 8);
            }
            other => panic!("expected image, got {other:?}"),
        }
    }

    #[test]
    fn zero_dimension_is_corrupt() {
        let bytes = synthesize_png(0, 480);
        let source = ByteSource::from_bytes(bytes.clone());
        let ctx = MatchContext::default();
        assert!(matches!(
            PngFormat.parse(&probe(&bytes, &source), &ctx),
            Err(FormatError::Corrupt { .. })
        ));
    }

    #[test]
    fn truncated_signature_rejected_by_header_check() {
        assert!(!PngFormat.check_header(&PNG_SIGNATURE[..4], true, true));
        assert!(PngFormat.check_header(&synthesize_png(1, 1), false, true));
    }
}
