//! zip detection and safe Zip32 member access.
//!
//! # Invariants
//! - All sizes/offsets are untrusted and validated against the source length.
//! - Central directory traversal is sequential and monotonic.
//!
//! # Supported
//! - Zip32 (EOCD + central directory).
//! - Members: stored (method 0) and deflate (method 8).
//! - Encrypted members are surfaced via `ZipEntry::is_encrypted` for the
//!   policy layer to act on.
//!
//! # Not Supported
//! - Zip64 (sentinel 0xFFFF/0xFFFFFFFF fields) and multi-disk archives.

use std::io::{Read, Seek, SeekFrom};

use flate2::read::DeflateDecoder;

use crate::error::FormatError;
use crate::format::{
    ByteSource, ContainerKind, FileFormat, FormatProbe, MatchContext, ParsedValue, SourceReader,
};

/// ZIP signatures are `PK..`: local header 03 04, central directory 01 02,
/// end of central directory 05 06, data descriptor 07 08.
#[inline(always)]
pub fn is_zip_magic(header: &[u8]) -> bool {
    if header.len() < 4 || header[0] != b'P' || header[1] != b'K' {
        return false;
    }
    matches!((header[2], header[3]), (1, 2) | (3, 4) | (5, 6) | (7, 8))
}

const SIG_EOCD: u32 = 0x0605_4b50;
const SIG_CDFH: u32 = 0x0201_4b50;
const SIG_LFH: u32 = 0x0403_4b50;

const EOCD_MIN_LEN: usize = 22;
const EOCD_SEARCH_MAX: usize = 66 * 1024; // 64 KiB comment + header margin
const CDFH_LEN: usize = 46;
const LFH_LEN: usize = 30;

/// Central-directory metadata for one member.
#[derive(Clone, Debug)]
pub struct ZipEntry {
    pub name: String,
    pub flags: u16,
    pub method: u16,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub lfh_offset: u64,
    pub is_dir: bool,
}

impl ZipEntry {
    #[inline(always)]
    pub fn is_encrypted(&self) -> bool {
        (self.flags & 0x0001) != 0
    }

    #[inline(always)]
    pub fn compression_supported(&self) -> bool {
        self.method == 0 || self.method == 8
    }
}

/// Sequential reader over a Zip32 central directory.
pub struct ZipReader {
    reader: SourceReader,
    file_len: u64,
    cd_pos: u64,
    cd_end: u64,
    entries_total: u16,
    entries_seen: u16,
    max_name_len: usize,
}

impl ZipReader {
    /// Open a source and locate its central directory.
    pub fn open(source: &ByteSource, max_name_len: usize) -> Result<Self, FormatError> {
        let mut reader = source.open()?;
        let file_len = reader.seek(SeekFrom::End(0))?;
        if file_len < EOCD_MIN_LEN as u64 {
            return Err(corrupt("file shorter than an end-of-central-directory record"));
        }

        let win_len = (file_len as usize).min(EOCD_SEARCH_MAX);
        let win_off = file_len - win_len as u64;
        reader.seek(SeekFrom::Start(win_off))?;
        let mut win = vec![0u8; win_len];
        read_full(&mut reader, &mut win)?;

        let eocd_rel =
            rfind_sig(&win, SIG_EOCD).ok_or_else(|| corrupt("no end-of-central-directory"))?;
        if eocd_rel + EOCD_MIN_LEN > win.len() {
            return Err(corrupt("truncated end-of-central-directory"));
        }
        let eocd = &win[eocd_rel..];

        let disk_no = le_u16(&eocd[4..6]);
        let cd_disk = le_u16(&eocd[6..8]);
        let entries_disk = le_u16(&eocd[8..10]);
        let entries_total = le_u16(&eocd[10..12]);
        let cd_size = le_u32(&eocd[12..16]);
        let cd_off = le_u32(&eocd[16..20]);

        if disk_no != 0 || cd_disk != 0 || entries_disk != entries_total {
            return Err(FormatError::Unsupported { format: "zip", feature: "multi-disk archive" });
        }
        if entries_total == 0xFFFF || cd_size == 0xFFFF_FFFF || cd_off == 0xFFFF_FFFF {
            return Err(FormatError::Unsupported { format: "zip", feature: "zip64" });
        }

        let cd_pos = cd_off as u64;
        let cd_end = cd_pos
            .checked_add(cd_size as u64)
            .filter(|&end| end <= file_len)
            .ok_or_else(|| corrupt("central directory extends past end of file"))?;

        Ok(Self {
            reader,
            file_len,
            cd_pos,
            cd_end,
            entries_total,
            entries_seen: 0,
            max_name_len,
        })
    }

    /// Advance to the next central-directory entry.
    pub fn next_entry(&mut self) -> Result<Option<ZipEntry>, FormatError> {
        if self.entries_seen >= self.entries_total || self.cd_pos + CDFH_LEN as u64 > self.cd_end {
            return Ok(None);
        }

        self.reader.seek(SeekFrom::Start(self.cd_pos))?;
        let mut hdr = [0u8; CDFH_LEN];
        read_full(&mut self.reader, &mut hdr)?;
        if le_u32(&hdr[0..4]) != SIG_CDFH {
            return Err(corrupt("bad central-directory entry signature"));
        }

        let flags = le_u16(&hdr[8..10]);
        let method = le_u16(&hdr[10..12]);
        let compressed_size = le_u32(&hdr[20..24]) as u64;
        let uncompressed_size = le_u32(&hdr[24..28]) as u64;
        let name_len = le_u16(&hdr[28..30]) as usize;
        let extra_len = le_u16(&hdr[30..32]) as usize;
        let comment_len = le_u16(&hdr[32..34]) as usize;
        let lfh_offset = le_u32(&hdr[42..46]) as u64;

        if lfh_offset >= self.file_len {
            return Err(corrupt("member header offset past end of file"));
        }

        let mut name_bytes = vec![0u8; name_len];
        read_full(&mut self.reader, &mut name_bytes)?;
        let mut name = String::from_utf8_lossy(&name_bytes).into_owned();
        if name.len() > self.max_name_len {
            truncate_on_char_boundary(&mut name, self.max_name_len);
        }
        let is_dir = name.ends_with('/');

        self.cd_pos += (CDFH_LEN + name_len + extra_len + comment_len) as u64;
        self.entries_seen += 1;

        Ok(Some(ZipEntry {
            name,
            flags,
            method,
            compressed_size,
            uncompressed_size,
            lfh_offset,
            is_dir,
        }))
    }

    /// Read a member's decompressed payload into memory, bounded by `cap`.
    pub fn read_entry_bytes(&mut self, entry: &ZipEntry, cap: u64) -> Result<Vec<u8>, FormatError> {
        if entry.uncompressed_size > cap {
            return Err(FormatError::LimitExceeded { format: "zip", limit: cap });
        }
        if entry.is_encrypted() {
            return Err(FormatError::Unsupported { format: "zip", feature: "encrypted member" });
        }
        if !entry.compression_supported() {
            return Err(FormatError::Unsupported { format: "zip", feature: "compression method" });
        }

        // The local header repeats name/extra lengths; trust those for the
        // payload offset, not the central directory's copy.
        self.reader.seek(SeekFrom::Start(entry.lfh_offset))?;
        let mut lfh = [0u8; LFH_LEN];
        read_full(&mut self.reader, &mut lfh)?;
        if le_u32(&lfh[0..4]) != SIG_LFH {
            return Err(corrupt("bad member header signature"));
        }
        let lfh_name_len = le_u16(&lfh[26..28]) as u64;
        let lfh_extra_len = le_u16(&lfh[28..30]) as u64;

        let data_off = entry
            .lfh_offset
            .checked_add(LFH_LEN as u64 + lfh_name_len + lfh_extra_len)
            .filter(|&off| off <= self.file_len)
            .ok_or_else(|| corrupt("member payload offset past end of file"))?;
        if data_off + entry.compressed_size > self.file_len {
            return Err(corrupt("member payload extends past end of file"));
        }

        self.reader.seek(SeekFrom::Start(data_off))?;
        let compressed = (&mut self.reader).take(entry.compressed_size);

        let mut out = Vec::with_capacity(entry.uncompressed_size.min(cap) as usize);
        match entry.method {
            0 => {
                let mut limited = compressed.take(cap + 1);
                limited.read_to_end(&mut out).map_err(FormatError::Io)?;
            }
            8 => {
                let mut dec = DeflateDecoder::new(compressed).take(cap + 1);
                dec.read_to_end(&mut out)
                    .map_err(|err| FormatError::Corrupt { format: "zip", detail: err.to_string() })?;
            }
            _ => unreachable!("compression_supported checked above"),
        }
        if out.len() as u64 > cap {
            return Err(FormatError::LimitExceeded { format: "zip", limit: cap });
        }
        if out.len() as u64 != entry.uncompressed_size {
            return Err(corrupt("member size does not match directory entry"));
        }
        Ok(out)
    }
}

fn corrupt(detail: &str) -> FormatError {
    FormatError::Corrupt { format: "zip", detail: detail.to_string() }
}

fn truncate_on_char_boundary(s: &mut String, max: usize) {
    let mut cut = max;
    while cut > 0 && !s.is_char_boundary(cut) {
        cut -= 1;
    }
    s.truncate(cut);
}

#[inline]
fn le_u16(b: &[u8]) -> u16 {
    u16::from_le_bytes([b[0], b[1]])
}

#[inline]
fn le_u32(b: &[u8]) -> u32 {
    u32::from_le_bytes([b[0], b[1], b[2], b[3]])
}

fn rfind_sig(window: &[u8], sig: u32) -> Option<usize> {
    if window.len() < 4 {
        return None;
    }
    let needle = sig.to_le_bytes();
    (0..=window.len() - 4).rev().find(|&i| window[i..i + 4] == needle)
}

fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<(), FormatError> {
    reader.read_exact(buf).map_err(|err| {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            corrupt("unexpected end of file")
        } else {
            FormatError::Io(err)
        }
    })
}

/// zip container format descriptor.
pub struct ZipFormat;

impl FileFormat for ZipFormat {
    fn name(&self) -> &'static str {
        "zip"
    }

    fn signature(&self) -> Option<&'static [u8]> {
        Some(b"PK")
    }

    fn media_type(&self) -> &'static str {
        "application/zip"
    }

    fn extension(&self) -> &'static str {
        "zip"
    }

    fn check_header(&self, header: &[u8], _is_short: bool, _is_binary: bool) -> bool {
        is_zip_magic(header)
    }

    fn parse(
        &self,
        probe: &FormatProbe<'_>,
        _ctx: &MatchContext,
    ) -> Result<Option<ParsedValue>, FormatError> {
        // Opening validates the central directory; the descent engine
        // re-opens for member iteration.
        ZipReader::open(probe.source, 4096)?;
        Ok(Some(ParsedValue::Container(ContainerKind::Zip)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u16le(v: u16) -> [u8; 2] {
        v.to_le_bytes()
    }
    fn u32le(v: u32) -> [u8; 4] {
        v.to_le_bytes()
    }

    /// Minimal single-entry stored zip, built by hand so the parser is
    /// tested against raw bytes rather than a writer's idea of them.
    fn build_stored_zip(name: &str, data: &[u8]) -> Vec<u8> {
        let mut crc = 0xFFFF_FFFFu32;
        for &b in data {
            crc ^= b as u32;
            for _ in 0..8 {
                crc = if crc & 1 != 0 { (crc >> 1) ^ 0xEDB8_8320 } else { crc >> 1 };
            }
        }
        let crc = !crc;

        let mut out = Vec::new();
        // Local file header.
        out.extend_from_slice(&u32le(SIG_LFH));
        out.extend_from_slice(&u16le(20)); // version needed
        out.extend_from_slice(&u16le(0)); // flags
        out.extend_from_slice(&u16le(0)); // stored
        out.extend_from_slice(&u16le(0)); // mtime
        out.extend_from_slice(&u16le(0)); // mdate
        out.extend_from_slice(&u32le(crc));
        out.extend_from_slice(&u32le(data.len() as u32));
        out.extend_from_slice(&u32le(data.len() as u32));
        out.extend_from_slice(&u16le(name.len() as u16));
        out.extend_from_slice(&u16le(0));
        out.extend_from_slice(name.as_bytes());
        out.extend_from_slice(data);

        let cd_off = out.len() as u32;
        // Central directory entry.
        out.extend_from_slice(&u32le(SIG_CDFH));
        out.extend_from_slice(&u16le(20));
        out.extend_from_slice(&u16le(20));
        out.extend_from_slice(&u16le(0));
        out.extend_from_slice(&u16le(0));
        out.extend_from_slice(&u16le(0));
        out.extend_from_slice(&u16le(0));
        out.extend_from_slice(&u32le(crc));
        out.extend_from_slice(&u32le(data.len() as u32));
        out.extend_from_slice(&u32le(data.len() as u32));
        out.extend_from_slice(&u16le(name.len() as u16));
        out.extend_from_slice(&u16le(0));
        out.extend_from_slice(&u16le(0));
        out.extend_from_slice(&u16le(0));
        out.extend_from_slice(&u16le(0));
        out.extend_from_slice(&u32le(0));
        out.extend_from_slice(&u32le(0)); // lfh offset
        out.extend_from_slice(name.as_bytes());
        let cd_size = out.len() as u32 - cd_off;

        // EOCD.
        out.extend_from_slice(&u32le(SIG_EOCD));
        out.extend_from_slice(&u16le(0));
        out.extend_from_slice(&u16le(0));
        out.extend_from_slice(&u16le(1));
        out.extend_from_slice(&u16le(1));
        out.extend_from_slice(&u32le(cd_size));
        out.extend_from_slice(&u32le(cd_off));
        out.extend_from_slice(&u16le(0));
        out
    }

    #[test]
    fn reads_stored_member() {
        let bytes = build_stored_zip("hello.txt", b"hi");
        let source = ByteSource::from_bytes(bytes);
        let mut reader = ZipReader::open(&source, 256).unwrap();
        let entry = reader.next_entry().unwrap().unwrap();
        assert_eq!(entry.name, "hello.txt");
        assert_eq!(entry.uncompressed_size, 2);
        assert!(!entry.is_dir);
        assert_eq!(reader.read_entry_bytes(&entry, 1024).unwrap(), b"hi");
        assert!(reader.next_entry().unwrap().is_none());
    }

    #[test]
    fn missing_eocd_is_corrupt() {
        let source = ByteSource::from_bytes(b"PK\x03\x04 not really a zip at all......".to_vec());
        assert!(matches!(
            ZipReader::open(&source, 256),
            Err(FormatError::Corrupt { .. })
        ));
    }

    #[test]
    fn oversized_member_is_limit_error() {
        let bytes = build_stored_zip("big.bin", &[9u8; 2048]);
        let source = ByteSource::from_bytes(bytes);
        let mut reader = ZipReader::open(&source, 256).unwrap();
        let entry = reader.next_entry().unwrap().unwrap();
        assert!(matches!(
            reader.read_entry_bytes(&entry, 100),
            Err(FormatError::LimitExceeded { .. })
        ));
    }

    #[test]
    fn encrypted_member_is_unsupported() {
        let mut bytes = build_stored_zip("sec.txt", b"xx");
        // Set the encryption bit in both the local and central headers.
        bytes[6] |= 1;
        let cdfh = bytes
            .windows(4)
            .rposition(|w| w == u32le(SIG_CDFH))
            .unwrap();
        bytes[cdfh + 8] |= 1;
        let source = ByteSource::from_bytes(bytes);
        let mut reader = ZipReader::open(&source, 256).unwrap();
        let entry = reader.next_entry().unwrap().unwrap();
        assert!(entry.is_encrypted());
        assert!(matches!(
            reader.read_entry_bytes(&entry, 1024),
            Err(FormatError::Unsupported { .. })
        ));
    }

    #[test]
    fn zip_magic_variants() {
        assert!(is_zip_magic(b"PK\x03\x04rest"));
        assert!(is_zip_magic(b"PK\x05\x06rest"));
        assert!(!is_zip_magic(b"PK\x09\x09rest"));
        assert!(!is_zip_magic(b"ZM\x03\x04rest"));
    }
}
