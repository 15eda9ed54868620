//! Hash algorithm descriptors, digest encodings, and content-addressed URIs.
//!
//! # Invariants
//! - A digest's URI is a pure function of (algorithm, digest bytes): equal
//!   content always yields equal identifiers across independent runs.
//! - Encoders never fail; every byte sequence has a canonical encoding.
//!
//! # Design Notes
//! - Sinks are an explicit enum, not trait objects: the algorithm set is
//!   closed and the dispatch cost per chunk matters on the hot path.
//! - base32/base58/decimal encoders are small and local; hex is hand-rolled
//!   the same way the rest of the codebase formats locators.

pub mod stream;

pub use stream::{Digests, HashStream};

use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use md5::Md5;
use sha1::Sha1;
use sha2::{Digest as _, Sha256};

/// Identifies a supported hash algorithm.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithmId {
    Md5 = 0,
    Sha1 = 1,
    Sha256 = 2,
    Blake3 = 3,
}

/// How a digest is rendered into its URI.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DigestFormat {
    HexLower,
    HexUpper,
    Base32,
    Base58,
    Base64Url,
    Decimal,
}

impl HashAlgorithmId {
    /// Short lowercase name used in logs and configuration.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Md5 => "md5",
            Self::Sha1 => "sha1",
            Self::Sha256 => "sha256",
            Self::Blake3 => "blake3",
        }
    }

    /// Digest length in bytes.
    pub const fn digest_len(self) -> usize {
        match self {
            Self::Md5 => 16,
            Self::Sha1 => 20,
            Self::Sha256 | Self::Blake3 => 32,
        }
    }

    /// URI prefix for the content-addressed identifier.
    pub const fn uri_prefix(self) -> &'static str {
        match self {
            Self::Md5 => "urn:md5:",
            Self::Sha1 => "urn:sha1:",
            Self::Sha256 => "ni:///sha-256;",
            Self::Blake3 => "urn:blake3:",
        }
    }

    /// Encoding applied to the digest inside the content-addressed URI.
    pub const fn digest_format(self) -> DigestFormat {
        match self {
            Self::Md5 => DigestFormat::HexUpper,
            Self::Sha1 | Self::Blake3 => DigestFormat::Base32,
            Self::Sha256 => DigestFormat::Base64Url,
        }
    }

    /// IRI identifying the algorithm itself in the output graph.
    pub const fn algorithm_iri(self) -> &'static str {
        match self {
            Self::Md5 => "http://www.w3.org/2001/04/xmldsig-more#md5",
            Self::Sha1 => "http://www.w3.org/2000/09/xmldsig#sha1",
            Self::Sha256 => "http://www.w3.org/2001/04/xmlenc#sha256",
            Self::Blake3 => "http://descry.dev/vocab#blake3",
        }
    }

    /// Content-addressed URI for a digest under this algorithm.
    pub fn uri_for(self, digest: &[u8]) -> String {
        let mut out = String::with_capacity(self.uri_prefix().len() + digest.len() * 2);
        out.push_str(self.uri_prefix());
        encode_digest_into(self.digest_format(), digest, &mut out);
        out
    }

    /// All supported algorithms in preference order for identity minting.
    pub const fn all() -> [HashAlgorithmId; 4] {
        [Self::Sha256, Self::Blake3, Self::Sha1, Self::Md5]
    }
}

impl fmt::Display for HashAlgorithmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error for unrecognized algorithm names.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnknownAlgorithm(pub String);

impl fmt::Display for UnknownAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown hash algorithm: {}", self.0)
    }
}

impl std::error::Error for UnknownAlgorithm {}

impl FromStr for HashAlgorithmId {
    type Err = UnknownAlgorithm;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "md5" => Ok(Self::Md5),
            "sha1" | "sha-1" => Ok(Self::Sha1),
            "sha256" | "sha-256" => Ok(Self::Sha256),
            "blake3" => Ok(Self::Blake3),
            other => Err(UnknownAlgorithm(other.to_string())),
        }
    }
}

/// Encode a digest with the given format.
pub fn encode_digest(format: DigestFormat, digest: &[u8]) -> String {
    let mut out = String::with_capacity(digest.len() * 2);
    encode_digest_into(format, digest, &mut out);
    out
}

fn encode_digest_into(format: DigestFormat, digest: &[u8], out: &mut String) {
    match format {
        DigestFormat::HexLower => encode_hex(digest, b"0123456789abcdef", out),
        DigestFormat::HexUpper => encode_hex(digest, b"0123456789ABCDEF", out),
        DigestFormat::Base32 => encode_base32(digest, out),
        DigestFormat::Base58 => encode_base58(digest, out),
        DigestFormat::Base64Url => out.push_str(&URL_SAFE_NO_PAD.encode(digest)),
        DigestFormat::Decimal => encode_decimal(digest, out),
    }
}

fn encode_hex(bytes: &[u8], alphabet: &[u8; 16], out: &mut String) {
    for &b in bytes {
        out.push(alphabet[(b >> 4) as usize] as char);
        out.push(alphabet[(b & 0xF) as usize] as char);
    }
}

// RFC 4648 base32, upper-case, no padding.
fn encode_base32(bytes: &[u8], out: &mut String) {
    const ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";
    let mut acc: u32 = 0;
    let mut bits: u32 = 0;
    for &b in bytes {
        acc = (acc << 8) | b as u32;
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            out.push(ALPHABET[((acc >> bits) & 0x1F) as usize] as char);
        }
    }
    if bits > 0 {
        out.push(ALPHABET[((acc << (5 - bits)) & 0x1F) as usize] as char);
    }
}

// Bitcoin-alphabet base58; leading zero bytes map to leading '1's.
fn encode_base58(bytes: &[u8], out: &mut String) {
    const ALPHABET: &[u8; 58] =
        b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";
    let zeros = bytes.iter().take_while(|&&b| b == 0).count();
    let mut num: Vec<u8> = bytes[zeros..].to_vec();
    let mut digits: Vec<u8> = Vec::with_capacity(bytes.len() * 2);
    while !num.is_empty() {
        let mut rem: u32 = 0;
        let mut next = Vec::with_capacity(num.len());
        for &b in &num {
            let cur = (rem << 8) | b as u32;
            let q = cur / 58;
            rem = cur % 58;
            if !next.is_empty() || q != 0 {
                next.push(q as u8);
            }
        }
        digits.push(rem as u8);
        num = next;
    }
    for _ in 0..zeros {
        out.push('1');
    }
    for &d in digits.iter().rev() {
        out.push(ALPHABET[d as usize] as char);
    }
}

// Big-endian bytes rendered as an unsigned decimal integer.
fn encode_decimal(bytes: &[u8], out: &mut String) {
    let mut num: Vec<u8> = bytes.iter().copied().skip_while(|&b| b == 0).collect();
    if num.is_empty() {
        out.push('0');
        return;
    }
    let mut digits: Vec<u8> = Vec::with_capacity(bytes.len() * 3);
    while !num.is_empty() {
        let mut rem: u32 = 0;
        let mut next = Vec::with_capacity(num.len());
        for &b in &num {
            let cur = (rem << 8) | b as u32;
            let q = cur / 10;
            rem = cur % 10;
            if !next.is_empty() || q != 0 {
                next.push(q as u8);
            }
        }
        digits.push(b'0' + rem as u8);
        num = next;
    }
    for &d in digits.iter().rev() {
        out.push(d as char);
    }
}

/// One running hash computation attached to a stream.
pub struct HashSink {
    id: HashAlgorithmId,
    state: SinkState,
}

enum SinkState {
    Md5(Md5),
    Sha1(Sha1),
    Sha256(Sha256),
    Blake3(Box<blake3::Hasher>),
}

impl HashSink {
    /// Fresh sink for the given algorithm.
    pub fn new(id: HashAlgorithmId) -> Self {
        let state = match id {
            HashAlgorithmId::Md5 => SinkState::Md5(Md5::new()),
            HashAlgorithmId::Sha1 => SinkState::Sha1(Sha1::new()),
            HashAlgorithmId::Sha256 => SinkState::Sha256(Sha256::new()),
            HashAlgorithmId::Blake3 => SinkState::Blake3(Box::new(blake3::Hasher::new())),
        };
        Self { id, state }
    }

    /// Algorithm this sink computes.
    #[inline]
    pub fn id(&self) -> HashAlgorithmId {
        self.id
    }

    /// Feed a chunk of bytes.
    #[inline]
    pub fn update(&mut self, bytes: &[u8]) {
        match &mut self.state {
            SinkState::Md5(h) => h.update(bytes),
            SinkState::Sha1(h) => h.update(bytes),
            SinkState::Sha256(h) => h.update(bytes),
            SinkState::Blake3(h) => {
                h.update(bytes);
            }
        }
    }

    /// Consume the sink and return the digest bytes.
    pub fn finish(self) -> Box<[u8]> {
        match self.state {
            SinkState::Md5(h) => h.finalize().as_slice().into(),
            SinkState::Sha1(h) => h.finalize().as_slice().into(),
            SinkState::Sha256(h) => h.finalize().as_slice().into(),
            SinkState::Blake3(h) => h.finalize().as_bytes().as_slice().into(),
        }
    }
}

/// Compute a single digest over a byte slice (convenience for tests and
/// improvised identities).
pub fn digest_bytes(id: HashAlgorithmId, bytes: &[u8]) -> Box<[u8]> {
    let mut sink = HashSink::new(id);
    sink.update(bytes);
    sink.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_upper_and_lower() {
        assert_eq!(encode_digest(DigestFormat::HexLower, &[0x76, 0x4e]), "764e");
        assert_eq!(encode_digest(DigestFormat::HexUpper, &[0x76, 0x4e]), "764E");
    }

    #[test]
    fn base32_rfc4648_vectors() {
        assert_eq!(encode_digest(DigestFormat::Base32, b""), "");
        assert_eq!(encode_digest(DigestFormat::Base32, b"f"), "MY");
        assert_eq!(encode_digest(DigestFormat::Base32, b"fo"), "MZXQ");
        assert_eq!(encode_digest(DigestFormat::Base32, b"foobar"), "MZXW6YTBOI");
    }

    #[test]
    fn base58_vectors() {
        assert_eq!(encode_digest(DigestFormat::Base58, b""), "");
        assert_eq!(encode_digest(DigestFormat::Base58, &[0x61]), "2g");
        assert_eq!(encode_digest(DigestFormat::Base58, &[0x62, 0x62, 0x62]), "a3gV");
        assert_eq!(encode_digest(DigestFormat::Base58, &[0x00, 0x61]), "12g");
    }

    #[test]
    fn decimal_vectors() {
        assert_eq!(encode_digest(DigestFormat::Decimal, &[]), "0");
        assert_eq!(encode_digest(DigestFormat::Decimal, &[0x00, 0x00]), "0");
        assert_eq!(encode_digest(DigestFormat::Decimal, &[0x01, 0x00]), "256");
        assert_eq!(encode_digest(DigestFormat::Decimal, &[0xFF]), "255");
    }

    #[test]
    fn md5_digest_and_uri() {
        let digest = digest_bytes(HashAlgorithmId::Md5, b"hi\n");
        assert_eq!(
            encode_digest(DigestFormat::HexLower, &digest),
            "764efa883dda1e11db47671c4a3bbd9e"
        );
        assert_eq!(
            HashAlgorithmId::Md5.uri_for(&digest),
            "urn:md5:764EFA883DDA1E11DB47671C4A3BBD9E"
        );
    }

    #[test]
    fn sha256_empty_digest() {
        let digest = digest_bytes(HashAlgorithmId::Sha256, b"");
        assert_eq!(
            encode_digest(DigestFormat::HexLower, &digest),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        let uri = HashAlgorithmId::Sha256.uri_for(&digest);
        assert!(uri.starts_with("ni:///sha-256;"));
        assert!(!uri.contains('='));
    }

    #[test]
    fn digest_lengths_match_descriptors() {
        for id in HashAlgorithmId::all() {
            assert_eq!(digest_bytes(id, b"x").len(), id.digest_len());
        }
    }

    #[test]
    fn algorithm_names_round_trip() {
        for id in HashAlgorithmId::all() {
            assert_eq!(id.name().parse::<HashAlgorithmId>().unwrap(), id);
        }
        assert!("crc32".parse::<HashAlgorithmId>().is_err());
    }
}
