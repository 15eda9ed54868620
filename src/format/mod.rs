//! Format detection contracts and parsed-value types.
//!
//! # Scope
//! This module defines the public contract for format plug-ins: the
//! descriptor trait, the probe handed to detectors, byte sources that can be
//! re-opened for full parses, and the tagged union of parsed payloads.
//!
//! # Design Notes
//! - Detectors see the shared head window for signature checks; a full parse
//!   re-opens the source through [`ByteSource`] so the hashing cursor is
//!   never disturbed.
//! - `ParsedValue` is a closed union: the core routes on it without
//!   downcasting, and container semantics re-enter the descent engine.

pub mod gzip;
pub mod png;
pub mod registry;
pub mod tar;
pub mod text;
pub mod xml;
pub mod zip;

pub use registry::{FormatId, FormatRegistry};

use std::io::{self, Read, Seek, SeekFrom};
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::FormatError;

/// Re-openable byte source backing a data object.
///
/// Root files are paths; container members small enough to buffer are
/// in-memory slices. Opening never mutates shared state, so independent
/// readers can coexist.
#[derive(Clone, Debug)]
pub enum ByteSource {
    Path(Arc<PathBuf>),
    Memory(Arc<[u8]>),
}

impl ByteSource {
    pub fn from_path(path: PathBuf) -> Self {
        Self::Path(Arc::new(path))
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self::Memory(bytes.into())
    }

    /// Open a fresh independent reader over the full content.
    pub fn open(&self) -> io::Result<SourceReader> {
        match self {
            Self::Path(p) => Ok(SourceReader::File(std::fs::File::open(p.as_path())?)),
            Self::Memory(m) => Ok(SourceReader::Memory(io::Cursor::new(Arc::clone(m)))),
        }
    }

    /// Content length, when cheaply known.
    pub fn len_hint(&self) -> Option<u64> {
        match self {
            Self::Path(p) => std::fs::metadata(p.as_path()).ok().map(|m| m.len()),
            Self::Memory(m) => Some(m.len() as u64),
        }
    }

    /// Buffered bytes for in-memory sources (used for materialization and
    /// inline literals).
    pub fn bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Path(_) => None,
            Self::Memory(m) => Some(m),
        }
    }
}

/// Reader handle produced by [`ByteSource::open`].
pub enum SourceReader {
    File(std::fs::File),
    Memory(io::Cursor<Arc<[u8]>>),
}

impl Read for SourceReader {
    #[inline]
    fn read(&mut self, dst: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::File(f) => f.read(dst),
            Self::Memory(c) => c.read(dst),
        }
    }
}

impl Seek for SourceReader {
    #[inline]
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self {
            Self::File(f) => f.seek(pos),
            Self::Memory(c) => c.seek(pos),
        }
    }
}

/// Everything a detector may look at during matching.
pub struct FormatProbe<'a> {
    /// Shared head window (up to the configured cap).
    pub header: &'a [u8],
    /// The header is shorter than requested because the source ended.
    pub is_short: bool,
    /// Binary classification of the head window.
    pub is_binary: bool,
    /// Re-openable source for full-document parses.
    pub source: &'a ByteSource,
    /// Total length, when known.
    pub len_hint: Option<u64>,
    /// Cap on bytes a full parse may read.
    pub max_parse_bytes: u64,
}

/// Context shared across one match attempt.
///
/// Immutable; descents derive new values instead of mutating.
#[derive(Clone, Debug, Default)]
pub struct MatchContext {
    /// Accumulated virtual path of the entity being matched.
    pub path: String,
    /// Name of the format this data was extracted from, if nested.
    pub parent_format: Option<&'static str>,
    /// Namespaces harvested so far (XML descents).
    pub namespaces: Vec<(String, String)>,
}

impl MatchContext {
    pub fn root(path: impl Into<String>) -> Self {
        Self { path: path.into(), parent_format: None, namespaces: Vec::new() }
    }

    /// Derive a context for a nested entity.
    pub fn descend(&self, segment: &str, parent_format: Option<&'static str>) -> Self {
        let mut path = String::with_capacity(self.path.len() + segment.len() + 2);
        path.push_str(&self.path);
        if !path.is_empty() {
            path.push_str("::");
        }
        path.push_str(segment);
        Self {
            path,
            parent_format: parent_format.or(self.parent_format),
            namespaces: self.namespaces.clone(),
        }
    }
}

/// Container payload kinds the descent engine understands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContainerKind {
    Zip,
    Tar,
    Gzip,
}

impl ContainerKind {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Zip => "zip",
            Self::Tar => "tar",
            Self::Gzip => "gzip",
        }
    }
}

/// Result of a successful XML parse.
#[derive(Clone, Debug, Default)]
pub struct XmlDocumentInfo {
    pub version: Option<String>,
    pub encoding: Option<String>,
    pub standalone: Option<bool>,
    pub root_local: String,
    pub root_namespace: Option<String>,
    pub doctype_public: Option<String>,
    pub doctype_system: Option<String>,
    /// Prefix bindings declared on the root element.
    pub namespaces: Vec<(String, String)>,
}

/// Result of a successful raster-image header parse.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    pub bit_depth: u8,
    pub color_type: u8,
}

/// Result of a successful plain-text classification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextInfo {
    pub charset: &'static str,
}

/// Parsed payload of a format match.
#[derive(Clone, Debug)]
pub enum ParsedValue {
    Container(ContainerKind),
    Xml(XmlDocumentInfo),
    Image(ImageInfo),
    Text(TextInfo),
}

/// A successful detector invocation: descriptor plus parsed payload.
///
/// At most one match per format per data object; an object may carry several
/// matches for different formats.
#[derive(Debug)]
pub struct FormatMatch {
    pub id: FormatId,
    pub value: ParsedValue,
}

/// Format descriptor and detector.
///
/// `check_header` must be cheap and allocation-free: it gates whether the
/// (possibly expensive) `parse` runs at all. `parse` returning `Ok(None)`
/// means "signature matched but this is not my format" and is not an error.
pub trait FileFormat: Send + Sync {
    /// Stable short name ("zip", "png", ...), also used as URI fragments.
    fn name(&self) -> &'static str;

    /// Leading byte signature, if the format has one at offset zero.
    fn signature(&self) -> Option<&'static [u8]> {
        None
    }

    /// Canonical media type.
    fn media_type(&self) -> &'static str;

    /// Conventional file extension, without the dot.
    fn extension(&self) -> &'static str;

    /// True when the format only occurs in binary data. Text-allowed formats
    /// are only tried on data classified as text.
    fn binary_required(&self) -> bool {
        true
    }

    /// RDF class for nodes of this format, when one is more specific than
    /// the generic format class.
    fn class_iri(&self) -> Option<&'static str> {
        None
    }

    /// Veto check over the head window.
    fn check_header(&self, header: &[u8], is_short: bool, is_binary: bool) -> bool;

    /// Full parse. `Ok(None)` = not this format, `Err` = claimed but corrupt.
    fn parse(
        &self,
        probe: &FormatProbe<'_>,
        ctx: &MatchContext,
    ) -> Result<Option<ParsedValue>, FormatError>;
}
