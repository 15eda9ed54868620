//! Error types for the extraction pipeline stages.
//!
//! Errors are stage-specific to keep diagnostics precise and avoid a
//! single monolithic error enum that grows unbounded. All enums are
//! `#[non_exhaustive]` to allow adding variants without breaking callers;
//! consumers should include a fallback match arm.
//!
//! # Design Notes
//! - I/O errors preserve their source to keep diagnostics actionable.
//! - A parse failure never aborts a run: it is attached to the entity it
//!   occurred on and the pipeline continues with the remaining analyzers.

use std::fmt;
use std::io;

/// Errors from the hashing stream multiplexer.
#[derive(Debug)]
#[non_exhaustive]
pub enum StreamError {
    /// I/O error while reading the underlying source.
    Io(io::Error),
    /// A consumer tried to rewind past the buffered head window.
    RewindBeyondHead { pos: u64, head_len: usize },
    /// The stream was already finalized; no further reads are possible.
    Finalized,
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "I/O error: {err}"),
            Self::RewindBeyondHead { pos, head_len } => write!(
                f,
                "cannot rewind: consumer at byte {pos}, head window holds {head_len} bytes"
            ),
            Self::Finalized => write!(f, "stream already finalized"),
        }
    }
}

impl std::error::Error for StreamError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for StreamError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

/// Errors from a single format detector's parse attempt.
///
/// These are contained at the data-analyzer boundary: the entity is still
/// described with its hashes and size, and other detectors still run.
#[derive(Debug)]
#[non_exhaustive]
pub enum FormatError {
    /// I/O error while reading format payload bytes.
    Io(io::Error),
    /// The input matched the signature but the structure is corrupt.
    Corrupt { format: &'static str, detail: String },
    /// The format is recognized but uses an unsupported feature.
    Unsupported { format: &'static str, feature: &'static str },
    /// A declared size exceeded a configured hard limit.
    LimitExceeded { format: &'static str, limit: u64 },
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "I/O error: {err}"),
            Self::Corrupt { format, detail } => write!(f, "corrupt {format} data: {detail}"),
            Self::Unsupported { format, feature } => {
                write!(f, "{format}: unsupported feature: {feature}")
            }
            Self::LimitExceeded { format, limit } => {
                write!(f, "{format}: declared size exceeds limit of {limit} bytes")
            }
        }
    }
}

impl std::error::Error for FormatError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for FormatError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

/// Errors from entity analysis.
///
/// `Cancelled` is not a failure; it propagates a cooperative stop without
/// further emission. Everything else is reported per entity and contained.
#[derive(Debug)]
#[non_exhaustive]
pub enum AnalysisError {
    /// I/O error opening or reading the entity's byte source.
    Io(io::Error),
    /// The hashing stream failed.
    Stream(StreamError),
    /// Triple emission failed (sink error).
    Emit(io::Error),
    /// A resource budget was exhausted while analyzing this entity.
    ResourceLimit { what: &'static str },
    /// Cooperative cancellation.
    Cancelled,
}

impl AnalysisError {
    /// True when this error is a cooperative cancellation, not a failure.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "I/O error: {err}"),
            Self::Stream(err) => write!(f, "stream error: {err}"),
            Self::Emit(err) => write!(f, "triple emission failed: {err}"),
            Self::ResourceLimit { what } => write!(f, "resource limit exhausted: {what}"),
            Self::Cancelled => write!(f, "analysis cancelled"),
        }
    }
}

impl std::error::Error for AnalysisError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Stream(err) => Some(err),
            Self::Emit(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for AnalysisError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<StreamError> for AnalysisError {
    fn from(err: StreamError) -> Self {
        Self::Stream(err)
    }
}
