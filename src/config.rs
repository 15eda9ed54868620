//! Inspection policy and hard limits.
//!
//! # Invariants
//! - All limits are hard bounds and must be internally consistent.
//! - Container input is treated as hostile: sizes, counts, and paths are
//!   untrusted until charged against a budget.
//!
//! # Design Notes
//! - Defaults are safety-first; every recursion and decompression is capped.
//! - Limits are shared by the sequential and pooled execution paths to keep
//!   behavior identical.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::hash::HashAlgorithmId;

/// Policy for how to treat encrypted containers or encrypted members.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EncryptedPolicy {
    /// Skip encrypted content and increment outcome counters.
    #[default]
    SkipWithTelemetry = 0,
    /// Treat the current container as failed and continue with other roots.
    FailContainer = 1,
    /// Abort the entire run.
    FailRun = 2,
}

/// Policy for how to treat unsupported container formats or features.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum UnsupportedPolicy {
    /// Skip unsupported content and increment outcome counters.
    #[default]
    SkipWithTelemetry = 0,
    /// Treat the current container as failed and continue with other roots.
    FailContainer = 1,
    /// Abort the entire run.
    FailRun = 2,
}

/// Shared inspection configuration.
///
/// All limits are hard bounds. Container code must treat member metadata and
/// payload as hostile: sizes, counts, paths, and offsets are untrusted.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InspectorConfig {
    /// Hash algorithms computed for every data object.
    pub hash_algorithms: Vec<HashAlgorithmId>,
    /// Algorithm whose content-addressed URI names the data object's node.
    ///
    /// Must be one of `hash_algorithms`.
    pub identity_algorithm: HashAlgorithmId,

    /// Bytes buffered at the front of every stream for header matching.
    ///
    /// Must be at least as long as the longest registered format signature
    /// check (the tar magic sits at offset 257).
    pub max_header_bytes: usize,

    /// Maximum nested container depth.
    pub max_depth: u8,
    /// Maximum number of members processed per container.
    pub max_entries_per_container: u32,
    /// Maximum member size buffered in memory for recursive descent.
    ///
    /// Larger members are described by name and size only and recorded as
    /// skipped.
    pub max_member_buffer_bytes: u64,
    /// Maximum total decompressed bytes produced under a single root.
    pub max_total_decompressed_bytes_per_root: u64,
    /// Maximum tolerated decompression inflation ratio (best-effort).
    pub max_inflation_ratio: u32,

    /// Maximum bytes a full-document parser (e.g. XML) may read.
    pub max_parse_bytes: u64,
    /// Maximum accepted member/file name length in bytes.
    pub max_name_len: usize,
    /// Content up to this many bytes is additionally inlined as a literal.
    pub max_inline_content_bytes: usize,

    /// Worker threads for independent roots. 0 selects the parallelism
    /// reported by the host.
    pub threads: usize,

    /// Policy for encrypted content.
    pub encrypted_policy: EncryptedPolicy,
    /// Policy for unsupported content.
    pub unsupported_policy: UnsupportedPolicy,
}

impl Default for InspectorConfig {
    fn default() -> Self {
        Self {
            hash_algorithms: vec![
                HashAlgorithmId::Md5,
                HashAlgorithmId::Sha1,
                HashAlgorithmId::Sha256,
                HashAlgorithmId::Blake3,
            ],
            identity_algorithm: HashAlgorithmId::Sha256,
            max_header_bytes: 4096,
            max_depth: 8,
            max_entries_per_container: 10_000,
            max_member_buffer_bytes: 16 * 1024 * 1024,
            max_total_decompressed_bytes_per_root: 1024 * 1024 * 1024,
            max_inflation_ratio: 200,
            max_parse_bytes: 8 * 1024 * 1024,
            max_name_len: 512,
            max_inline_content_bytes: 256,
            threads: 0,
            encrypted_policy: EncryptedPolicy::default(),
            unsupported_policy: UnsupportedPolicy::default(),
        }
    }
}

impl InspectorConfig {
    /// Validate internal consistency.
    ///
    /// Callers should treat a failure as a configuration bug (not hostile
    /// input) and refuse to start the run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hash_algorithms.is_empty() {
            return Err(ConfigError::NoHashAlgorithms);
        }
        if !self.hash_algorithms.contains(&self.identity_algorithm) {
            return Err(ConfigError::IdentityAlgorithmNotComputed {
                algorithm: self.identity_algorithm,
            });
        }
        if self.max_header_bytes < 512 {
            return Err(ConfigError::HeaderWindowTooSmall {
                bytes: self.max_header_bytes,
            });
        }
        if self.max_header_bytes > 1024 * 1024 {
            return Err(ConfigError::HeaderWindowTooLarge {
                bytes: self.max_header_bytes,
            });
        }
        if self.max_depth == 0 {
            return Err(ConfigError::MaxDepthZero);
        }
        if self.max_entries_per_container == 0 {
            return Err(ConfigError::MaxEntriesZero);
        }
        if self.max_member_buffer_bytes == 0 {
            return Err(ConfigError::MemberBufferZero);
        }
        if self.max_total_decompressed_bytes_per_root < self.max_member_buffer_bytes {
            return Err(ConfigError::RootBytesCapTooSmall {
                per_member: self.max_member_buffer_bytes,
                per_root: self.max_total_decompressed_bytes_per_root,
            });
        }
        if self.max_inflation_ratio == 0 {
            return Err(ConfigError::MaxInflationRatioZero);
        }
        if self.max_parse_bytes == 0 {
            return Err(ConfigError::MaxParseBytesZero);
        }
        if self.max_name_len == 0 {
            return Err(ConfigError::MaxNameLenZero);
        }
        if self.threads > 512 {
            return Err(ConfigError::TooManyThreads { threads: self.threads });
        }
        Ok(())
    }
}

/// Validation error returned by [`InspectorConfig::validate`].
///
/// Each variant corresponds to a violated invariant or ordering constraint.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    NoHashAlgorithms,
    IdentityAlgorithmNotComputed { algorithm: HashAlgorithmId },
    HeaderWindowTooSmall { bytes: usize },
    HeaderWindowTooLarge { bytes: usize },
    MaxDepthZero,
    MaxEntriesZero,
    MemberBufferZero,
    RootBytesCapTooSmall { per_member: u64, per_root: u64 },
    MaxInflationRatioZero,
    MaxParseBytesZero,
    MaxNameLenZero,
    TooManyThreads { threads: usize },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::NoHashAlgorithms => {
                write!(f, "hash_algorithms must not be empty")
            }
            ConfigError::IdentityAlgorithmNotComputed { algorithm } => write!(
                f,
                "identity_algorithm {} must be listed in hash_algorithms",
                algorithm.name()
            ),
            ConfigError::HeaderWindowTooSmall { bytes } => write!(
                f,
                "max_header_bytes must be >= 512 to cover registered signatures (got {bytes})"
            ),
            ConfigError::HeaderWindowTooLarge { bytes } => {
                write!(f, "max_header_bytes must be <= 1 MiB (got {bytes})")
            }
            ConfigError::MaxDepthZero => write!(f, "max_depth must be > 0"),
            ConfigError::MaxEntriesZero => {
                write!(f, "max_entries_per_container must be > 0")
            }
            ConfigError::MemberBufferZero => {
                write!(f, "max_member_buffer_bytes must be > 0")
            }
            ConfigError::RootBytesCapTooSmall { per_member, per_root } => write!(
                f,
                "per-root byte cap must be >= member buffer cap (member={per_member}, root={per_root})"
            ),
            ConfigError::MaxInflationRatioZero => {
                write!(f, "max_inflation_ratio must be > 0")
            }
            ConfigError::MaxParseBytesZero => write!(f, "max_parse_bytes must be > 0"),
            ConfigError::MaxNameLenZero => write!(f, "max_name_len must be > 0"),
            ConfigError::TooManyThreads { threads } => {
                write!(f, "threads must be <= 512 (got {threads})")
            }
        }
    }
}

impl std::error::Error for ConfigError {}
