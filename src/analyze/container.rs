//! Container descent engine.
//!
//! # Scope
//! - Walks parsed containers (zip, tar, gzip member), re-enters the
//!   pipeline for each member, and builds parent/child link triples.
//! - Maintains a per-descent path -> directory-node map, synthesizing
//!   intermediate directories archives omit.
//! - Combines per-entry traversal directives from a policy list by
//!   max-of-set.
//!
//! # Invariants
//! - Member names are canonicalized before use: no leading slashes, no
//!   `.`/`..` components.
//! - Every decompressed byte is charged to the root budget.
//! - A `(reference, data)` pair already on the descent stack short-circuits
//!   to the existing node without recursion.

use ahash::AHashMap;

use crate::analyze::{
    context::{RootBudget, TraversalDirective},
    AnalysisContext, AnalysisResult, AnalyzerHub, Entity, EntityAnalyzer, FileKind, FileNode,
    SkipReason,
};
use crate::config::{EncryptedPolicy, InspectorConfig, UnsupportedPolicy};
use crate::error::AnalysisError;
use crate::format::{
    gzip, tar::TarWalker, zip::ZipReader, ByteSource, ContainerKind, ParsedValue,
};
use crate::rdf::vocab::{dcterms, nfo};
use crate::rdf::{LinkedNode, LiteralValue};

/// Reference-key marker for content-addressed cycle entries.
const CONTENT_REF: u64 = 0;

/// What a policy may inspect about one member before any bytes are read.
pub struct EntryInfo<'a> {
    pub name: &'a str,
    /// Declared decompressed size, when the container records one.
    pub size: Option<u64>,
    pub encrypted: bool,
    pub supported: bool,
    /// Zero-based position within the container.
    pub index: u32,
}

/// Per-entry collaborator consulted by the descent engine.
pub trait EntryPolicy: Send + Sync {
    fn directive(
        &self,
        entry: &EntryInfo<'_>,
        depth: u8,
        config: &InspectorConfig,
        budget: &RootBudget,
    ) -> (TraversalDirective, Option<SkipReason>);
}

/// The container's own vote: members are followed by default.
struct FollowPolicy;

impl EntryPolicy for FollowPolicy {
    fn directive(
        &self,
        _entry: &EntryInfo<'_>,
        _depth: u8,
        _config: &InspectorConfig,
        _budget: &RootBudget,
    ) -> (TraversalDirective, Option<SkipReason>) {
        (TraversalDirective::FollowChildren, None)
    }
}

/// Stops the level once the member count cap is reached.
struct CountPolicy;

impl EntryPolicy for CountPolicy {
    fn directive(
        &self,
        entry: &EntryInfo<'_>,
        _depth: u8,
        config: &InspectorConfig,
        _budget: &RootBudget,
    ) -> (TraversalDirective, Option<SkipReason>) {
        if entry.index >= config.max_entries_per_container {
            (TraversalDirective::SkipSiblings, Some(SkipReason::EntryCountExceeded))
        } else {
            (TraversalDirective::None, None)
        }
    }
}

/// Prunes members too large to buffer, and members the root budget can no
/// longer cover.
struct SizePolicy;

impl EntryPolicy for SizePolicy {
    fn directive(
        &self,
        entry: &EntryInfo<'_>,
        _depth: u8,
        config: &InspectorConfig,
        budget: &RootBudget,
    ) -> (TraversalDirective, Option<SkipReason>) {
        let Some(size) = entry.size else {
            return (TraversalDirective::None, None);
        };
        if size > config.max_member_buffer_bytes {
            (TraversalDirective::SkipChildren, Some(SkipReason::MemberTooLarge))
        } else if size > budget.remaining() {
            (TraversalDirective::SkipChildren, Some(SkipReason::RootBudgetExceeded))
        } else {
            (TraversalDirective::None, None)
        }
    }
}

/// Applies the configured policy to encrypted members.
struct EncryptionPolicy;

impl EntryPolicy for EncryptionPolicy {
    fn directive(
        &self,
        entry: &EntryInfo<'_>,
        _depth: u8,
        config: &InspectorConfig,
        _budget: &RootBudget,
    ) -> (TraversalDirective, Option<SkipReason>) {
        if !entry.encrypted {
            return (TraversalDirective::None, None);
        }
        let directive = match config.encrypted_policy {
            EncryptedPolicy::SkipWithTelemetry => TraversalDirective::SkipChildren,
            EncryptedPolicy::FailContainer => TraversalDirective::SkipSiblings,
            EncryptedPolicy::FailRun => TraversalDirective::Cancelled,
        };
        (directive, Some(SkipReason::Encrypted))
    }
}

/// Applies the configured policy to unsupported container features.
struct SupportPolicy;

impl EntryPolicy for SupportPolicy {
    fn directive(
        &self,
        entry: &EntryInfo<'_>,
        _depth: u8,
        config: &InspectorConfig,
        _budget: &RootBudget,
    ) -> (TraversalDirective, Option<SkipReason>) {
        if entry.supported {
            return (TraversalDirective::None, None);
        }
        let directive = match config.unsupported_policy {
            UnsupportedPolicy::SkipWithTelemetry => TraversalDirective::SkipChildren,
            UnsupportedPolicy::FailContainer => TraversalDirective::SkipSiblings,
            UnsupportedPolicy::FailRun => TraversalDirective::Cancelled,
        };
        (directive, Some(SkipReason::UnsupportedFeature))
    }
}

/// Combine every policy's vote by max-of-set, keeping the reason attached
/// to the winning directive.
fn evaluate_entry(
    policies: &[Box<dyn EntryPolicy>],
    entry: &EntryInfo<'_>,
    depth: u8,
    config: &InspectorConfig,
    budget: &RootBudget,
) -> (TraversalDirective, Option<SkipReason>) {
    let mut combined = TraversalDirective::None;
    let mut reason = None;
    for policy in policies {
        let (directive, policy_reason) = policy.directive(entry, depth, config, budget);
        if directive > combined {
            combined = directive;
            reason = policy_reason;
        }
    }
    (combined, reason)
}

/// Canonicalize an untrusted member path: forward slashes, no leading
/// separators, `.`/`..` removed. Returns the path and whether traversal
/// components were dropped.
pub fn canonicalize_entry_path(raw: &str) -> (String, bool) {
    let mut had_traversal = false;
    let mut parts: Vec<&str> = Vec::new();
    for part in raw.split(['/', '\\']) {
        match part {
            "" | "." => {}
            ".." => had_traversal = true,
            other => parts.push(other),
        }
    }
    (parts.join("/"), had_traversal)
}

/// Per-descent map from canonical directory path to its node.
struct DirectoryTracker {
    container: LinkedNode,
    nodes: AHashMap<String, LinkedNode>,
}

impl DirectoryTracker {
    fn new(container: LinkedNode) -> Self {
        Self { container, nodes: AHashMap::new() }
    }

    /// Node the member at `path` hangs under, synthesizing intermediate
    /// directories as needed.
    fn parent_node_for(
        &mut self,
        hub: &AnalyzerHub<'_>,
        path: &str,
    ) -> Result<LinkedNode, AnalysisError> {
        match path.rsplit_once('/') {
            Some((dir, _leaf)) => self.ensure_dir(hub, dir),
            None => Ok(self.container.clone()),
        }
    }

    fn ensure_dir(
        &mut self,
        hub: &AnalyzerHub<'_>,
        path: &str,
    ) -> Result<LinkedNode, AnalysisError> {
        if let Some(node) = self.nodes.get(path) {
            return Ok(node.clone());
        }
        let (parent, leaf) = match path.rsplit_once('/') {
            Some((dir, leaf)) => (self.ensure_dir(hub, dir)?, leaf),
            None => (self.container.clone(), path),
        };
        let node = hub.factory.node_relative(&parent, leaf);
        let f = hub.factory;
        let emit = |r: std::io::Result<()>| r.map_err(AnalysisError::Emit);
        emit(f.emit_type(&node, nfo::FOLDER))?;
        emit(f.emit_literal(&node, nfo::FILE_NAME, LiteralValue::Str(leaf.to_string())))?;
        emit(f.emit_node(&node, nfo::BELONGS_TO_CONTAINER, &parent))?;
        emit(f.emit_node(&parent, dcterms::HAS_PART, &node))?;
        hub.stats.record_directory();
        self.nodes.insert(path.to_string(), node.clone());
        Ok(node)
    }
}

/// One member surfaced by a container walk, before policy evaluation.
struct Member {
    canon_path: String,
    declared_size: Option<u64>,
    /// Buffered content; `None` when the member was pruned before reading.
    bytes: Option<Vec<u8>>,
}

/// The descent engine (C4): claims container format matches and walks
/// their members back through the pipeline.
pub struct ContainerAnalyzer {
    policies: Vec<Box<dyn EntryPolicy>>,
}

impl Default for ContainerAnalyzer {
    fn default() -> Self {
        Self {
            policies: vec![
                Box::new(FollowPolicy),
                Box::new(CountPolicy),
                Box::new(SizePolicy),
                Box::new(EncryptionPolicy),
                Box::new(SupportPolicy),
            ],
        }
    }
}

impl EntityAnalyzer for ContainerAnalyzer {
    fn name(&self) -> &'static str {
        "container"
    }

    fn claims(&self, entity: &Entity) -> bool {
        matches!(
            entity,
            Entity::Format(fe) if matches!(fe.value, ParsedValue::Container(_))
        )
    }

    fn analyze(
        &self,
        entity: &Entity,
        ctx: &AnalysisContext,
        hub: &AnalyzerHub<'_>,
    ) -> Result<AnalysisResult, AnalysisError> {
        let Entity::Format(fe) = entity else {
            return Ok(AnalysisResult::default());
        };
        let ParsedValue::Container(kind) = fe.value else {
            return Ok(AnalysisResult::default());
        };

        let container_node = fe.data_node.clone();

        // Self- or ancestor-references short-circuit to the existing node.
        if ctx.visited.contains(CONTENT_REF, container_node.uri()) {
            hub.stats.record_skip(SkipReason::CycleDetected);
            tracing::debug!(
                path = %ctx.match_ctx.path,
                node = container_node.uri(),
                "container already on descent stack"
            );
            return Ok(AnalysisResult::default());
        }
        if ctx.depth >= hub.config.max_depth {
            hub.stats.record_skip(SkipReason::DepthExceeded);
            return Ok(AnalysisResult::default());
        }

        hub.stats.record_container();
        hub.factory
            .emit_type(&container_node, nfo::ARCHIVE)
            .map_err(AnalysisError::Emit)?;

        let mut child_base = ctx.deeper();
        child_base.visited = ctx.visited.push(CONTENT_REF, container_node.uri());

        let mut tracker = DirectoryTracker::new(container_node);
        match kind {
            ContainerKind::Zip => {
                self.walk_zip(hub, &child_base, &fe.source, &mut tracker, kind)
            }
            ContainerKind::Tar => {
                self.walk_tar(hub, &child_base, &fe.source, &mut tracker, kind)
            }
            ContainerKind::Gzip => {
                self.walk_gzip(hub, &child_base, &fe.source, &mut tracker, kind)
            }
        }?;

        Ok(AnalysisResult::default())
    }
}

impl ContainerAnalyzer {
    fn walk_zip(
        &self,
        hub: &AnalyzerHub<'_>,
        ctx: &AnalysisContext,
        source: &ByteSource,
        tracker: &mut DirectoryTracker,
        kind: ContainerKind,
    ) -> Result<(), AnalysisError> {
        let mut reader = match ZipReader::open(source, hub.config.max_name_len) {
            Ok(r) => r,
            Err(err) => {
                record_container_failure(hub, ctx, "zip", &err);
                return Ok(());
            }
        };

        let mut index = 0u32;
        loop {
            if ctx.cancel.is_cancelled() {
                return Err(AnalysisError::Cancelled);
            }
            let entry = match reader.next_entry() {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(err) => {
                    record_container_failure(hub, ctx, "zip", &err);
                    break;
                }
            };
            let (canon, had_traversal) = canonicalize_entry_path(&entry.name);
            if had_traversal {
                tracing::debug!(path = %ctx.match_ctx.path, entry = %entry.name, "dropped traversal components");
            }
            if canon.is_empty() {
                continue;
            }
            if entry.is_dir {
                tracker.ensure_dir(hub, &canon)?;
                continue;
            }

            // Best-effort inflation guard from the declared sizes.
            let inflated = entry.compressed_size > 0
                && entry.uncompressed_size / entry.compressed_size.max(1)
                    > hub.config.max_inflation_ratio as u64;

            let info = EntryInfo {
                name: &canon,
                size: Some(entry.uncompressed_size),
                encrypted: entry.is_encrypted(),
                supported: entry.compression_supported() && !inflated,
                index,
            };
            index += 1;

            let member = match self.admit(hub, ctx, &info)? {
                Admitted::Describe => Member {
                    canon_path: canon,
                    declared_size: Some(entry.uncompressed_size),
                    bytes: None,
                },
                Admitted::Read => {
                    let cap = hub
                        .config
                        .max_member_buffer_bytes
                        .min(ctx.budget.remaining());
                    match reader.read_entry_bytes(&entry, cap) {
                        Ok(bytes) => Member {
                            canon_path: canon,
                            declared_size: Some(entry.uncompressed_size),
                            bytes: Some(bytes),
                        },
                        Err(err) => {
                            record_container_failure(hub, ctx, "zip", &err);
                            continue;
                        }
                    }
                }
                Admitted::StopLevel => break,
            };
            self.dispatch_member(hub, ctx, tracker, member, kind)?;
        }
        Ok(())
    }

    fn walk_tar(
        &self,
        hub: &AnalyzerHub<'_>,
        ctx: &AnalysisContext,
        source: &ByteSource,
        tracker: &mut DirectoryTracker,
        kind: ContainerKind,
    ) -> Result<(), AnalysisError> {
        let reader = match source.open() {
            Ok(r) => r,
            Err(err) => {
                hub.stats.record_skip(SkipReason::IoError);
                tracing::warn!(path = %ctx.match_ctx.path, error = %err, "cannot reopen tar source");
                return Ok(());
            }
        };
        let mut walker = TarWalker::new(reader, hub.config.max_name_len);
        let mut index = 0u32;
        loop {
            if ctx.cancel.is_cancelled() {
                return Err(AnalysisError::Cancelled);
            }
            let entry = match walker.next_entry() {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(err) => {
                    record_container_failure(hub, ctx, "tar", &err);
                    break;
                }
            };
            let (canon, _) = canonicalize_entry_path(&entry.name);
            if canon.is_empty() {
                walker.skip_payload(entry.size).ok();
                continue;
            }
            if entry.is_dir {
                tracker.ensure_dir(hub, &canon)?;
                continue;
            }

            let info = EntryInfo {
                name: &canon,
                size: Some(entry.size),
                encrypted: false,
                supported: true,
                index,
            };
            index += 1;

            let member = match self.admit(hub, ctx, &info)? {
                Admitted::Describe => {
                    if walker.skip_payload(entry.size).is_err() {
                        record_container_failure(
                            hub,
                            ctx,
                            "tar",
                            &crate::error::FormatError::Corrupt {
                                format: "tar",
                                detail: "truncated while skipping member".to_string(),
                            },
                        );
                        break;
                    }
                    Member {
                        canon_path: canon,
                        declared_size: Some(entry.size),
                        bytes: None,
                    }
                }
                Admitted::Read => {
                    let cap = hub
                        .config
                        .max_member_buffer_bytes
                        .min(ctx.budget.remaining());
                    match walker.read_payload(entry.size, cap) {
                        Ok(bytes) => Member {
                            canon_path: canon,
                            declared_size: Some(entry.size),
                            bytes: Some(bytes),
                        },
                        Err(err) => {
                            record_container_failure(hub, ctx, "tar", &err);
                            break;
                        }
                    }
                }
                Admitted::StopLevel => break,
            };
            self.dispatch_member(hub, ctx, tracker, member, kind)?;
        }
        Ok(())
    }

    fn walk_gzip(
        &self,
        hub: &AnalyzerHub<'_>,
        ctx: &AnalysisContext,
        source: &ByteSource,
        tracker: &mut DirectoryTracker,
        kind: ContainerKind,
    ) -> Result<(), AnalysisError> {
        use std::io::Read;

        // Member name from the FNAME header field, with a placeholder when
        // the header names nothing.
        let name = source
            .open()
            .ok()
            .and_then(|mut r| {
                let mut prefix = vec![0u8; 1024];
                let mut filled = 0;
                while filled < prefix.len() {
                    match r.read(&mut prefix[filled..]) {
                        Ok(0) => break,
                        Ok(n) => filled += n,
                        Err(_) => break,
                    }
                }
                prefix.truncate(filled);
                gzip::parse_member_name(&prefix, hub.config.max_name_len)
            })
            .unwrap_or_else(|| "<gunzip>".to_string());

        let info = EntryInfo { name: &name, size: None, encrypted: false, supported: true, index: 0 };
        let member = match self.admit(hub, ctx, &info)? {
            Admitted::Describe => Member {
                canon_path: name.clone(),
                declared_size: None,
                bytes: None,
            },
            Admitted::Read => {
                let cap = hub
                    .config
                    .max_member_buffer_bytes
                    .min(ctx.budget.remaining());
                let mut dec = match gzip::open_member(source) {
                    Ok(dec) => dec,
                    Err(err) => {
                        record_container_failure(hub, ctx, "gzip", &err);
                        return Ok(());
                    }
                };
                let mut bytes = Vec::new();
                match dec.by_ref().take(cap + 1).read_to_end(&mut bytes) {
                    Ok(_) => {}
                    Err(err) => {
                        record_container_failure(
                            hub,
                            ctx,
                            "gzip",
                            &crate::error::FormatError::Corrupt {
                                format: "gzip",
                                detail: err.to_string(),
                            },
                        );
                        return Ok(());
                    }
                }
                if bytes.len() as u64 > cap {
                    hub.stats.record_skip(SkipReason::MemberTooLarge);
                    Member {
                        canon_path: name.clone(),
                        declared_size: None,
                        bytes: None,
                    }
                } else if ratio_exceeded(bytes.len() as u64, source.len_hint(), hub.config) {
                    hub.stats.record_skip(SkipReason::InflationRatioExceeded);
                    Member {
                        canon_path: name.clone(),
                        declared_size: Some(bytes.len() as u64),
                        bytes: None,
                    }
                } else {
                    Member {
                        canon_path: name.clone(),
                        declared_size: Some(bytes.len() as u64),
                        bytes: Some(bytes),
                    }
                }
            }
            Admitted::StopLevel => return Ok(()),
        };
        self.dispatch_member(hub, ctx, tracker, member, kind)?;
        Ok(())
    }

    /// Run the policy list for one entry and fold its directive into an
    /// admission decision.
    fn admit(
        &self,
        hub: &AnalyzerHub<'_>,
        ctx: &AnalysisContext,
        info: &EntryInfo<'_>,
    ) -> Result<Admitted, AnalysisError> {
        if ctx.cancel.is_cancelled() {
            return Err(AnalysisError::Cancelled);
        }
        let (directive, reason) =
            evaluate_entry(&self.policies, info, ctx.depth, hub.config, &ctx.budget);
        if let Some(reason) = reason {
            hub.stats.record_skip(reason);
            tracing::debug!(
                path = %ctx.match_ctx.path,
                entry = info.name,
                reason = reason.label(),
                directive = ?directive,
                "entry policy decision"
            );
        }
        match directive {
            TraversalDirective::Cancelled => {
                ctx.cancel.cancel();
                Err(AnalysisError::Cancelled)
            }
            TraversalDirective::SkipSiblings => Ok(Admitted::StopLevel),
            TraversalDirective::SkipChildren => Ok(Admitted::Describe),
            TraversalDirective::None
            | TraversalDirective::FollowChildren
            | TraversalDirective::BurstChildren => Ok(Admitted::Read),
        }
    }

    /// Describe one member and, when its bytes were admitted, route it back
    /// through the pipeline.
    fn dispatch_member(
        &self,
        hub: &AnalyzerHub<'_>,
        ctx: &AnalysisContext,
        tracker: &mut DirectoryTracker,
        member: Member,
        kind: ContainerKind,
    ) -> Result<(), AnalysisError> {
        hub.stats.record_member();

        let buffered = member.bytes.as_ref().map(|b| b.len() as u64);
        if let Some(len) = buffered {
            if !ctx.budget.charge(len) {
                hub.stats.record_skip(SkipReason::RootBudgetExceeded);
                // Fall through and describe without content.
                let pruned = Member { bytes: None, ..member };
                return self.dispatch_member_inner(hub, ctx, tracker, pruned, kind);
            }
        }
        self.dispatch_member_inner(hub, ctx, tracker, member, kind)
    }

    fn dispatch_member_inner(
        &self,
        hub: &AnalyzerHub<'_>,
        ctx: &AnalysisContext,
        tracker: &mut DirectoryTracker,
        member: Member,
        kind: ContainerKind,
    ) -> Result<(), AnalysisError> {
        let parent = tracker.parent_node_for(hub, &member.canon_path)?;
        let leaf = member
            .canon_path
            .rsplit('/')
            .next()
            .unwrap_or(member.canon_path.as_str())
            .to_string();

        let file = FileNode {
            name: leaf.clone(),
            path: format!("{}::{}", ctx.match_ctx.path, member.canon_path),
            kind: FileKind::ArchiveItem,
            created: None,
            modified: None,
            accessed: None,
            len: member.declared_size,
            source: member.bytes.map(ByteSource::from_bytes),
            fs_path: None,
        };

        let child_ctx = ctx
            .with_parent_link(parent, dcterms::HAS_PART)
            .with_path(&member.canon_path, Some(kind.name()));
        hub.analyze(&Entity::File(file), &child_ctx)?;
        Ok(())
    }
}

enum Admitted {
    /// Read the member and recurse through the pipeline.
    Read,
    /// Describe metadata only; do not read content.
    Describe,
    /// Abandon the rest of this level.
    StopLevel,
}

fn ratio_exceeded(decompressed: u64, compressed: Option<u64>, config: &InspectorConfig) -> bool {
    match compressed {
        Some(c) if c > 0 => decompressed / c > config.max_inflation_ratio as u64,
        _ => false,
    }
}

fn record_container_failure(
    hub: &AnalyzerHub<'_>,
    ctx: &AnalysisContext,
    container: &'static str,
    err: &crate::error::FormatError,
) {
    use crate::error::FormatError;
    let reason = match err {
        FormatError::Unsupported { .. } => SkipReason::UnsupportedFeature,
        FormatError::LimitExceeded { .. } => SkipReason::MemberTooLarge,
        FormatError::Io(_) => SkipReason::IoError,
        _ => SkipReason::Corrupt,
    };
    hub.stats.record_skip(reason);
    hub.stats.record_parse_error();
    tracing::warn!(
        path = %ctx.match_ctx.path,
        container,
        error = %err,
        "container walk stopped"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze::CancellationToken;

    #[test]
    fn canonicalization_strips_traversal() {
        assert_eq!(canonicalize_entry_path("a/b/c.txt"), ("a/b/c.txt".into(), false));
        assert_eq!(canonicalize_entry_path("/abs/path"), ("abs/path".into(), false));
        assert_eq!(
            canonicalize_entry_path("../../etc/passwd"),
            ("etc/passwd".into(), true)
        );
        assert_eq!(canonicalize_entry_path("a\\b\\c"), ("a/b/c".into(), false));
        assert_eq!(canonicalize_entry_path("././"), (String::new(), false));
    }

    #[test]
    fn policy_combination_prefers_restrictive_directive() {
        let config = InspectorConfig::default();
        let budget = RootBudget::new(&config);
        let policies: Vec<Box<dyn EntryPolicy>> = vec![
            Box::new(FollowPolicy),
            Box::new(CountPolicy),
            Box::new(SizePolicy),
            Box::new(EncryptionPolicy),
        ];

        let ok = EntryInfo { name: "a", size: Some(10), encrypted: false, supported: true, index: 0 };
        let (d, r) = evaluate_entry(&policies, &ok, 0, &config, &budget);
        assert_eq!(d, TraversalDirective::FollowChildren);
        assert!(r.is_none());

        let big = EntryInfo {
            name: "big",
            size: Some(config.max_member_buffer_bytes + 1),
            encrypted: false,
            supported: true,
            index: 0,
        };
        let (d, r) = evaluate_entry(&policies, &big, 0, &config, &budget);
        assert_eq!(d, TraversalDirective::SkipChildren);
        assert_eq!(r, Some(SkipReason::MemberTooLarge));

        let over = EntryInfo {
            name: "n",
            size: Some(1),
            encrypted: false,
            supported: true,
            index: config.max_entries_per_container,
        };
        let (d, r) = evaluate_entry(&policies, &over, 0, &config, &budget);
        assert_eq!(d, TraversalDirective::SkipSiblings);
        assert_eq!(r, Some(SkipReason::EntryCountExceeded));
    }

    #[test]
    fn encrypted_fail_run_cancels() {
        let mut config = InspectorConfig::default();
        config.encrypted_policy = EncryptedPolicy::FailRun;
        let budget = RootBudget::new(&config);
        let policies: Vec<Box<dyn EntryPolicy>> =
            vec![Box::new(FollowPolicy), Box::new(EncryptionPolicy)];
        let sec = EntryInfo { name: "s", size: Some(1), encrypted: true, supported: true, index: 0 };
        let (d, r) = evaluate_entry(&policies, &sec, 0, &config, &budget);
        assert_eq!(d, TraversalDirective::Cancelled);
        assert_eq!(r, Some(SkipReason::Encrypted));
        // The token itself is cancelled by the engine, not the policy.
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
    }
}
