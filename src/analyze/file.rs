//! Filesystem entity analyzers: files, directories, and the tree walk.
//!
//! # Design Notes
//! - Directory children are visited in name order so independent runs over
//!   the same tree emit identical graphs.
//! - Symlinks are not followed; hardlink loops are cut by the
//!   `(device, inode)` visited chain.
//! - A walk error is recorded and skipped; it never aborts the run.

use std::fs;
use std::path::Path;
use std::time::SystemTime;

use chrono::{DateTime, Utc};

use crate::analyze::{
    AnalysisContext, AnalysisResult, AnalyzerHub, DataObject, Entity, EntityAnalyzer, EntityKind,
    FileKind, FileNode, SkipReason,
};
use crate::error::AnalysisError;
use crate::format::ByteSource;
use crate::rdf::vocab::{dcterms, nfo, nie};
use crate::rdf::{LinkedNode, LiteralValue};

/// `file://` URI for a filesystem path, percent-encoding each segment.
pub fn file_uri(path: &Path) -> String {
    let absolute = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    let mut uri = String::from("file://");
    for component in absolute.components() {
        use std::path::Component;
        match component {
            Component::RootDir | Component::Prefix(_) => {}
            Component::CurDir | Component::ParentDir => {}
            Component::Normal(part) => {
                uri.push('/');
                encode_uri_segment(&part.to_string_lossy(), &mut uri);
            }
        }
    }
    if uri == "file://" {
        uri.push('/');
    }
    uri
}

fn encode_uri_segment(segment: &str, out: &mut String) {
    for b in segment.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(b as char)
            }
            other => crate::rdf::vocab::push_pct(out, other),
        }
    }
}

fn timestamp(value: Option<SystemTime>) -> Option<DateTime<Utc>> {
    value.map(DateTime::<Utc>::from)
}

/// Build a [`FileNode`] from filesystem metadata.
pub fn file_node_from_fs(path: &Path, meta: &fs::Metadata, display: String) -> FileNode {
    let kind = if meta.is_dir() { FileKind::Directory } else { FileKind::Regular };
    FileNode {
        name: path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| display.clone()),
        path: display,
        kind,
        created: timestamp(meta.created().ok()),
        modified: timestamp(meta.modified().ok()),
        accessed: timestamp(meta.accessed().ok()),
        len: (!meta.is_dir()).then(|| meta.len()),
        source: (!meta.is_dir()).then(|| ByteSource::from_path(path.to_path_buf())),
        fs_path: Some(path.to_path_buf()),
    }
}

#[cfg(unix)]
fn fs_cycle_key(meta: &fs::Metadata) -> (u64, String) {
    use std::os::unix::fs::MetadataExt;
    (meta.dev(), meta.ino().to_string())
}

#[cfg(not(unix))]
fn fs_cycle_key(meta: &fs::Metadata) -> (u64, String) {
    let _ = meta;
    (u64::MAX, String::new())
}

fn mint_node(
    hub: &AnalyzerHub<'_>,
    ctx: &AnalysisContext,
    file: &FileNode,
) -> LinkedNode {
    match (&ctx.parent, &file.fs_path) {
        (Some(parent), _) => hub.factory.node_relative(parent, &file.name),
        (None, Some(path)) => hub.factory.node(file_uri(path)),
        (None, None) => hub.factory.node(format!("urn:descry:{}", file.name)),
    }
}

fn emit_common(
    hub: &AnalyzerHub<'_>,
    ctx: &AnalysisContext,
    node: &LinkedNode,
    file: &FileNode,
    class_iri: &str,
) -> Result<(), AnalysisError> {
    let f = hub.factory;
    let emit = |r: std::io::Result<()>| r.map_err(AnalysisError::Emit);
    emit(f.emit_type(node, class_iri))?;
    emit(f.emit_literal(node, nfo::FILE_NAME, LiteralValue::Str(file.name.clone())))?;
    if let Some(created) = file.created {
        emit(f.emit_literal(node, nfo::FILE_CREATED, LiteralValue::DateTime(created)))?;
    }
    if let Some(modified) = file.modified {
        emit(f.emit_literal(node, nfo::FILE_LAST_MODIFIED, LiteralValue::DateTime(modified)))?;
    }
    if let Some(accessed) = file.accessed {
        emit(f.emit_literal(node, nfo::FILE_LAST_ACCESSED, LiteralValue::DateTime(accessed)))?;
    }
    if let Some(parent) = &ctx.parent {
        emit(f.emit_node(node, nfo::BELONGS_TO_CONTAINER, parent))?;
    }
    Ok(())
}

/// Describes file-like entities and routes their bytes into data analysis.
pub struct FileAnalyzer;

impl EntityAnalyzer for FileAnalyzer {
    fn name(&self) -> &'static str {
        "file"
    }

    fn claims(&self, entity: &Entity) -> bool {
        entity.kind() == EntityKind::File
    }

    fn analyze(
        &self,
        entity: &Entity,
        ctx: &AnalysisContext,
        hub: &AnalyzerHub<'_>,
    ) -> Result<AnalysisResult, AnalysisError> {
        let Entity::File(file) = entity else {
            return Ok(AnalysisResult::default());
        };
        hub.stats.record_file();

        let node = mint_node(hub, ctx, file);
        let class = match file.kind {
            FileKind::ArchiveItem => nfo::ARCHIVE_ITEM,
            FileKind::Embedded => nfo::EMBEDDED_FILE_DATA_OBJECT,
            _ => nfo::FILE_DATA_OBJECT,
        };
        emit_common(hub, ctx, &node, file, class)?;
        if let Some(len) = file.len {
            hub.factory
                .emit_literal(&node, dcterms::EXTENT, LiteralValue::ULong(len))
                .map_err(AnalysisError::Emit)?;
        }

        if let Some(source) = &file.source {
            let data = DataObject {
                source: source.clone(),
                declared_name: Some(file.name.clone()),
            };
            let child_ctx = ctx.with_parent_link(node.clone(), nie::INTERPRETED_AS);
            hub.analyze(&Entity::Data(data), &child_ctx)?;
        }

        Ok(AnalysisResult { node: Some(node), label: Some(file.name.clone()) })
    }
}

/// Describes directories and walks their children in deterministic order.
pub struct DirectoryAnalyzer;

impl EntityAnalyzer for DirectoryAnalyzer {
    fn name(&self) -> &'static str {
        "directory"
    }

    fn claims(&self, entity: &Entity) -> bool {
        entity.kind() == EntityKind::Directory
    }

    fn analyze(
        &self,
        entity: &Entity,
        ctx: &AnalysisContext,
        hub: &AnalyzerHub<'_>,
    ) -> Result<AnalysisResult, AnalysisError> {
        let Entity::Directory(dir) = entity else {
            return Ok(AnalysisResult::default());
        };
        hub.stats.record_directory();

        let node = mint_node(hub, ctx, dir);
        emit_common(hub, ctx, &node, dir, nfo::FOLDER)?;

        if let Some(fs_path) = &dir.fs_path {
            self.walk_children(hub, ctx, &node, fs_path)?;
        }

        Ok(AnalysisResult { node: Some(node), label: Some(dir.name.clone()) })
    }
}

impl DirectoryAnalyzer {
    fn walk_children(
        &self,
        hub: &AnalyzerHub<'_>,
        ctx: &AnalysisContext,
        node: &LinkedNode,
        fs_path: &Path,
    ) -> Result<(), AnalysisError> {
        let read_dir = match fs::read_dir(fs_path) {
            Ok(rd) => rd,
            Err(err) => {
                hub.stats.record_skip(SkipReason::IoError);
                tracing::warn!(path = %fs_path.display(), error = %err, "cannot read directory");
                return Ok(());
            }
        };

        let mut children: Vec<_> = Vec::new();
        for entry in read_dir {
            match entry {
                Ok(e) => children.push(e.path()),
                Err(err) => {
                    hub.stats.record_skip(SkipReason::IoError);
                    tracing::warn!(path = %fs_path.display(), error = %err, "directory entry error");
                }
            }
        }
        // Name order keeps independent runs byte-identical.
        children.sort();

        for child_path in children {
            if ctx.cancel.is_cancelled() {
                return Err(AnalysisError::Cancelled);
            }
            let meta = match fs::symlink_metadata(&child_path) {
                Ok(m) => m,
                Err(err) => {
                    hub.stats.record_skip(SkipReason::IoError);
                    tracing::warn!(path = %child_path.display(), error = %err, "stat failed");
                    continue;
                }
            };
            if meta.file_type().is_symlink() {
                continue;
            }

            let (ref_key, data_key) = fs_cycle_key(&meta);
            if ctx.visited.contains(ref_key, &data_key) {
                hub.stats.record_skip(SkipReason::CycleDetected);
                continue;
            }

            let name = child_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let file = file_node_from_fs(&child_path, &meta, child_path.display().to_string());

            let mut child_ctx = ctx
                .with_parent_link(node.clone(), dcterms::HAS_PART)
                .with_path(&name, None);
            child_ctx.visited = ctx.visited.push(ref_key, &data_key);

            let entity = if meta.is_dir() {
                Entity::Directory(file)
            } else {
                Entity::File(file)
            };
            hub.analyze(&entity, &child_ctx)?;
        }
        Ok(())
    }
}
