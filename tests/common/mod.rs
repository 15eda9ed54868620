//! Shared helpers for integration tests.
//!
//! # Assumptions
//! - Tests run single-threaded pipelines so triple order stays stable.
//! - Archive bytes are synthesized with minimal headers (plus targeted
//!   corruption where a case needs it) rather than trusting a writer for
//!   edge cases.

#![allow(dead_code)]

use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use descry::analyze::InspectReport;
use descry::config::InspectorConfig;
use descry::pipeline::Inspector;
use descry::rdf::{Term, TripleSink, VecSink};

/// Sink adapter that captures into a shared store the test can inspect
/// after the run.
pub struct Capture(pub Arc<Mutex<VecSink>>);

impl TripleSink for Capture {
    fn namespace(&mut self, prefix: &str, iri: &str) -> io::Result<()> {
        self.0.lock().unwrap().namespace(prefix, iri)
    }

    fn triple(&mut self, s: &str, p: &str, o: &Term, g: Option<&str>) -> io::Result<()> {
        self.0.lock().unwrap().triple(s, p, o, g)
    }

    fn finish(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Single-threaded config so assertions on counters stay deterministic.
pub fn test_config() -> InspectorConfig {
    InspectorConfig { threads: 1, ..InspectorConfig::default() }
}

pub struct Run {
    pub sink: Arc<Mutex<VecSink>>,
    pub report: InspectReport,
}

impl Run {
    /// All `(subject, predicate, object)` triples.
    pub fn triples(&self) -> Vec<(String, String, Term)> {
        self.sink
            .lock()
            .unwrap()
            .triples
            .iter()
            .map(|(s, p, o, _)| (s.clone(), p.clone(), o.clone()))
            .collect()
    }

    /// Subjects carrying `rdf:type <class>`.
    pub fn subjects_of_type(&self, class: &str) -> Vec<String> {
        self.triples()
            .into_iter()
            .filter(|(_, p, o)| {
                p == "http://www.w3.org/1999/02/22-rdf-syntax-ns#type"
                    && *o == Term::Iri(class.to_string())
            })
            .map(|(s, _, _)| s)
            .collect()
    }

    /// Objects for a `(subject, predicate)` pair.
    pub fn objects(&self, subject: &str, predicate: &str) -> Vec<Term> {
        self.triples()
            .into_iter()
            .filter(|(s, p, _)| s == subject && p == predicate)
            .map(|(_, _, o)| o)
            .collect()
    }

    /// First IRI object for a `(subject, predicate)` pair.
    pub fn object_iri(&self, subject: &str, predicate: &str) -> Option<String> {
        self.objects(subject, predicate).into_iter().find_map(|o| match o {
            Term::Iri(iri) => Some(iri),
            _ => None,
        })
    }

    /// First literal lexical form for a `(subject, predicate)` pair.
    pub fn object_literal(&self, subject: &str, predicate: &str) -> Option<String> {
        self.objects(subject, predicate).into_iter().find_map(|o| match o {
            Term::Literal { lexical, .. } => Some(lexical),
            _ => None,
        })
    }

    /// Subjects that link to `object` via `predicate`.
    pub fn subjects_linking(&self, predicate: &str, object: &str) -> Vec<String> {
        self.triples()
            .into_iter()
            .filter(|(_, p, o)| p == predicate && *o == Term::Iri(object.to_string()))
            .map(|(s, _, _)| s)
            .collect()
    }
}

/// Run the pipeline over `paths` with a capturing sink.
pub fn inspect(paths: &[PathBuf], config: InspectorConfig) -> Run {
    let store = Arc::new(Mutex::new(VecSink::new()));
    let inspector =
        Inspector::new(config, Box::new(Capture(store.clone()))).expect("valid test config");
    let report = inspector.inspect_paths(paths).expect("inspection runs");
    Run { sink: store, report }
}

/// Write `bytes` to `name` under a fresh temp dir and inspect that file.
pub fn inspect_bytes(name: &str, bytes: &[u8], config: InspectorConfig) -> (tempfile::TempDir, Run) {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join(name);
    std::fs::write(&path, bytes).expect("write input");
    let run = inspect(&[path], config);
    (dir, run)
}

// ---------------------------------------------------------------------------
// Synthesized archive bytes
// ---------------------------------------------------------------------------

pub const TAR_BLOCK: usize = 512;

fn tar_header(name: &str, size: u64, typeflag: u8) -> [u8; TAR_BLOCK] {
    let mut hdr = [0u8; TAR_BLOCK];
    hdr[..name.len()].copy_from_slice(name.as_bytes());
    let size_field = format!("{size:011o}\0");
    hdr[124..124 + 12].copy_from_slice(size_field.as_bytes());
    hdr[156] = typeflag;
    hdr[257..262].copy_from_slice(b"ustar");
    hdr[263..265].copy_from_slice(b"00");
    hdr
}

/// Minimal ustar stream from `(name, payload)` pairs.
pub fn build_tar(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut out = Vec::new();
    for (name, payload) in entries {
        let typeflag = if name.ends_with('/') { b'5' } else { b'0' };
        out.extend_from_slice(&tar_header(name, payload.len() as u64, typeflag));
        out.extend_from_slice(payload);
        let pad = (TAR_BLOCK - payload.len() % TAR_BLOCK) % TAR_BLOCK;
        out.extend(std::iter::repeat(0u8).take(pad));
    }
    out.extend(std::iter::repeat(0u8).take(2 * TAR_BLOCK));
    out
}

/// Minimal single-entry stored Zip32, optionally flagged encrypted.
pub fn build_stored_zip_entry(name: &str, data: &[u8], encrypted: bool) -> Vec<u8> {
    fn u16le(v: u16) -> [u8; 2] {
        v.to_le_bytes()
    }
    fn u32le(v: u32) -> [u8; 4] {
        v.to_le_bytes()
    }

    let mut crc = crc32fast::Hasher::new();
    crc.update(data);
    let crc = crc.finalize();
    let flags: u16 = if encrypted { 1 } else { 0 };

    let mut out = Vec::new();
    out.extend_from_slice(&u32le(0x0403_4b50));
    out.extend_from_slice(&u16le(20));
    out.extend_from_slice(&u16le(flags));
    out.extend_from_slice(&u16le(0));
    out.extend_from_slice(&u16le(0));
    out.extend_from_slice(&u16le(0));
    out.extend_from_slice(&u32le(crc));
    out.extend_from_slice(&u32le(data.len() as u32));
    out.extend_from_slice(&u32le(data.len() as u32));
    out.extend_from_slice(&u16le(name.len() as u16));
    out.extend_from_slice(&u16le(0));
    out.extend_from_slice(name.as_bytes());
    out.extend_from_slice(data);

    let cd_off = out.len() as u32;
    out.extend_from_slice(&u32le(0x0201_4b50));
    out.extend_from_slice(&u16le(20));
    out.extend_from_slice(&u16le(20));
    out.extend_from_slice(&u16le(flags));
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
    out.extend_from_slice(&u32le(0));
    out.extend_from_slice(name.as_bytes());
    let cd_size = out.len() as u32 - cd_off;

    out.extend_from_slice(&u32le(0x0605_4b50));
    out.extend_from_slice(&u16le(0));
    out.extend_from_slice(&u16le(0));
    out.extend_from_slice(&u16le(1));
    out.extend_from_slice(&u16le(1));
    out.extend_from_slice(&u32le(cd_size));
    out.extend_from_slice(&u32le(cd_off));
    out.extend_from_slice(&u16le(0));
    out
}

/// Real multi-entry zip via the `zip` writer (deflate).
pub fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    let mut cursor = io::Cursor::new(Vec::new());
    {
        let mut writer = zip::ZipWriter::new(&mut cursor);
        let opts = SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);
        for (name, payload) in entries {
            writer.start_file(*name, opts).expect("start zip entry");
            writer.write_all(payload).expect("write zip entry");
        }
        writer.finish().expect("finish zip");
    }
    cursor.into_inner()
}

/// gzip bytes with an embedded FNAME member name.
pub fn build_gz_named(name: &str, payload: &[u8]) -> Vec<u8> {
    use std::io::Write;
    let mut out = Vec::new();
    let mut enc = flate2::GzBuilder::new()
        .filename(name)
        .write(&mut out, flate2::Compression::default());
    enc.write_all(payload).expect("write gz payload");
    enc.finish().expect("finish gz payload");
    out
}

/// Locate the content node (data object) a file node points at.
pub fn content_node_of(run: &Run, file_node: &str) -> Option<String> {
    run.object_iri(
        file_node,
        "http://www.semanticdesktop.org/ontologies/2007/01/19/nie#interpretedAs",
    )
}

/// Locate the file node for a member by its `nfo:fileName` literal.
pub fn file_node_named(run: &Run, name: &str) -> Option<String> {
    run.triples()
        .into_iter()
        .filter(|(_, p, o)| {
            p == "http://www.semanticdesktop.org/ontologies/2007/03/22/nfo#fileName"
                && *o == Term::string(name)
        })
        .map(|(s, _, _)| s)
        .next()
}

/// Canonical sorted triple strings for whole-graph comparisons.
pub fn sorted_triple_strings(run: &Run) -> Vec<String> {
    let mut out: Vec<String> = run
        .triples()
        .into_iter()
        .map(|(s, p, o)| format!("{s} {p} {o:?}"))
        .collect();
    out.sort();
    out
}

/// Strip subjects that depend on the input location (file:// roots) so two
/// runs over different temp dirs compare equal.
pub fn content_triples_only(run: &Run) -> Vec<String> {
    let mut out: Vec<String> = run
        .triples()
        .into_iter()
        .filter(|(s, _, o)| {
            !s.starts_with("file://")
                && !matches!(o, Term::Iri(iri) if iri.starts_with("file://"))
        })
        .map(|(s, p, o)| format!("{s} {p} {o:?}"))
        .collect();
    out.sort();
    out
}

/// Keep `Path` in the public surface for helpers that take directories.
pub fn path_of(dir: &tempfile::TempDir) -> &Path {
    dir.path()
}
