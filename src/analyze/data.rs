//! Data analysis: single-pass hashing, format matching, improvised formats.
//!
//! # Algorithm (per data object)
//! 1. Open the hashing multiplexer over the source.
//! 2. Read the head window; classify binary vs text (a NUL followed by a
//!    nonzero byte means binary).
//! 3. Query the registry; invoke candidates in specificity order. Every
//!    candidate sees the same head window and a re-openable source, so the
//!    hashing cursor is read at most once sequentially.
//! 4. Finalize digests, mint the content-addressed node, and emit triples
//!    in order: identity class, size/encoding, hashes, format links,
//!    per-format children.
//!
//! # Design Notes
//! - A detector failure is contained: the entity keeps its hashes and size,
//!   annotated with a description and a provenance link.
//! - When nothing claims non-empty data, an improvised descriptor is
//!   synthesized from the leading magic bytes or the `#!` interpreter line.

use memchr::memchr_iter;

use crate::analyze::{
    AnalysisContext, AnalysisResult, AnalyzerHub, Entity, EntityAnalyzer, EntityKind,
    FormatEntity,
};
use crate::error::AnalysisError;
use crate::format::{text::detect_charset, xml, FormatMatch, FormatProbe, ParsedValue};
use crate::hash::{encode_digest, DigestFormat, HashStream};
use crate::rdf::vocab::{dc, dcterms, ds, dsc, media_type_urn, nfo, nie, owl, prov, skos, xsd};
use crate::rdf::{LinkedNode, LiteralValue, NodeFactory, Term};

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;

/// Binary classification: a NUL byte followed by a nonzero byte. Trailing
/// NUL padding alone does not make data binary.
pub fn is_binary_data(head: &[u8]) -> bool {
    for pos in memchr_iter(0, head) {
        if let Some(&next) = head.get(pos + 1) {
            if next != 0 {
                return true;
            }
        }
        // A NUL followed by another NUL defers to that position's own check.
    }
    false
}

/// Synthesized descriptor for data no registered format claimed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Improvised {
    /// Printable leading magic bytes ("WASM", "RIFX", ...).
    Signature(String),
    /// Interpreter basename from a `#!` line.
    Shebang(String),
}

impl Improvised {
    pub fn media_type(&self) -> String {
        match self {
            Self::Signature(sig) => {
                format!("application/x.sig.{}", sig.to_ascii_lowercase())
            }
            Self::Shebang(interp) => {
                format!("application/x.shebang.{}", interp.to_ascii_lowercase())
            }
        }
    }

    pub fn extension(&self) -> String {
        match self {
            Self::Signature(sig) => sig.clone(),
            Self::Shebang(interp) => interp.clone(),
        }
    }
}

const SIGNATURE_MAX: usize = 8;

/// Extract an improvised descriptor from the head window, if the data
/// carries something nameable.
pub fn improvised_descriptor(head: &[u8]) -> Option<Improvised> {
    if let Some(line) = head.strip_prefix(b"#!") {
        let end = line.iter().position(|&b| b == b'\n').unwrap_or(line.len());
        let text = std::str::from_utf8(&line[..end]).ok()?;
        let mut words = text.trim().split_whitespace();
        let first = words.next()?;
        let base = first.rsplit('/').next().unwrap_or(first);
        // `#!/usr/bin/env python` names the interpreter in the next word.
        let interp = if base == "env" { words.next()? } else { base };
        if interp.is_empty() {
            return None;
        }
        return Some(Improvised::Shebang(interp.to_string()));
    }

    let len = head
        .iter()
        .take(SIGNATURE_MAX)
        .take_while(|&&b| b.is_ascii_graphic())
        .count();
    if len < 2 {
        return None;
    }
    // A signature must terminate before printable data continues; otherwise
    // this is just text.
    if len == head.len().min(SIGNATURE_MAX) && head.len() > SIGNATURE_MAX {
        return None;
    }
    Some(Improvised::Signature(
        String::from_utf8_lossy(&head[..len]).into_owned(),
    ))
}

/// Emits triples for one subject while recording them for the query tester.
struct Emitter<'a> {
    factory: &'a NodeFactory,
    node: &'a LinkedNode,
    facts: Vec<(String, Term)>,
}

impl<'a> Emitter<'a> {
    fn new(factory: &'a NodeFactory, node: &'a LinkedNode) -> Self {
        Self { factory, node, facts: Vec::new() }
    }

    fn class(&mut self, class_iri: &str) -> Result<(), AnalysisError> {
        self.factory
            .emit_type(self.node, class_iri)
            .map_err(AnalysisError::Emit)?;
        self.facts.push((
            crate::rdf::vocab::rdf::TYPE.to_string(),
            Term::Iri(class_iri.to_string()),
        ));
        Ok(())
    }

    fn iri(&mut self, predicate: &str, object: &str) -> Result<(), AnalysisError> {
        self.factory
            .emit_iri(self.node, predicate, object)
            .map_err(AnalysisError::Emit)?;
        self.facts
            .push((predicate.to_string(), Term::Iri(object.to_string())));
        Ok(())
    }

    fn literal(&mut self, predicate: &str, value: LiteralValue) -> Result<(), AnalysisError> {
        self.facts
            .push((predicate.to_string(), Term::string(value.lexical())));
        self.factory
            .emit_literal(self.node, predicate, value)
            .map_err(AnalysisError::Emit)
    }

    fn typed(
        &mut self,
        predicate: &str,
        lexical: String,
        datatype: &str,
    ) -> Result<(), AnalysisError> {
        self.facts
            .push((predicate.to_string(), Term::typed(lexical.clone(), datatype)));
        self.factory
            .emit_typed(self.node, predicate, lexical, datatype)
            .map_err(AnalysisError::Emit)
    }

    fn facts(&self) -> &[(String, Term)] {
        &self.facts
    }
}

/// The root-level data analyzer (C3).
pub struct DataAnalyzer;

impl EntityAnalyzer for DataAnalyzer {
    fn name(&self) -> &'static str {
        "data"
    }

    fn claims(&self, entity: &Entity) -> bool {
        entity.kind() == EntityKind::Data
    }

    fn analyze(
        &self,
        entity: &Entity,
        ctx: &AnalysisContext,
        hub: &AnalyzerHub<'_>,
    ) -> Result<AnalysisResult, AnalysisError> {
        let Entity::Data(data) = entity else {
            return Ok(AnalysisResult::default());
        };
        let cfg = hub.config;

        let reader = data.source.open()?;
        let mut stream = HashStream::open(reader, &cfg.hash_algorithms, cfg.max_header_bytes);
        let head = stream.read_head(cfg.max_header_bytes)?.to_vec();
        let is_short = stream.source_exhausted() && head.len() < cfg.max_header_bytes;
        let is_binary = is_binary_data(&head);
        let len_hint = data.source.len_hint();

        let mut matches: Vec<FormatMatch> = Vec::new();
        let mut failures: Vec<(&'static str, String)> = Vec::new();

        if !head.is_empty() {
            for id in hub.registry.candidates(&head, is_short, is_binary) {
                if ctx.cancel.is_cancelled() {
                    return Err(AnalysisError::Cancelled);
                }
                let format = hub.registry.get(id);
                let probe = FormatProbe {
                    header: &head,
                    is_short,
                    is_binary,
                    source: &data.source,
                    len_hint,
                    max_parse_bytes: cfg.max_parse_bytes,
                };
                match format.parse(&probe, &ctx.match_ctx) {
                    Ok(Some(value)) => {
                        hub.stats.record_format_match();
                        matches.push(FormatMatch { id, value });
                    }
                    Ok(None) => {}
                    Err(err) => {
                        hub.stats.record_parse_error();
                        tracing::warn!(
                            path = %ctx.match_ctx.path,
                            format = format.name(),
                            error = %err,
                            "format parse failed"
                        );
                        failures.push((format.name(), err.to_string()));
                    }
                }
            }
        }

        let digests = stream.finalize()?;
        let node = hub
            .factory
            .node_from_digests(cfg.identity_algorithm, &digests)
            .ok_or(AnalysisError::ResourceLimit { what: "no digest for identity" })?;
        hub.stats.record_data_object();

        // Equal content was already fully described; re-link only.
        if !hub.factory.begin_description(&node) {
            return Ok(AnalysisResult { node: Some(node), label: data.declared_name.clone() });
        }

        let mut em = Emitter::new(hub.factory, &node);

        // Identity class, then size/encoding.
        em.class(nie::DATA_OBJECT)?;
        em.literal(dcterms::EXTENT, LiteralValue::ULong(digests.total()))?;
        em.literal(dsc::IS_BINARY, LiteralValue::Bool(is_binary))?;
        if !is_binary && !head.is_empty() {
            let truncated = !stream_covered(&head, digests.total());
            let charset = detect_charset(&head, truncated);
            em.literal(nie::CHARACTER_SET, LiteralValue::Str(charset.to_string()))?;
        }
        if digests.total() > 0
            && digests.total() <= cfg.max_inline_content_bytes as u64
            && digests.total() as usize <= head.len()
        {
            let content = &head[..digests.total() as usize];
            match std::str::from_utf8(content) {
                Ok(text) if !is_binary => {
                    em.literal(dsc::CONTENT, LiteralValue::Str(text.to_string()))?;
                }
                _ => {
                    em.typed(dsc::CONTENT, BASE64_STANDARD.encode(content), xsd::BASE64_BINARY)?;
                }
            }
        }

        // Hashes: the identity digest sits on the node itself; other
        // algorithms get their own content-addressed identities, merged
        // through owl:sameAs.
        for (algo, digest) in digests.iter() {
            if algo == cfg.identity_algorithm {
                em.iri(ds::DIGEST_ALGORITHM, algo.algorithm_iri())?;
                em.typed(
                    ds::DIGEST_VALUE,
                    BASE64_STANDARD.encode(digest),
                    xsd::BASE64_BINARY,
                )?;
            } else {
                let alt = hub.factory.node(algo.uri_for(digest));
                em.iri(owl::SAME_AS, alt.uri())?;
                hub.factory
                    .emit_iri(&alt, ds::DIGEST_ALGORITHM, algo.algorithm_iri())
                    .map_err(AnalysisError::Emit)?;
                hub.factory
                    .emit_typed(
                        &alt,
                        ds::DIGEST_VALUE,
                        BASE64_STANDARD.encode(digest),
                        xsd::BASE64_BINARY,
                    )
                    .map_err(AnalysisError::Emit)?;
            }
        }

        // Format links and per-format children.
        let had_matches = !matches.is_empty();
        for m in matches {
            let child = Entity::Format(FormatEntity {
                id: m.id,
                value: m.value,
                data_node: node.clone(),
                source: data.source.clone(),
            });
            let child_ctx = ctx.with_parent_link(node.clone(), dcterms::HAS_FORMAT);
            hub.analyze(&child, &child_ctx)?;
        }

        if !had_matches && digests.total() > 0 {
            if let Some(improvised) = improvised_descriptor(&head) {
                emit_improvised(hub, &mut em, &improvised)?;
                hub.stats.record_improvised_format();
            }
        }

        // Contained detector failures annotate the entity.
        for (format, detail) in failures {
            em.literal(
                dc::DESCRIPTION,
                LiteralValue::Str(format!("{format}: {detail}")),
            )?;
            if let Some(parent) = &ctx.parent {
                em.iri(prov::WAS_DERIVED_FROM, parent.uri())?;
            }
        }

        if let (Some(tester), Some(dir)) = (hub.tester, hub.extract_dir) {
            if tester.matches(node.uri(), em.facts()) {
                materialize(hub, &node, data, &digests, dir);
            }
        }

        Ok(AnalysisResult { node: Some(node), label: data.declared_name.clone() })
    }
}

fn stream_covered(head: &[u8], total: u64) -> bool {
    head.len() as u64 >= total
}

fn emit_improvised(
    hub: &AnalyzerHub<'_>,
    em: &mut Emitter<'_>,
    improvised: &Improvised,
) -> Result<(), AnalysisError> {
    let media = improvised.media_type();
    let format_node = hub.factory.node(media_type_urn(&media));
    em.iri(dcterms::HAS_FORMAT, format_node.uri())?;

    // Improvised descriptors are shared by every object with the same
    // signature; describe the descriptor itself only once.
    if hub.factory.begin_description(&format_node) {
        let f = hub.factory;
        f.emit_type(&format_node, dsc::IMPROVISED_FORMAT)
            .map_err(AnalysisError::Emit)?;
        f.emit_literal(&format_node, nie::MIME_TYPE, LiteralValue::Str(media))
            .map_err(AnalysisError::Emit)?;
        f.emit_literal(
            &format_node,
            dsc::EXTENSION,
            LiteralValue::Str(improvised.extension()),
        )
        .map_err(AnalysisError::Emit)?;
        match improvised {
            Improvised::Signature(sig) => f
                .emit_literal(&format_node, dsc::SIGNATURE, LiteralValue::Str(sig.clone()))
                .map_err(AnalysisError::Emit)?,
            Improvised::Shebang(interp) => f
                .emit_literal(
                    &format_node,
                    dsc::INTERPRETER,
                    LiteralValue::Str(interp.clone()),
                )
                .map_err(AnalysisError::Emit)?,
        }
        f.emit_literal(
            &format_node,
            skos::PREF_LABEL,
            LiteralValue::Str(improvised.extension()),
        )
        .map_err(AnalysisError::Emit)?;
    }
    Ok(())
}

fn materialize(
    hub: &AnalyzerHub<'_>,
    node: &LinkedNode,
    data: &crate::analyze::DataObject,
    digests: &crate::hash::Digests,
    dir: &std::path::Path,
) {
    let ident = digests
        .get(hub.config.identity_algorithm)
        .map(|d| encode_digest(DigestFormat::HexLower, d))
        .unwrap_or_else(|| "unidentified".to_string());
    let path = dir.join(format!("{ident}.bin"));
    let result = data.source.open().and_then(|mut reader| {
        std::fs::create_dir_all(dir)?;
        let mut out = std::fs::File::create(&path)?;
        std::io::copy(&mut reader, &mut out)?;
        Ok(())
    });
    match result {
        Ok(()) => {
            hub.stats.record_materialized();
            tracing::info!(node = node.uri(), path = %path.display(), "materialized entity");
        }
        Err(err) => {
            tracing::warn!(node = node.uri(), error = %err, "materialization failed");
        }
    }
}

/// Describes the format node of every successful match (C5-facing side of
/// C3's results).
pub struct FormatNodeAnalyzer;

impl EntityAnalyzer for FormatNodeAnalyzer {
    fn name(&self) -> &'static str {
        "format-node"
    }

    fn claims(&self, entity: &Entity) -> bool {
        entity.kind() == EntityKind::Format
    }

    fn analyze(
        &self,
        entity: &Entity,
        _ctx: &AnalysisContext,
        hub: &AnalyzerHub<'_>,
    ) -> Result<AnalysisResult, AnalysisError> {
        let Entity::Format(fe) = entity else {
            return Ok(AnalysisResult::default());
        };
        let descriptor = hub.registry.get(fe.id);

        // Subclass dispatch may override media type, extension, and class.
        let (media, extension, class, xml_info) = match &fe.value {
            ParsedValue::Xml(info) => match xml::subclass_for(info) {
                Some(sub) => (
                    sub.media_type.to_string(),
                    sub.extension.to_string(),
                    Some(sub.class_iri),
                    Some(info),
                ),
                None => (
                    xml::synthetic_media_type(info.root_namespace.as_deref(), &info.root_local),
                    descriptor.extension().to_string(),
                    descriptor.class_iri(),
                    Some(info),
                ),
            },
            _ => (
                descriptor.media_type().to_string(),
                descriptor.extension().to_string(),
                descriptor.class_iri(),
                None,
            ),
        };

        let node = hub
            .factory
            .node_fragment(&fe.data_node, &format!("as-{}", descriptor.name()));
        let f = hub.factory;
        let emit = |r: std::io::Result<()>| r.map_err(AnalysisError::Emit);

        if let Some(class_iri) = class {
            emit(f.emit_type(&node, class_iri))?;
        }
        emit(f.emit_iri(&node, dcterms::FORMAT, &media_type_urn(&media)))?;
        emit(f.emit_literal(&node, nie::MIME_TYPE, LiteralValue::Str(media)))?;
        emit(f.emit_literal(&node, dsc::EXTENSION, LiteralValue::Str(extension)))?;

        match &fe.value {
            ParsedValue::Image(info) => {
                emit(f.emit_literal(&node, nfo::WIDTH, LiteralValue::UInt(info.width)))?;
                emit(f.emit_literal(&node, nfo::HEIGHT, LiteralValue::UInt(info.height)))?;
            }
            ParsedValue::Text(info) => {
                emit(f.emit_literal(
                    &node,
                    nie::CHARACTER_SET,
                    LiteralValue::Str(info.charset.to_string()),
                ))?;
            }
            ParsedValue::Xml(_) | ParsedValue::Container(_) => {}
        }

        if let Some(info) = xml_info {
            if let Some(version) = &info.version {
                emit(f.emit_literal(&node, dsc::XML_VERSION, LiteralValue::Str(version.clone())))?;
            }
            if let Some(encoding) = &info.encoding {
                emit(f.emit_literal(
                    &node,
                    dsc::XML_ENCODING,
                    LiteralValue::Str(encoding.clone()),
                ))?;
            }
            if let Some(standalone) = info.standalone {
                emit(f.emit_literal(&node, dsc::XML_STANDALONE, LiteralValue::Bool(standalone)))?;
            }
            if let Some(ns) = &info.root_namespace {
                emit(f.emit_iri(&node, dsc::ROOT_NAMESPACE, ns))?;
            }
            if let Some(public) = &info.doctype_public {
                emit(f.emit_literal(
                    &node,
                    dsc::DOCTYPE_PUBLIC,
                    LiteralValue::Str(public.clone()),
                ))?;
            }
            if let Some(system) = &info.doctype_system {
                emit(f.emit_literal(
                    &node,
                    dsc::DOCTYPE_SYSTEM,
                    LiteralValue::Str(system.clone()),
                ))?;
            }
        }

        Ok(AnalysisResult { node: Some(node), label: Some(descriptor.name().to_string()) })
    }
}
