//! Entity model and the analyzer dispatcher.
//!
//! # Scope
//! - The `Entity` union every analyzer consumes.
//! - Kind-based dispatch: every analyzer claiming an entity runs in
//!   registration order; the first produced node is primary and later
//!   analyzers observe it through `ctx.node`.
//! - Parent links: when the context carries a link predicate, the
//!   dispatcher emits `parent --link--> node` once per entity.
//!
//! # Design Notes
//! - A failing analyzer is recorded and logged; the remaining analyzers
//!   still run and the parent receives whatever partial node exists.
//!   Cancellation is the only error that unwinds.

pub mod container;
pub mod context;
pub mod data;
pub mod file;
pub mod outcome;

pub use context::{AnalysisContext, CancellationToken, RootBudget, TraversalDirective, VisitChain};
pub use outcome::{InspectReport, InspectStats, SkipReason};

use std::path::Path;

use chrono::{DateTime, Utc};

use crate::config::InspectorConfig;
use crate::error::AnalysisError;
use crate::format::{ByteSource, FormatId, FormatRegistry, ParsedValue};
use crate::query::NodeQueryTester;
use crate::rdf::{LinkedNode, NodeFactory};

/// Role of a file-like entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileKind {
    Regular,
    ArchiveItem,
    Embedded,
    Directory,
}

/// A named file-like entity (filesystem file or container member).
#[derive(Clone, Debug)]
pub struct FileNode {
    pub name: String,
    /// Virtual display path ("outer.zip::inner/file.txt").
    pub path: String,
    pub kind: FileKind,
    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
    pub accessed: Option<DateTime<Utc>>,
    pub len: Option<u64>,
    /// Content, absent for directories.
    pub source: Option<ByteSource>,
    /// Real filesystem path, present for walkable directories.
    pub fs_path: Option<std::path::PathBuf>,
}

/// An opaque byte blob entering the data pipeline.
#[derive(Clone, Debug)]
pub struct DataObject {
    pub source: ByteSource,
    pub declared_name: Option<String>,
}

/// A successful format match flowing back through the dispatcher.
#[derive(Debug)]
pub struct FormatEntity {
    pub id: FormatId,
    pub value: ParsedValue,
    /// Content node of the data object this format was detected on.
    pub data_node: LinkedNode,
    /// Source of that data object, for container descent.
    pub source: ByteSource,
}

/// Anything the pipeline describes.
#[derive(Debug)]
pub enum Entity {
    Data(DataObject),
    File(FileNode),
    Directory(FileNode),
    Format(FormatEntity),
}

/// Coarse dispatch kind of an entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntityKind {
    Data,
    File,
    Directory,
    Format,
}

impl Entity {
    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Data(_) => EntityKind::Data,
            Entity::File(_) => EntityKind::File,
            Entity::Directory(_) => EntityKind::Directory,
            Entity::Format(_) => EntityKind::Format,
        }
    }
}

/// Outcome of one analyzer invocation.
#[derive(Clone, Debug, Default)]
pub struct AnalysisResult {
    /// Node describing the entity, if one was minted.
    pub node: Option<LinkedNode>,
    /// Human-oriented label for the entity.
    pub label: Option<String>,
}

/// Everything an analyzer may reach while running.
#[derive(Clone, Copy)]
pub struct AnalyzerHub<'a> {
    pub config: &'a InspectorConfig,
    pub registry: &'a FormatRegistry,
    pub factory: &'a NodeFactory,
    pub stats: &'a InspectStats,
    pub analyzers: &'a AnalyzerSet,
    pub tester: Option<&'a NodeQueryTester>,
    pub extract_dir: Option<&'a Path>,
}

impl AnalyzerHub<'_> {
    /// Recursively analyze a sub-entity.
    pub fn analyze(
        &self,
        entity: &Entity,
        ctx: &AnalysisContext,
    ) -> Result<AnalysisResult, AnalysisError> {
        self.analyzers.dispatch(entity, ctx, self)
    }
}

/// Analyzer plug-in contract, registered by entity kind.
pub trait EntityAnalyzer: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// True when this analyzer wants the entity.
    fn claims(&self, entity: &Entity) -> bool;

    /// Analyze one entity. `Ok` with `node: None` means "not applicable".
    fn analyze(
        &self,
        entity: &Entity,
        ctx: &AnalysisContext,
        hub: &AnalyzerHub<'_>,
    ) -> Result<AnalysisResult, AnalysisError>;
}

/// Ordered analyzer registry.
pub struct AnalyzerSet {
    entries: Vec<Box<dyn EntityAnalyzer>>,
}

impl AnalyzerSet {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// The built-in analyzer stack, in dependency order.
    pub fn with_defaults() -> Self {
        let mut set = Self::new();
        set.register(Box::new(file::FileAnalyzer));
        set.register(Box::new(file::DirectoryAnalyzer));
        set.register(Box::new(data::DataAnalyzer));
        set.register(Box::new(data::FormatNodeAnalyzer));
        set.register(Box::new(container::ContainerAnalyzer::default()));
        set
    }

    pub fn register(&mut self, analyzer: Box<dyn EntityAnalyzer>) {
        self.entries.push(analyzer);
    }

    /// Run every claiming analyzer in registration order and merge results.
    pub fn dispatch(
        &self,
        entity: &Entity,
        ctx: &AnalysisContext,
        hub: &AnalyzerHub<'_>,
    ) -> Result<AnalysisResult, AnalysisError> {
        if ctx.cancel.is_cancelled() {
            return Err(AnalysisError::Cancelled);
        }

        let mut merged = AnalysisResult::default();
        let mut ctx = ctx.clone();

        for analyzer in &self.entries {
            if !analyzer.claims(entity) {
                continue;
            }
            match analyzer.analyze(entity, &ctx, hub) {
                Ok(result) => {
                    if merged.node.is_none() {
                        if let Some(node) = &result.node {
                            ctx.node = Some(node.clone());
                            merged.node = Some(node.clone());
                        }
                    }
                    if merged.label.is_none() {
                        merged.label = result.label;
                    }
                }
                Err(err) if err.is_cancelled() => return Err(AnalysisError::Cancelled),
                Err(err) => {
                    hub.stats.record_analyzer_error();
                    tracing::warn!(
                        analyzer = analyzer.name(),
                        path = %ctx.match_ctx.path,
                        error = %err,
                        "analyzer failed; continuing with remaining analyzers"
                    );
                }
            }
        }

        if let (Some(node), Some(parent), Some(link)) = (&merged.node, &ctx.parent, ctx.link) {
            hub.factory
                .emit_node(parent, link, node)
                .map_err(AnalysisError::Emit)?;
        }

        Ok(merged)
    }
}

impl Default for AnalyzerSet {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rdf::{SharedSink, VecSink};
    use std::io;
    use std::sync::{Arc, Mutex};

    struct Capture(Arc<Mutex<VecSink>>);

    impl crate::rdf::TripleSink for Capture {
        fn namespace(&mut self, prefix: &str, iri: &str) -> io::Result<()> {
            self.0.lock().unwrap().namespace(prefix, iri)
        }
        fn triple(
            &mut self,
            s: &str,
            p: &str,
            o: &crate::rdf::Term,
            g: Option<&str>,
        ) -> io::Result<()> {
            self.0.lock().unwrap().triple(s, p, o, g)
        }
        fn finish(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct Minting(&'static str);

    impl EntityAnalyzer for Minting {
        fn name(&self) -> &'static str {
            "minting"
        }
        fn claims(&self, entity: &Entity) -> bool {
            entity.kind() == EntityKind::Data
        }
        fn analyze(
            &self,
            _entity: &Entity,
            _ctx: &AnalysisContext,
            hub: &AnalyzerHub<'_>,
        ) -> Result<AnalysisResult, AnalysisError> {
            Ok(AnalysisResult {
                node: Some(hub.factory.node(self.0)),
                label: None,
            })
        }
    }

    struct Failing;

    impl EntityAnalyzer for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }
        fn claims(&self, entity: &Entity) -> bool {
            entity.kind() == EntityKind::Data
        }
        fn analyze(
            &self,
            _entity: &Entity,
            _ctx: &AnalysisContext,
            _hub: &AnalyzerHub<'_>,
        ) -> Result<AnalysisResult, AnalysisError> {
            Err(AnalysisError::ResourceLimit { what: "synthetic" })
        }
    }

    /// Secondary analyzer that records whether it saw the primary node.
    struct SeesPrimary(Arc<Mutex<Option<String>>>);

    impl EntityAnalyzer for SeesPrimary {
        fn name(&self) -> &'static str {
            "sees-primary"
        }
        fn claims(&self, entity: &Entity) -> bool {
            entity.kind() == EntityKind::Data
        }
        fn analyze(
            &self,
            _entity: &Entity,
            ctx: &AnalysisContext,
            _hub: &AnalyzerHub<'_>,
        ) -> Result<AnalysisResult, AnalysisError> {
            *self.0.lock().unwrap() = ctx.node.as_ref().map(|n| n.uri().to_string());
            Ok(AnalysisResult::default())
        }
    }

    fn test_entity() -> Entity {
        Entity::Data(DataObject {
            source: ByteSource::from_bytes(b"x".to_vec()),
            declared_name: None,
        })
    }

    #[test]
    fn failing_analyzer_does_not_stop_later_ones() {
        let store = Arc::new(Mutex::new(VecSink::new()));
        let factory = NodeFactory::new(SharedSink::new(Box::new(Capture(store.clone()))));
        let config = InspectorConfig::default();
        let registry = FormatRegistry::with_defaults();
        let stats = InspectStats::new();

        let mut set = AnalyzerSet::new();
        set.register(Box::new(Failing));
        set.register(Box::new(Minting("urn:test:after-failure")));

        let hub = AnalyzerHub {
            config: &config,
            registry: &registry,
            factory: &factory,
            stats: &stats,
            analyzers: &set,
            tester: None,
            extract_dir: None,
        };
        let ctx = AnalysisContext::root("t", &config, CancellationToken::new());
        let result = set.dispatch(&test_entity(), &ctx, &hub).unwrap();
        assert_eq!(result.node.unwrap().uri(), "urn:test:after-failure");
        assert_eq!(stats.snapshot().analyzer_errors, 1);
    }

    #[test]
    fn secondary_analyzer_sees_primary_node_and_parent_link_emitted() {
        let store = Arc::new(Mutex::new(VecSink::new()));
        let factory = NodeFactory::new(SharedSink::new(Box::new(Capture(store.clone()))));
        let config = InspectorConfig::default();
        let registry = FormatRegistry::with_defaults();
        let stats = InspectStats::new();

        let seen = Arc::new(Mutex::new(None));
        let mut set = AnalyzerSet::new();
        set.register(Box::new(Minting("urn:test:primary")));
        set.register(Box::new(SeesPrimary(seen.clone())));

        let hub = AnalyzerHub {
            config: &config,
            registry: &registry,
            factory: &factory,
            stats: &stats,
            analyzers: &set,
            tester: None,
            extract_dir: None,
        };
        let parent = factory.node("urn:test:parent");
        let ctx = AnalysisContext::root("t", &config, CancellationToken::new())
            .with_parent_link(parent, crate::rdf::vocab::dcterms::HAS_PART);
        set.dispatch(&test_entity(), &ctx, &hub).unwrap();

        assert_eq!(seen.lock().unwrap().as_deref(), Some("urn:test:primary"));
        let sink = store.lock().unwrap();
        assert!(sink.triples.iter().any(|(s, p, o, _)| {
            s == "urn:test:parent"
                && p == crate::rdf::vocab::dcterms::HAS_PART
                && *o == crate::rdf::Term::Iri("urn:test:primary".into())
        }));
    }

    #[test]
    fn cancellation_unwinds_immediately() {
        let store = Arc::new(Mutex::new(VecSink::new()));
        let factory = NodeFactory::new(SharedSink::new(Box::new(Capture(store))));
        let config = InspectorConfig::default();
        let registry = FormatRegistry::with_defaults();
        let stats = InspectStats::new();
        let set = AnalyzerSet::new();
        let hub = AnalyzerHub {
            config: &config,
            registry: &registry,
            factory: &factory,
            stats: &stats,
            analyzers: &set,
            tester: None,
            extract_dir: None,
        };
        let token = CancellationToken::new();
        token.cancel();
        let ctx = AnalysisContext::root("t", &config, token);
        assert!(matches!(
            set.dispatch(&test_entity(), &ctx, &hub),
            Err(AnalysisError::Cancelled)
        ));
    }
}
