//! High-level inspection pipeline: roots in, RDF out.
//!
//! # Scope
//! - Owns the registry, analyzer set, node factory, and run statistics.
//! - Schedules independent root entities on a small work-stealing pool;
//!   everything inside one root runs on the worker that claimed it, because
//!   steps sharing a source stream are serialized by construction.
//!
//! # Design Notes
//! - The RDF sink is the only shared mutable resource; it is synchronized
//!   by `SharedSink`'s handler lock, so a slow sink back-pressures workers
//!   instead of buffering triples.
//! - A failed root is recorded and logged; remaining roots still run.

use std::io;
use std::path::{Path, PathBuf};

use crossbeam_deque::{Injector, Steal};

use crate::analyze::{
    file::file_node_from_fs, AnalysisContext, AnalyzerHub, AnalyzerSet, CancellationToken, Entity,
    InspectReport, InspectStats,
};
use crate::config::{ConfigError, InspectorConfig};
use crate::error::AnalysisError;
use crate::format::FormatRegistry;
use crate::query::NodeQueryTester;
use crate::rdf::{NodeFactory, SharedSink, TripleSink};

/// Output syntax selector for the built-in writers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    NQuads,
    Turtle,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "nq" | "nquads" | "n-quads" => Ok(Self::NQuads),
            "ttl" | "turtle" => Ok(Self::Turtle),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}

/// The assembled extraction pipeline.
pub struct Inspector {
    config: InspectorConfig,
    registry: FormatRegistry,
    analyzers: AnalyzerSet,
    factory: NodeFactory,
    stats: InspectStats,
    tester: Option<NodeQueryTester>,
    extract_dir: Option<PathBuf>,
    cancel: CancellationToken,
}

impl Inspector {
    /// Build a pipeline over a triple sink with the default registry and
    /// analyzer stack. Fails fast on inconsistent configuration.
    pub fn new(config: InspectorConfig, sink: Box<dyn TripleSink>) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            registry: FormatRegistry::with_defaults(),
            analyzers: AnalyzerSet::with_defaults(),
            factory: NodeFactory::new(SharedSink::new(sink)),
            stats: InspectStats::new(),
            tester: None,
            extract_dir: None,
            cancel: CancellationToken::new(),
        })
    }

    /// Install a materialization filter and target directory.
    pub fn with_query(mut self, tester: NodeQueryTester, extract_dir: PathBuf) -> Self {
        self.tester = Some(tester);
        self.extract_dir = Some(extract_dir);
        self
    }

    /// Swap in a custom format registry.
    pub fn with_registry(mut self, registry: FormatRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Swap in a custom analyzer set.
    pub fn with_analyzers(mut self, analyzers: AnalyzerSet) -> Self {
        self.analyzers = analyzers;
        self
    }

    /// Token observers can use to cancel the run cooperatively.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Current counter snapshot.
    pub fn report(&self) -> InspectReport {
        self.stats.snapshot()
    }

    /// Inspect a set of root paths and flush the sink.
    ///
    /// Root paths must exist; anything below them is best-effort and
    /// recorded in the report instead of failing the run.
    pub fn inspect_paths(&self, paths: &[PathBuf]) -> io::Result<InspectReport> {
        let mut roots = Vec::with_capacity(paths.len());
        for path in paths {
            let meta = std::fs::metadata(path).map_err(|err| {
                io::Error::new(err.kind(), format!("{}: {err}", path.display()))
            })?;
            roots.push((path.clone(), meta));
        }

        let injector: Injector<(PathBuf, std::fs::Metadata)> = Injector::new();
        let root_count = roots.len();
        for root in roots {
            injector.push(root);
        }

        let threads = self.worker_count(root_count);
        std::thread::scope(|scope| {
            for _ in 0..threads {
                scope.spawn(|| loop {
                    match injector.steal() {
                        Steal::Success((path, meta)) => self.process_root(&path, &meta),
                        Steal::Empty => break,
                        Steal::Retry => {}
                    }
                });
            }
        });

        self.factory.finish()?;
        Ok(self.stats.snapshot())
    }

    fn worker_count(&self, roots: usize) -> usize {
        let configured = if self.config.threads > 0 {
            self.config.threads
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        };
        configured.clamp(1, roots.max(1))
    }

    fn process_root(&self, path: &Path, meta: &std::fs::Metadata) {
        let span = tracing::info_span!("root", path = %path.display());
        let _guard = span.enter();

        let hub = AnalyzerHub {
            config: &self.config,
            registry: &self.registry,
            factory: &self.factory,
            stats: &self.stats,
            analyzers: &self.analyzers,
            tester: self.tester.as_ref(),
            extract_dir: self.extract_dir.as_deref(),
        };
        let ctx = AnalysisContext::root(
            path.display().to_string(),
            &self.config,
            self.cancel.clone(),
        );
        let node = file_node_from_fs(path, meta, path.display().to_string());
        let entity = if meta.is_dir() {
            Entity::Directory(node)
        } else {
            Entity::File(node)
        };

        match hub.analyze(&entity, &ctx) {
            Ok(_) => {}
            Err(AnalysisError::Cancelled) => {
                self.stats.record_skip(crate::analyze::SkipReason::Cancelled);
                tracing::info!("root analysis cancelled");
            }
            Err(err) => {
                self.stats.record_analyzer_error();
                tracing::error!(error = %err, "root analysis failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_format_parses() {
        assert_eq!("nq".parse::<OutputFormat>().unwrap(), OutputFormat::NQuads);
        assert_eq!("turtle".parse::<OutputFormat>().unwrap(), OutputFormat::Turtle);
        assert!("rdfxml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn missing_root_is_an_io_error() {
        let inspector = Inspector::new(
            InspectorConfig::default(),
            Box::new(crate::rdf::VecSink::new()),
        )
        .unwrap();
        let err = inspector
            .inspect_paths(&[PathBuf::from("/definitely/not/here")])
            .unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here"));
    }
}
