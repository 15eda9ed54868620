//! Semantic file inspector emitting an RDF description graph.
//!
//! The pipeline hashes, format-detects, and recursively descends files and
//! containers, linking every discovered media object, sub-object, hash,
//! format, and metadata property under content-addressed identifiers:
//! - A single-pass stream multiplexer feeds every hash algorithm and the
//!   header matcher from one sequential read.
//! - A signature-trie registry narrows format candidates before any
//!   detector runs.
//! - Container matches (zip, tar, gzip) re-enter the pipeline per member
//!   with parent linkage, budgets, and cycle avoidance.
//! - Node identities derive from content hashes, container-relative paths,
//!   or typed keys, so independent runs over the same data emit the same
//!   graph.
//!
//! High-level flow (single entity):
//! 1) Open the hashing multiplexer and read the head window.
//! 2) Classify binary vs text; collect format candidates from the trie.
//! 3) Run detectors in specificity order over the shared window.
//! 4) Finalize digests, mint the node, emit identity/size/hash triples.
//! 5) Route format matches and container members back through the
//!    dispatcher.
//!
//! Pipeline flow (roots):
//! Path -> Walker -> Entities -> Analyzers -> Triples -> Sink.

pub mod analyze;
pub mod config;
pub mod error;
pub mod format;
pub mod hash;
pub mod pipeline;
pub mod query;
pub mod rdf;

pub use analyze::{AnalysisContext, AnalyzerSet, CancellationToken, InspectReport, InspectStats};
pub use config::InspectorConfig;
pub use error::{AnalysisError, FormatError, StreamError};
pub use format::{ByteSource, FormatRegistry};
pub use hash::{Digests, HashAlgorithmId, HashStream};
pub use pipeline::{Inspector, OutputFormat};
pub use query::NodeQueryTester;
pub use rdf::{LinkedNode, NodeFactory, NQuadsWriter, TripleSink, TurtleWriter};
