//! RDF output layer: vocabularies, literals, node identities, writers.

pub mod literal;
pub mod node;
pub mod vocab;
pub mod writer;

pub use literal::{is_safe_string, LiteralValue};
pub use node::{GraphId, LinkedNode, NodeFactory};
pub use writer::{NQuadsWriter, SharedSink, Term, TripleSink, TurtleWriter, VecSink};
