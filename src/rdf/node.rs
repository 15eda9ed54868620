//! Linked-node identities, graph routing, and namespace bookkeeping.
//!
//! # Invariants
//! - Two [`LinkedNode`] values with equal URI denote the same subject; the
//!   sink may merge them freely.
//! - Node URIs are pure functions of their inputs (digests, parent URI plus
//!   segment, or a typed key); independent runs mint identical identifiers.
//! - A vocabulary namespace is registered with every graph handler exactly
//!   once, on first use.
//!
//! # Design Notes
//! - The factory holds the handlers; handlers never call back into the
//!   factory. Routing uses a back-index from graph URI to handler id only.
//! - Literal safety is enforced here, at the single choke point every string
//!   literal passes through.

use std::io;
use std::sync::{Arc, Mutex};

use ahash::{AHashMap, AHashSet};

use crate::hash::{Digests, HashAlgorithmId};
use crate::rdf::literal::{is_safe_string, json_wrap, LiteralValue};
use crate::rdf::vocab::{known_prefix, rdf, split_iri, xsd};
use crate::rdf::writer::{SharedSink, Term};

/// Index of a graph handler inside the factory.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GraphId(u16);

impl GraphId {
    /// The default graph handler.
    pub const DEFAULT: GraphId = GraphId(0);
}

/// Identity of an entity in the output graph.
///
/// Value-like and freely shared; cloning never duplicates the URI storage.
#[derive(Clone, Debug)]
pub struct LinkedNode {
    uri: Arc<str>,
    graph: GraphId,
}

impl LinkedNode {
    #[inline]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    #[inline]
    pub fn graph(&self) -> GraphId {
        self.graph
    }
}

impl PartialEq for LinkedNode {
    fn eq(&self, other: &Self) -> bool {
        self.uri == other.uri
    }
}

impl Eq for LinkedNode {}

struct FactoryState {
    /// namespace URI -> assigned prefix
    prefixes: AHashMap<String, String>,
    prefix_counter: u32,
    /// URIs whose full description has begun (dedupe for overlapping matches).
    described: AHashSet<Box<str>>,
}

/// Mints and deduplicates node identities and routes triples to handlers.
pub struct NodeFactory {
    handlers: Vec<SharedSink>,
    /// Graph URI per handler; `None` for the default graph.
    graph_uris: Vec<Option<String>>,
    /// Back-index: graph URI -> handler id.
    graph_index: AHashMap<String, GraphId>,
    state: Mutex<FactoryState>,
}

impl NodeFactory {
    pub fn new(default_handler: SharedSink) -> Self {
        Self {
            handlers: vec![default_handler],
            graph_uris: vec![None],
            graph_index: AHashMap::new(),
            state: Mutex::new(FactoryState {
                prefixes: AHashMap::new(),
                prefix_counter: 0,
                described: AHashSet::new(),
            }),
        }
    }

    /// Register a named graph with its own handler. Later nodes minted with
    /// [`NodeFactory::node_in`] for this graph route there.
    pub fn add_named_graph(&mut self, graph_uri: &str, handler: SharedSink) -> GraphId {
        let id = GraphId(self.handlers.len() as u16);
        self.handlers.push(handler);
        self.graph_uris.push(Some(graph_uri.to_string()));
        self.graph_index.insert(graph_uri.to_string(), id);
        id
    }

    /// Handler id for a graph URI; default when unregistered.
    pub fn graph_for(&self, graph_uri: &str) -> GraphId {
        self.graph_index
            .get(graph_uri)
            .copied()
            .unwrap_or(GraphId::DEFAULT)
    }

    /// Node in the default graph.
    pub fn node(&self, iri: impl Into<Arc<str>>) -> LinkedNode {
        LinkedNode { uri: iri.into(), graph: GraphId::DEFAULT }
    }

    /// Node routed to a specific graph handler.
    pub fn node_in(&self, iri: impl Into<Arc<str>>, graph: GraphId) -> LinkedNode {
        LinkedNode { uri: iri.into(), graph }
    }

    /// Content-addressed node from the preferred identity digest.
    ///
    /// Falls back through the supported algorithms when the preferred one was
    /// not computed. `None` when no digest is available at all.
    pub fn node_from_digests(
        &self,
        identity: HashAlgorithmId,
        digests: &Digests,
    ) -> Option<LinkedNode> {
        if let Some(d) = digests.get(identity) {
            return Some(self.node(identity.uri_for(d)));
        }
        for algo in HashAlgorithmId::all() {
            if let Some(d) = digests.get(algo) {
                return Some(self.node(algo.uri_for(d)));
            }
        }
        None
    }

    /// Container-relative child node: `parent/segment` with the segment
    /// percent-encoded. The child inherits the parent's graph.
    pub fn node_relative(&self, parent: &LinkedNode, segment: &str) -> LinkedNode {
        let mut uri = String::with_capacity(parent.uri.len() + segment.len() + 1);
        uri.push_str(&parent.uri);
        if !uri.ends_with('/') {
            uri.push('/');
        }
        encode_segment(segment, &mut uri);
        LinkedNode { uri: uri.into(), graph: parent.graph }
    }

    /// Fragment node under a parent: `parent#fragment`.
    pub fn node_fragment(&self, parent: &LinkedNode, fragment: &str) -> LinkedNode {
        let base = match parent.uri.find('#') {
            // Nested fragments collapse onto the base resource.
            Some(cut) => &parent.uri[..cut],
            None => &parent.uri,
        };
        let mut uri = String::with_capacity(base.len() + fragment.len() + 1);
        uri.push_str(base);
        uri.push('#');
        encode_segment(fragment, &mut uri);
        LinkedNode { uri: uri.into(), graph: parent.graph }
    }

    /// Structural node from a typed key. `None` from the formatter means
    /// "no identity available".
    pub fn node_from_key<T>(
        &self,
        formatter: impl Fn(&T) -> Option<String>,
        value: &T,
    ) -> Option<LinkedNode> {
        formatter(value).map(|iri| self.node(iri))
    }

    /// Marks a node's description as started. Returns `false` when another
    /// description of the same URI already ran, so overlapping format
    /// matches and repeated container references collapse to one subtree.
    pub fn begin_description(&self, node: &LinkedNode) -> bool {
        let mut state = match self.state.lock() {
            Ok(s) => s,
            Err(poisoned) => poisoned.into_inner(),
        };
        state.described.insert(Box::from(node.uri()))
    }

    /// `rdf:type` triple.
    pub fn emit_type(&self, node: &LinkedNode, class_iri: &str) -> io::Result<()> {
        self.ensure_namespace(rdf::TYPE)?;
        self.ensure_namespace(class_iri)?;
        self.route(node, rdf::TYPE, &Term::Iri(class_iri.to_string()))
    }

    /// Object-property triple to another node.
    pub fn emit_node(
        &self,
        node: &LinkedNode,
        predicate: &str,
        object: &LinkedNode,
    ) -> io::Result<()> {
        self.ensure_namespace(predicate)?;
        self.route(node, predicate, &Term::Iri(object.uri().to_string()))
    }

    /// Object-property triple to a raw IRI.
    pub fn emit_iri(&self, node: &LinkedNode, predicate: &str, iri: &str) -> io::Result<()> {
        self.ensure_namespace(predicate)?;
        self.route(node, predicate, &Term::Iri(iri.to_string()))
    }

    /// Typed-literal triple from the closed literal union. Unsafe strings
    /// are wrapped as `rdf:JSON` losslessly.
    pub fn emit_literal(
        &self,
        node: &LinkedNode,
        predicate: &str,
        value: LiteralValue,
    ) -> io::Result<()> {
        self.ensure_namespace(predicate)?;
        let term = match &value {
            LiteralValue::Str(s) if !is_safe_string(s) => {
                let (lexical, datatype) = json_wrap(s);
                self.ensure_namespace(datatype)?;
                Term::typed(lexical, datatype)
            }
            LiteralValue::Str(s) => Term::string(s.clone()),
            other => {
                let datatype = other.datatype();
                self.ensure_namespace(datatype)?;
                Term::typed(other.lexical(), datatype)
            }
        };
        self.route(node, predicate, &term)
    }

    /// Triple with an explicit datatype (e.g. `xsd:base64Binary` digests).
    pub fn emit_typed(
        &self,
        node: &LinkedNode,
        predicate: &str,
        lexical: impl Into<String>,
        datatype: &str,
    ) -> io::Result<()> {
        self.ensure_namespace(predicate)?;
        self.ensure_namespace(datatype)?;
        self.route(node, predicate, &Term::typed(lexical.into(), datatype))
    }

    /// Flush and close every handler.
    pub fn finish(&self) -> io::Result<()> {
        for handler in &self.handlers {
            handler.finish()?;
        }
        Ok(())
    }

    fn route(&self, node: &LinkedNode, predicate: &str, object: &Term) -> io::Result<()> {
        let idx = node.graph.0 as usize;
        let handler = &self.handlers[idx];
        let graph = self.graph_uris[idx].as_deref();
        handler.triple(node.uri(), predicate, object, graph)
    }

    /// Register the namespace of `iri` (if it has one) with every handler,
    /// assigning a prefix on first use.
    fn ensure_namespace(&self, iri: &str) -> io::Result<()> {
        let Some((ns, _)) = split_iri(iri) else {
            return Ok(());
        };
        let prefix = {
            let mut state = match self.state.lock() {
                Ok(s) => s,
                Err(poisoned) => poisoned.into_inner(),
            };
            if state.prefixes.contains_key(ns) {
                return Ok(());
            }
            let prefix = match known_prefix(ns) {
                Some(p) => p.to_string(),
                None => {
                    let p = format!("ns{}", state.prefix_counter);
                    state.prefix_counter += 1;
                    p
                }
            };
            state.prefixes.insert(ns.to_string(), prefix.clone());
            prefix
        };
        for handler in &self.handlers {
            handler.namespace(&prefix, ns)?;
        }
        Ok(())
    }
}

// Percent-encode a path/fragment segment so the result stays one URI token.
fn encode_segment(segment: &str, out: &mut String) {
    for b in segment.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' => out.push(b as char),
            b'-' | b'.' | b'_' | b'~' | b'!' | b'$' | b'&' | b'\'' | b'(' | b')' | b'*'
            | b'+' | b',' | b';' | b'=' | b':' | b'@' => out.push(b as char),
            other => crate::rdf::vocab::push_pct(out, other),
        }
    }
}

/// Datatype IRI helper for base64 digest literals.
pub const BASE64_BINARY: &str = xsd::BASE64_BINARY;
