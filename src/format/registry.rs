//! Format registry and header matcher.
//!
//! # Invariants
//! - Candidate order is deterministic: longer signatures first, byte
//!   signatures before signatureless formats, registration order breaking
//!   ties.
//! - A lookup walks at most `|header|` trie nodes.
//!
//! # Design Notes
//! - The trie indexes offset-zero signatures only; formats whose magic sits
//!   deeper (tar's `ustar` at 257) register without a signature and rely on
//!   their `check_header`, which places them after all signature formats.
//! - `check_header` vetoes a candidate; it never promotes one.

use ahash::AHashMap;

use super::FileFormat;

/// Index of a registered format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FormatId(pub u16);

struct TrieNode {
    children: AHashMap<u8, u32>,
    terminals: Vec<FormatId>,
}

impl TrieNode {
    fn new() -> Self {
        Self { children: AHashMap::new(), terminals: Vec::new() }
    }
}

/// Prefix trie over format signatures plus the signatureless tail set.
pub struct FormatRegistry {
    formats: Vec<Box<dyn FileFormat>>,
    nodes: Vec<TrieNode>,
    unsigned: Vec<FormatId>,
    max_signature_len: usize,
}

impl FormatRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self {
            formats: Vec::new(),
            nodes: vec![TrieNode::new()],
            unsigned: Vec::new(),
            max_signature_len: 0,
        }
    }

    /// Registry with the built-in detector set.
    pub fn with_defaults() -> Self {
        let mut reg = Self::new();
        reg.register(Box::new(super::png::PngFormat));
        reg.register(Box::new(super::zip::ZipFormat));
        reg.register(Box::new(super::gzip::GzipFormat));
        reg.register(Box::new(super::tar::TarFormat));
        reg.register(Box::new(super::xml::XmlFormat));
        reg.register(Box::new(super::text::TextFormat));
        reg
    }

    /// Register a format; later registrations sort after earlier ones at
    /// equal specificity.
    pub fn register(&mut self, format: Box<dyn FileFormat>) -> FormatId {
        assert!(self.formats.len() < u16::MAX as usize);
        let id = FormatId(self.formats.len() as u16);
        match format.signature() {
            Some(sig) if !sig.is_empty() => {
                self.max_signature_len = self.max_signature_len.max(sig.len());
                let mut node = 0usize;
                for &b in sig {
                    let next = match self.nodes[node].children.get(&b) {
                        Some(&n) => n as usize,
                        None => {
                            let n = self.nodes.len();
                            self.nodes.push(TrieNode::new());
                            self.nodes[node].children.insert(b, n as u32);
                            n
                        }
                    };
                    node = next;
                }
                self.nodes[node].terminals.push(id);
            }
            _ => self.unsigned.push(id),
        }
        self.formats.push(format);
        id
    }

    /// Descriptor for a registered id.
    #[inline]
    pub fn get(&self, id: FormatId) -> &dyn FileFormat {
        self.formats[id.0 as usize].as_ref()
    }

    /// Number of registered formats.
    pub fn len(&self) -> usize {
        self.formats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.formats.is_empty()
    }

    /// Longest registered offset-zero signature.
    pub fn max_signature_len(&self) -> usize {
        self.max_signature_len
    }

    /// Candidate formats for a head window, most specific first, vetoed by
    /// binary/text gating and each format's `check_header`.
    pub fn candidates(&self, header: &[u8], is_short: bool, is_binary: bool) -> Vec<FormatId> {
        let mut out = Vec::new();

        // Walk the trie; deeper terminals are more specific, so collect on
        // the way down and reverse.
        let mut matched = Vec::new();
        let mut node = 0usize;
        for &b in header {
            let Some(&next) = self.nodes[node].children.get(&b) else {
                break;
            };
            node = next as usize;
            for &id in &self.nodes[node].terminals {
                matched.push(id);
            }
        }
        matched.reverse();

        for id in matched.into_iter().chain(self.unsigned.iter().copied()) {
            let format = self.get(id);
            if format.binary_required() && !is_binary {
                continue;
            }
            if !format.binary_required() && is_binary {
                continue;
            }
            if !format.check_header(header, is_short, is_binary) {
                continue;
            }
            out.push(id);
        }
        out
    }
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
