//! Triple sinks and the built-in N-Quads / Turtle writers.
//!
//! # Scope
//! - `TripleSink` is the serializer boundary: the pipeline never formats
//!   syntax itself.
//! - Writers accept triples in any order; per-subject grouping in Turtle is
//!   purely cosmetic for consecutive triples.
//!
//! # Design Notes
//! - The sink is externally synchronized through [`SharedSink`]; writers
//!   themselves are single-threaded.
//! - Namespace events may arrive mid-stream (vocabularies register on first
//!   use); Turtle emits `@prefix` directives as they come, which Turtle 1.1
//!   permits.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

/// Object position of a triple.
#[derive(Clone, Debug, PartialEq)]
pub enum Term {
    Iri(String),
    Literal {
        lexical: String,
        datatype: Option<String>,
        lang: Option<String>,
    },
}

impl Term {
    /// Plain string literal.
    pub fn string(lexical: impl Into<String>) -> Self {
        Term::Literal { lexical: lexical.into(), datatype: None, lang: None }
    }

    /// Typed literal.
    pub fn typed(lexical: impl Into<String>, datatype: impl Into<String>) -> Self {
        Term::Literal {
            lexical: lexical.into(),
            datatype: Some(datatype.into()),
            lang: None,
        }
    }
}

/// Receiver for the emitted graph.
///
/// Implementations must accept triples in any order and tolerate repeated
/// namespace registrations.
pub trait TripleSink: Send {
    fn namespace(&mut self, prefix: &str, iri: &str) -> io::Result<()>;
    fn triple(
        &mut self,
        subject: &str,
        predicate: &str,
        object: &Term,
        graph: Option<&str>,
    ) -> io::Result<()>;
    fn finish(&mut self) -> io::Result<()>;
}

/// Externally synchronized sink handle shared across workers.
///
/// Every call takes the handler lock; a slow sink applies backpressure to
/// the analyzers instead of buffering triples internally.
#[derive(Clone)]
pub struct SharedSink(Arc<Mutex<Box<dyn TripleSink>>>);

impl SharedSink {
    pub fn new(sink: Box<dyn TripleSink>) -> Self {
        Self(Arc::new(Mutex::new(sink)))
    }

    pub fn namespace(&self, prefix: &str, iri: &str) -> io::Result<()> {
        self.lock()?.namespace(prefix, iri)
    }

    pub fn triple(
        &self,
        subject: &str,
        predicate: &str,
        object: &Term,
        graph: Option<&str>,
    ) -> io::Result<()> {
        self.lock()?.triple(subject, predicate, object, graph)
    }

    pub fn finish(&self) -> io::Result<()> {
        self.lock()?.finish()
    }

    fn lock(&self) -> io::Result<std::sync::MutexGuard<'_, Box<dyn TripleSink>>> {
        self.0
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "rdf sink lock poisoned"))
    }
}

fn write_iri(out: &mut impl Write, iri: &str) -> io::Result<()> {
    out.write_all(b"<")?;
    for c in iri.chars() {
        match c {
            '<' | '>' | '"' | '{' | '}' | '|' | '^' | '`' | '\\' | ' ' => {
                write!(out, "%{:02X}", c as u32)?;
            }
            c if (c as u32) < 0x20 => write!(out, "%{:02X}", c as u32)?,
            c => write!(out, "{c}")?,
        }
    }
    out.write_all(b">")
}

fn write_literal(out: &mut impl Write, lexical: &str) -> io::Result<()> {
    out.write_all(b"\"")?;
    for c in lexical.chars() {
        match c {
            '\\' => out.write_all(b"\\\\")?,
            '"' => out.write_all(b"\\\"")?,
            '\n' => out.write_all(b"\\n")?,
            '\r' => out.write_all(b"\\r")?,
            '\t' => out.write_all(b"\\t")?,
            c if (c as u32) < 0x20 => write!(out, "\\u{:04X}", c as u32)?,
            c => write!(out, "{c}")?,
        }
    }
    out.write_all(b"\"")
}

fn write_term(out: &mut impl Write, term: &Term) -> io::Result<()> {
    match term {
        Term::Iri(iri) => write_iri(out, iri),
        Term::Literal { lexical, datatype, lang } => {
            write_literal(out, lexical)?;
            if let Some(lang) = lang {
                write!(out, "@{lang}")?;
            } else if let Some(dt) = datatype {
                out.write_all(b"^^")?;
                write_iri(out, dt)?;
            }
            Ok(())
        }
    }
}

/// Line-oriented N-Quads writer.
pub struct NQuadsWriter<W: Write> {
    out: W,
}

impl<W: Write> NQuadsWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write + Send> TripleSink for NQuadsWriter<W> {
    fn namespace(&mut self, _prefix: &str, _iri: &str) -> io::Result<()> {
        // N-Quads has no prefix syntax.
        Ok(())
    }

    fn triple(
        &mut self,
        subject: &str,
        predicate: &str,
        object: &Term,
        graph: Option<&str>,
    ) -> io::Result<()> {
        write_iri(&mut self.out, subject)?;
        self.out.write_all(b" ")?;
        write_iri(&mut self.out, predicate)?;
        self.out.write_all(b" ")?;
        write_term(&mut self.out, object)?;
        if let Some(g) = graph {
            self.out.write_all(b" ")?;
            write_iri(&mut self.out, g)?;
        }
        self.out.write_all(b" .\n")
    }

    fn finish(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

/// Turtle writer with prefix compaction and consecutive-subject grouping.
pub struct TurtleWriter<W: Write> {
    out: W,
    prefixes: Vec<(String, String)>,
    open_subject: Option<String>,
}

impl<W: Write> TurtleWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out, prefixes: Vec::new(), open_subject: None }
    }

    fn compact(&self, iri: &str) -> Option<String> {
        for (prefix, ns) in &self.prefixes {
            if let Some(local) = iri.strip_prefix(ns.as_str()) {
                if !local.is_empty() && local.chars().all(is_pn_local_char) {
                    return Some(format!("{prefix}:{local}"));
                }
            }
        }
        None
    }

    fn write_resource(&mut self, iri: &str) -> io::Result<()> {
        match self.compact(iri) {
            Some(curie) => self.out.write_all(curie.as_bytes()),
            None => write_iri(&mut self.out, iri),
        }
    }

    fn close_open_subject(&mut self) -> io::Result<()> {
        if self.open_subject.take().is_some() {
            self.out.write_all(b" .\n")?;
        }
        Ok(())
    }
}

fn is_pn_local_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

impl<W: Write + Send> TripleSink for TurtleWriter<W> {
    fn namespace(&mut self, prefix: &str, iri: &str) -> io::Result<()> {
        if self.prefixes.iter().any(|(p, _)| p == prefix) {
            return Ok(());
        }
        self.close_open_subject()?;
        self.prefixes.push((prefix.to_string(), iri.to_string()));
        write!(self.out, "@prefix {prefix}: ")?;
        write_iri(&mut self.out, iri)?;
        self.out.write_all(b" .\n")
    }

    fn triple(
        &mut self,
        subject: &str,
        predicate: &str,
        object: &Term,
        _graph: Option<&str>,
    ) -> io::Result<()> {
        let same_subject = self.open_subject.as_deref() == Some(subject);
        if same_subject {
            self.out.write_all(b" ;\n    ")?;
        } else {
            self.close_open_subject()?;
            self.write_resource(subject)?;
            self.out.write_all(b" ")?;
            self.open_subject = Some(subject.to_string());
        }

        if predicate == crate::rdf::vocab::rdf::TYPE {
            self.out.write_all(b"a ")?;
        } else {
            self.write_resource(predicate)?;
            self.out.write_all(b" ")?;
        }

        match object {
            Term::Iri(iri) => self.write_resource(iri),
            Term::Literal { lexical, datatype, lang } => {
                write_literal(&mut self.out, lexical)?;
                if let Some(lang) = lang {
                    write!(self.out, "@{lang}")
                } else if let Some(dt) = datatype {
                    self.out.write_all(b"^^")?;
                    self.write_resource(dt)
                } else {
                    Ok(())
                }
            }
        }
    }

    fn finish(&mut self) -> io::Result<()> {
        self.close_open_subject()?;
        self.out.flush()
    }
}

/// In-memory sink for tests and the query tester.
#[derive(Default)]
pub struct VecSink {
    pub namespaces: Vec<(String, String)>,
    pub triples: Vec<(String, String, Term, Option<String>)>,
}

impl VecSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All objects emitted for a `(subject, predicate)` pair.
    pub fn objects(&self, subject: &str, predicate: &str) -> Vec<&Term> {
        self.triples
            .iter()
            .filter(|(s, p, _, _)| s == subject && p == predicate)
            .map(|(_, _, o, _)| o)
            .collect()
    }
}

impl TripleSink for VecSink {
    fn namespace(&mut self, prefix: &str, iri: &str) -> io::Result<()> {
        if !self.namespaces.iter().any(|(p, _)| p == prefix) {
            self.namespaces.push((prefix.to_string(), iri.to_string()));
        }
        Ok(())
    }

    fn triple(
        &mut self,
        subject: &str,
        predicate: &str,
        object: &Term,
        graph: Option<&str>,
    ) -> io::Result<()> {
        self.triples.push((
            subject.to_string(),
            predicate.to_string(),
            object.clone(),
            graph.map(str::to_string),
        ));
        Ok(())
    }

    fn finish(&mut self) -> io::Result<()> {
        Ok(())
    }
}
