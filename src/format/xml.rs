//! XML document dispatch: declaration, DOCTYPE identifiers, root namespace.
//!
//! # Scope
//! XML gets a dedicated path: the root element's namespace URI and the
//! DOCTYPE PUBLIC identifier select a subclass (SVG, XHTML, ...) from a
//! declarative table; unknown namespaces synthesize a media type so similar
//! documents still group together.
//!
//! # Design Notes
//! - The detector is speculative: malformed input vetoes the match
//!   (`Ok(None)`) instead of reporting corruption, because plain text that
//!   merely starts with `<` reaches this detector too.
//! - Parsing stops at the root element; the document body is never read.

use std::io::{BufReader, Read};

use quick_xml::events::Event;
use quick_xml::name::ResolveResult;
use quick_xml::reader::NsReader;

use crate::error::FormatError;
use crate::format::{
    FileFormat, FormatProbe, MatchContext, ParsedValue, XmlDocumentInfo,
};

/// A known XML vocabulary, keyed by root namespace or DOCTYPE PUBLIC id.
pub struct XmlSubclass {
    pub name: &'static str,
    pub root_namespace: Option<&'static str>,
    pub public_prefix: Option<&'static str>,
    pub media_type: &'static str,
    pub extension: &'static str,
    pub class_iri: &'static str,
}

/// Declarative subclass table consulted after a successful root parse.
pub const XML_SUBCLASSES: &[XmlSubclass] = &[
    XmlSubclass {
        name: "svg",
        root_namespace: Some("http://www.w3.org/2000/svg"),
        public_prefix: Some("-//W3C//DTD SVG"),
        media_type: "image/svg+xml",
        extension: "svg",
        class_iri: crate::rdf::vocab::dsc::SVG_DOCUMENT,
    },
    XmlSubclass {
        name: "xhtml",
        root_namespace: Some("http://www.w3.org/1999/xhtml"),
        public_prefix: Some("-//W3C//DTD XHTML"),
        media_type: "application/xhtml+xml",
        extension: "xhtml",
        class_iri: crate::rdf::vocab::dsc::XHTML_DOCUMENT,
    },
];

/// Select the subclass for a parsed document, if any.
pub fn subclass_for(info: &XmlDocumentInfo) -> Option<&'static XmlSubclass> {
    XML_SUBCLASSES.iter().find(|sub| {
        if let (Some(want), Some(have)) = (sub.root_namespace, info.root_namespace.as_deref()) {
            if want == have {
                return true;
            }
        }
        if let (Some(prefix), Some(public)) = (sub.public_prefix, info.doctype_public.as_deref()) {
            if public.starts_with(prefix) {
                return true;
            }
        }
        false
    })
}

/// Synthesized media type for documents in an unknown namespace:
/// `application/x.ns.<reversed.host.path>.<root>+xml`.
pub fn synthetic_media_type(namespace: Option<&str>, root_local: &str) -> String {
    let mut out = String::from("application/x.ns.");
    if let Some(ns) = namespace {
        let rest = ns.split_once("://").map(|(_, r)| r).unwrap_or(ns);
        let (host, path) = match rest.split_once('/') {
            Some((h, p)) => (h, Some(p)),
            None => (rest, None),
        };
        for part in host.split('.').rev() {
            push_token(&mut out, part);
            out.push('.');
        }
        if let Some(path) = path {
            for part in path.split(['/', ':']).filter(|p| !p.is_empty()) {
                push_token(&mut out, part);
                out.push('.');
            }
        }
    }
    push_token(&mut out, root_local);
    out.push_str("+xml");
    out
}

fn push_token(out: &mut String, token: &str) {
    for c in token.chars() {
        if c.is_ascii_alphanumeric() || c == '-' {
            out.push(c.to_ascii_lowercase());
        } else {
            out.push('-');
        }
    }
}

/// Generic XML document format descriptor.
pub struct XmlFormat;

impl FileFormat for XmlFormat {
    fn name(&self) -> &'static str {
        "xml"
    }

    fn media_type(&self) -> &'static str {
        "application/xml"
    }

    fn extension(&self) -> &'static str {
        "xml"
    }

    fn binary_required(&self) -> bool {
        false
    }

    fn class_iri(&self) -> Option<&'static str> {
        Some(crate::rdf::vocab::dsc::XML_DOCUMENT)
    }

    fn check_header(&self, header: &[u8], _is_short: bool, is_binary: bool) -> bool {
        if is_binary {
            return false;
        }
        let mut rest = header.strip_prefix(&[0xEF, 0xBB, 0xBF][..]).unwrap_or(header);
        while let Some((&b, tail)) = rest.split_first() {
            if b.is_ascii_whitespace() {
                rest = tail;
            } else {
                break;
            }
        }
        match rest {
            [b'<', next, ..] => {
                matches!(next, b'?' | b'!') || next.is_ascii_alphabetic() || *next == b'_'
            }
            _ => false,
        }
    }

    fn parse(
        &self,
        probe: &FormatProbe<'_>,
        _ctx: &MatchContext,
    ) -> Result<Option<ParsedValue>, FormatError> {
        let reader = probe.source.open()?.take(probe.max_parse_bytes);
        let mut xml = NsReader::from_reader(BufReader::new(reader));
        let mut info = XmlDocumentInfo::default();
        let mut buf = Vec::new();

        loop {
            let (resolve, event) = match xml.read_resolved_event_into(&mut buf) {
                Ok(pair) => pair,
                // Speculative detector: malformed prologue means "not XML".
                Err(_) => return Ok(None),
            };
            match event {
                Event::Decl(decl) => {
                    if let Ok(v) = decl.version() {
                        info.version = Some(String::from_utf8_lossy(&v).into_owned());
                    }
                    if let Some(Ok(enc)) = decl.encoding() {
                        info.encoding = Some(String::from_utf8_lossy(&enc).into_owned());
                    }
                    if let Some(Ok(sa)) = decl.standalone() {
                        info.standalone = Some(sa.as_ref() == b"yes");
                    }
                }
                Event::DocType(text) => {
                    parse_doctype(text.as_ref(), &mut info);
                }
                Event::Start(ref start) | Event::Empty(ref start) => {
                    info.root_local =
                        String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
                    if let ResolveResult::Bound(ns) = resolve {
                        info.root_namespace =
                            Some(String::from_utf8_lossy(ns.as_ref()).into_owned());
                    }
                    for attr in start.attributes().flatten() {
                        let key = attr.key.as_ref();
                        let value = String::from_utf8_lossy(&attr.value).into_owned();
                        if key == b"xmlns" {
                            info.namespaces.push((String::new(), value));
                        } else if let Some(prefix) = key.strip_prefix(b"xmlns:") {
                            info.namespaces
                                .push((String::from_utf8_lossy(prefix).into_owned(), value));
                        }
                    }
                    return Ok(Some(ParsedValue::Xml(info)));
                }
                Event::Text(text) => {
                    if !text.as_ref().iter().all(u8::is_ascii_whitespace) {
                        return Ok(None);
                    }
                }
                Event::Eof | Event::End(_) => return Ok(None),
                // Comments, processing instructions, entity references.
                _ => {}
            }
            buf.clear();
        }
    }
}

// `<!DOCTYPE name PUBLIC "pub-id" "system-id">` or `... SYSTEM "system-id"`.
fn parse_doctype(content: &[u8], info: &mut XmlDocumentInfo) {
    let text = String::from_utf8_lossy(content);
    let rest = text.trim_start();
    let rest = match rest.split_once(char::is_whitespace) {
        Some((_name, tail)) => tail.trim_start(),
        None => return,
    };
    if let Some(tail) = rest.strip_prefix("PUBLIC") {
        let mut quoted = quoted_strings(tail);
        info.doctype_public = quoted.next();
        info.doctype_system = quoted.next();
    } else if let Some(tail) = rest.strip_prefix("SYSTEM") {
        info.doctype_system = quoted_strings(tail).next();
    }
}

fn quoted_strings(s: &str) -> impl Iterator<Item = String> + '_ {
    let mut rest = s;
    std::iter::from_fn(move || {
        let open = rest.find(['"', '\''])?;
        let quote = rest.as_bytes()[open] as char;
        let after = &rest[open + 1..];
        let close = after.find(quote)?;
        let value = after[..close].to_string();
        rest = &after[close + 1..];
        Some(value)
    })
}
