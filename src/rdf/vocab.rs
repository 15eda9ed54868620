//! RDF vocabulary constants and namespace prefixes.
//!
//! Constants are organized by vocabulary:
//! - `rdf` / `xsd` / `owl` - W3C core vocabularies
//! - `dc` / `dcterms` - Dublin Core (elements 1.1 and terms)
//! - `ds` - XML digital signature digest terms
//! - `nfo` / `nie` - NEPOMUK file and information-element ontologies
//! - `skos` - labels and notations
//! - `prov` - provenance links for per-entity failures
//! - `dsc` - tool-specific terms with no standard equivalent

/// RDF vocabulary constants
pub mod rdf {
    pub const NS: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";

    /// rdf:type IRI
    pub const TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";

    /// rdf:JSON IRI (datatype for JSON-wrapped unsafe literals)
    pub const JSON: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#JSON";
}

/// XSD datatype constants
pub mod xsd {
    pub const NS: &str = "http://www.w3.org/2001/XMLSchema#";

    pub const STRING: &str = "http://www.w3.org/2001/XMLSchema#string";
    pub const BOOLEAN: &str = "http://www.w3.org/2001/XMLSchema#boolean";
    pub const INT: &str = "http://www.w3.org/2001/XMLSchema#int";
    pub const LONG: &str = "http://www.w3.org/2001/XMLSchema#long";
    pub const UNSIGNED_INT: &str = "http://www.w3.org/2001/XMLSchema#unsignedInt";
    pub const UNSIGNED_LONG: &str = "http://www.w3.org/2001/XMLSchema#unsignedLong";
    pub const FLOAT: &str = "http://www.w3.org/2001/XMLSchema#float";
    pub const DOUBLE: &str = "http://www.w3.org/2001/XMLSchema#double";
    pub const DECIMAL: &str = "http://www.w3.org/2001/XMLSchema#decimal";
    pub const DATE_TIME: &str = "http://www.w3.org/2001/XMLSchema#dateTime";
    pub const ANY_URI: &str = "http://www.w3.org/2001/XMLSchema#anyURI";
    pub const BASE64_BINARY: &str = "http://www.w3.org/2001/XMLSchema#base64Binary";
    pub const HEX_BINARY: &str = "http://www.w3.org/2001/XMLSchema#hexBinary";
}

/// OWL constants
pub mod owl {
    pub const NS: &str = "http://www.w3.org/2002/07/owl#";

    /// owl:sameAs IRI (alternate content-addressed identities)
    pub const SAME_AS: &str = "http://www.w3.org/2002/07/owl#sameAs";
}

/// Dublin Core elements 1.1
pub mod dc {
    pub const NS: &str = "http://purl.org/dc/elements/1.1/";

    /// dc:description IRI (per-entity failure annotation)
    pub const DESCRIPTION: &str = "http://purl.org/dc/elements/1.1/description";
}

/// Dublin Core terms
pub mod dcterms {
    pub const NS: &str = "http://purl.org/dc/terms/";

    pub const HAS_FORMAT: &str = "http://purl.org/dc/terms/hasFormat";
    pub const HAS_PART: &str = "http://purl.org/dc/terms/hasPart";
    pub const EXTENT: &str = "http://purl.org/dc/terms/extent";
    pub const FORMAT: &str = "http://purl.org/dc/terms/format";
    pub const IDENTIFIER: &str = "http://purl.org/dc/terms/identifier";
}

/// XML digital signature digest terms
pub mod ds {
    pub const NS: &str = "http://www.w3.org/2000/09/xmldsig#";

    pub const DIGEST_ALGORITHM: &str = "http://www.w3.org/2000/09/xmldsig#digestAlgorithm";
    pub const DIGEST_VALUE: &str = "http://www.w3.org/2000/09/xmldsig#digestValue";
}

/// NEPOMUK file ontology
pub mod nfo {
    pub const NS: &str = "http://www.semanticdesktop.org/ontologies/2007/03/22/nfo#";

    pub const FILE_DATA_OBJECT: &str =
        "http://www.semanticdesktop.org/ontologies/2007/03/22/nfo#FileDataObject";
    pub const FOLDER: &str = "http://www.semanticdesktop.org/ontologies/2007/03/22/nfo#Folder";
    pub const ARCHIVE: &str = "http://www.semanticdesktop.org/ontologies/2007/03/22/nfo#Archive";
    pub const ARCHIVE_ITEM: &str =
        "http://www.semanticdesktop.org/ontologies/2007/03/22/nfo#ArchiveItem";
    pub const EMBEDDED_FILE_DATA_OBJECT: &str =
        "http://www.semanticdesktop.org/ontologies/2007/03/22/nfo#EmbeddedFileDataObject";
    pub const RASTER_IMAGE: &str =
        "http://www.semanticdesktop.org/ontologies/2007/03/22/nfo#RasterImage";

    pub const FILE_NAME: &str = "http://www.semanticdesktop.org/ontologies/2007/03/22/nfo#fileName";
    pub const FILE_CREATED: &str =
        "http://www.semanticdesktop.org/ontologies/2007/03/22/nfo#fileCreated";
    pub const FILE_LAST_MODIFIED: &str =
        "http://www.semanticdesktop.org/ontologies/2007/03/22/nfo#fileLastModified";
    pub const FILE_LAST_ACCESSED: &str =
        "http://www.semanticdesktop.org/ontologies/2007/03/22/nfo#fileLastAccessed";
    pub const BELONGS_TO_CONTAINER: &str =
        "http://www.semanticdesktop.org/ontologies/2007/03/22/nfo#belongsToContainer";
    pub const WIDTH: &str = "http://www.semanticdesktop.org/ontologies/2007/03/22/nfo#width";
    pub const HEIGHT: &str = "http://www.semanticdesktop.org/ontologies/2007/03/22/nfo#height";
}

/// NEPOMUK information element ontology
pub mod nie {
    pub const NS: &str = "http://www.semanticdesktop.org/ontologies/2007/01/19/nie#";

    pub const DATA_OBJECT: &str =
        "http://www.semanticdesktop.org/ontologies/2007/01/19/nie#DataObject";
    pub const INTERPRETED_AS: &str =
        "http://www.semanticdesktop.org/ontologies/2007/01/19/nie#interpretedAs";
    pub const MIME_TYPE: &str =
        "http://www.semanticdesktop.org/ontologies/2007/01/19/nie#mimeType";
    pub const CHARACTER_SET: &str =
        "http://www.semanticdesktop.org/ontologies/2007/01/19/nie#characterSet";
}

/// SKOS labels
pub mod skos {
    pub const NS: &str = "http://www.w3.org/2004/02/skos/core#";

    pub const PREF_LABEL: &str = "http://www.w3.org/2004/02/skos/core#prefLabel";
    pub const NOTATION: &str = "http://www.w3.org/2004/02/skos/core#notation";
}

/// W3C provenance
pub mod prov {
    pub const NS: &str = "http://www.w3.org/ns/prov#";

    pub const WAS_DERIVED_FROM: &str = "http://www.w3.org/ns/prov#wasDerivedFrom";
}

/// Tool vocabulary for terms without a standard equivalent.
pub mod dsc {
    pub const NS: &str = "http://descry.dev/vocab#";

    /// Class of synthesized descriptors for unrecognized data.
    pub const IMPROVISED_FORMAT: &str = "http://descry.dev/vocab#ImprovisedFormat";
    /// Class of XML document format nodes.
    pub const XML_DOCUMENT: &str = "http://descry.dev/vocab#XmlDocument";
    /// Class of SVG document format nodes.
    pub const SVG_DOCUMENT: &str = "http://descry.dev/vocab#SvgDocument";
    /// Class of XHTML document format nodes.
    pub const XHTML_DOCUMENT: &str = "http://descry.dev/vocab#XhtmlDocument";

    pub const XML_VERSION: &str = "http://descry.dev/vocab#xmlVersion";
    pub const XML_ENCODING: &str = "http://descry.dev/vocab#xmlEncoding";
    pub const XML_STANDALONE: &str = "http://descry.dev/vocab#xmlStandalone";
    pub const ROOT_NAMESPACE: &str = "http://descry.dev/vocab#rootNamespace";
    pub const DOCTYPE_PUBLIC: &str = "http://descry.dev/vocab#doctypePublicId";
    pub const DOCTYPE_SYSTEM: &str = "http://descry.dev/vocab#doctypeSystemId";

    /// Leading printable signature bytes of an unrecognized object.
    pub const SIGNATURE: &str = "http://descry.dev/vocab#signature";
    /// Interpreter basename extracted from a `#!` line.
    pub const INTERPRETER: &str = "http://descry.dev/vocab#interpreter";
    /// File extension advertised by a format descriptor.
    pub const EXTENSION: &str = "http://descry.dev/vocab#extension";
    /// Inlined content of very small objects.
    pub const CONTENT: &str = "http://descry.dev/vocab#content";
    /// Whether a data object was classified binary.
    pub const IS_BINARY: &str = "http://descry.dev/vocab#isBinary";
}

/// Preferred prefixes for the namespaces this tool emits.
///
/// First use of a vocabulary consults this table; unknown namespaces are
/// assigned `ns<counter>` prefixes.
pub const KNOWN_PREFIXES: &[(&str, &str)] = &[
    ("rdf", rdf::NS),
    ("xsd", xsd::NS),
    ("owl", owl::NS),
    ("dc", dc::NS),
    ("dcterms", dcterms::NS),
    ("ds", ds::NS),
    ("nfo", nfo::NS),
    ("nie", nie::NS),
    ("skos", skos::NS),
    ("prov", prov::NS),
    ("dsc", dsc::NS),
];

/// Split an IRI into (namespace, local name) at the last `#` or `/`.
///
/// Returns `None` when no separator exists or the local part is empty.
pub fn split_iri(iri: &str) -> Option<(&str, &str)> {
    let cut = iri.rfind(['#', '/'])?;
    if cut + 1 >= iri.len() {
        return None;
    }
    Some((&iri[..cut + 1], &iri[cut + 1..]))
}

/// Preferred prefix for a namespace, if one is known.
pub fn known_prefix(namespace: &str) -> Option<&'static str> {
    KNOWN_PREFIXES
        .iter()
        .find(|(_, ns)| *ns == namespace)
        .map(|(p, _)| *p)
}

/// URN naming a media type, e.g. `urn:urim:text%2Fplain`.
///
/// Every byte outside `[A-Za-z0-9.+-]` is percent-encoded so the URN stays a
/// single opaque token.
pub fn media_type_urn(media_type: &str) -> String {
    let mut out = String::with_capacity(9 + media_type.len() + 4);
    out.push_str("urn:urim:");
    for b in media_type.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'.' | b'+' | b'-' => out.push(b as char),
            other => push_pct(&mut out, other),
        }
    }
    out
}

/// Append `%XX` for one byte.
pub(crate) fn push_pct(out: &mut String, byte: u8) {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";
    out.push('%');
    out.push(HEX[(byte >> 4) as usize] as char);
    out.push(HEX[(byte & 0xF) as usize] as char);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_hash_and_slash_iris() {
        assert_eq!(
            split_iri(nfo::FILE_NAME),
            Some((nfo::NS, "fileName"))
        );
        assert_eq!(
            split_iri(dcterms::EXTENT),
            Some((dcterms::NS, "extent"))
        );
        assert_eq!(split_iri("nohierarchy"), None);
    }

    #[test]
    fn known_prefixes_resolve() {
        assert_eq!(known_prefix(xsd::NS), Some("xsd"));
        assert_eq!(known_prefix("http://example.com/x#"), None);
    }

    #[test]
    fn media_type_urn_escapes_slash() {
        assert_eq!(media_type_urn("text/plain"), "urn:urim:text%2Fplain");
        assert_eq!(
            media_type_urn("image/svg+xml"),
            "urn:urim:image%2Fsvg+xml"
        );
    }
}
