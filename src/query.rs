//! Node query tester: a restricted SPARQL `ASK` filter over an entity's
//! own triples.
//!
//! # Scope
//! Decides whether an entity's bytes are materialized to the extraction
//! directory. Supported surface:
//!
//! ```sparql
//! PREFIX nie: <http://www.semanticdesktop.org/ontologies/2007/01/19/nie#>
//! ASK { ?node nie:mimeType "image/png" . ?node <http://purl.org/dc/terms/extent> ?size . }
//! ```
//!
//! - Every pattern's subject must be the same variable (the entity).
//! - Predicates are IRIs or prefixed names; objects are IRIs, prefixed
//!   names, quoted literals, or variables (wildcards).
//! - Patterns are conjunctive and evaluated against the entity's triples
//!   only; joins across entities are out of scope.
//!
//! A malformed query is a configuration error: the run refuses to start.

use std::fmt;

use ahash::AHashMap;

use crate::rdf::Term;

/// Parse error for the restricted ASK grammar.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum QueryParseError {
    /// The query does not start with (optionally prefixed) `ASK {`.
    MissingAsk,
    /// Unbalanced braces or truncated pattern.
    UnexpectedEnd,
    /// Token that fits no term production.
    BadTerm { token: String },
    /// `PREFIX` declaration without a known shape.
    BadPrefix { detail: String },
    /// Prefixed name with an undeclared prefix.
    UnknownPrefix { prefix: String },
    /// Pattern subjects must all be the same variable.
    SubjectNotEntityVariable { token: String },
}

impl fmt::Display for QueryParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingAsk => write!(f, "query must be of the form 'ASK {{ ... }}'"),
            Self::UnexpectedEnd => write!(f, "unexpected end of query"),
            Self::BadTerm { token } => write!(f, "unrecognized term: {token}"),
            Self::BadPrefix { detail } => write!(f, "malformed PREFIX declaration: {detail}"),
            Self::UnknownPrefix { prefix } => write!(f, "undeclared prefix: {prefix}"),
            Self::SubjectNotEntityVariable { token } => {
                write!(f, "every pattern subject must be the entity variable, got {token}")
            }
        }
    }
}

impl std::error::Error for QueryParseError {}

#[derive(Clone, Debug, PartialEq)]
enum PatternTerm {
    Wildcard,
    Iri(String),
    Literal(String),
}

#[derive(Clone, Debug)]
struct TriplePattern {
    predicate: PatternTerm,
    object: PatternTerm,
}

/// Compiled ASK filter.
pub struct NodeQueryTester {
    patterns: Vec<TriplePattern>,
}

impl NodeQueryTester {
    /// Compile a query text.
    pub fn parse(text: &str) -> Result<Self, QueryParseError> {
        let tokens = tokenize(text);
        let mut pos = 0usize;
        let mut prefixes: AHashMap<String, String> = AHashMap::new();

        // PREFIX declarations.
        while tokens.get(pos).map(String::as_str) == Some("PREFIX")
            || tokens.get(pos).map(String::as_str) == Some("prefix")
        {
            let name = tokens.get(pos + 1).ok_or(QueryParseError::UnexpectedEnd)?;
            let iri = tokens.get(pos + 2).ok_or(QueryParseError::UnexpectedEnd)?;
            let prefix = name
                .strip_suffix(':')
                .ok_or_else(|| QueryParseError::BadPrefix { detail: name.clone() })?;
            let iri = iri
                .strip_prefix('<')
                .and_then(|s| s.strip_suffix('>'))
                .ok_or_else(|| QueryParseError::BadPrefix { detail: iri.clone() })?;
            prefixes.insert(prefix.to_string(), iri.to_string());
            pos += 3;
        }

        if !tokens
            .get(pos)
            .map(|t| t.eq_ignore_ascii_case("ASK"))
            .unwrap_or(false)
        {
            return Err(QueryParseError::MissingAsk);
        }
        pos += 1;
        if tokens.get(pos).map(String::as_str) != Some("{") {
            return Err(QueryParseError::MissingAsk);
        }
        pos += 1;

        let mut entity_var: Option<String> = None;
        let mut patterns = Vec::new();
        loop {
            match tokens.get(pos).map(String::as_str) {
                Some("}") => break,
                Some(".") => {
                    pos += 1;
                    continue;
                }
                Some(_) => {}
                None => return Err(QueryParseError::UnexpectedEnd),
            }

            let subject = &tokens[pos];
            if !subject.starts_with('?') {
                return Err(QueryParseError::SubjectNotEntityVariable { token: subject.clone() });
            }
            match &entity_var {
                None => entity_var = Some(subject.clone()),
                Some(var) if var == subject => {}
                Some(_) => {
                    return Err(QueryParseError::SubjectNotEntityVariable {
                        token: subject.clone(),
                    })
                }
            }

            let predicate = parse_term(
                tokens.get(pos + 1).ok_or(QueryParseError::UnexpectedEnd)?,
                &prefixes,
            )?;
            let object = parse_term(
                tokens.get(pos + 2).ok_or(QueryParseError::UnexpectedEnd)?,
                &prefixes,
            )?;
            patterns.push(TriplePattern { predicate, object });
            pos += 3;
        }

        Ok(Self { patterns })
    }

    /// Evaluate the filter against one entity's triples.
    pub fn matches(&self, _subject: &str, facts: &[(String, Term)]) -> bool {
        self.patterns.iter().all(|pattern| {
            facts.iter().any(|(predicate, object)| {
                term_matches(&pattern.predicate, &Term::Iri(predicate.clone()))
                    && term_matches(&pattern.object, object)
            })
        })
    }
}

fn term_matches(pattern: &PatternTerm, term: &Term) -> bool {
    match (pattern, term) {
        (PatternTerm::Wildcard, _) => true,
        (PatternTerm::Iri(want), Term::Iri(have)) => want == have,
        (PatternTerm::Literal(want), Term::Literal { lexical, .. }) => want == lexical,
        _ => false,
    }
}

fn parse_term(
    token: &str,
    prefixes: &AHashMap<String, String>,
) -> Result<PatternTerm, QueryParseError> {
    if token.starts_with('?') {
        return Ok(PatternTerm::Wildcard);
    }
    if let Some(iri) = token.strip_prefix('<').and_then(|s| s.strip_suffix('>')) {
        return Ok(PatternTerm::Iri(iri.to_string()));
    }
    if let Some(lit) = token.strip_prefix('"') {
        // Datatype/language suffixes are matched on the lexical form only.
        let end = lit.find('"').ok_or_else(|| QueryParseError::BadTerm {
            token: token.to_string(),
        })?;
        return Ok(PatternTerm::Literal(lit[..end].to_string()));
    }
    if token == "a" {
        return Ok(PatternTerm::Iri(crate::rdf::vocab::rdf::TYPE.to_string()));
    }
    if let Some((prefix, local)) = token.split_once(':') {
        let base = prefixes
            .get(prefix)
            .ok_or_else(|| QueryParseError::UnknownPrefix { prefix: prefix.to_string() })?;
        return Ok(PatternTerm::Iri(format!("{base}{local}")));
    }
    Err(QueryParseError::BadTerm { token: token.to_string() })
}

// Whitespace-and-structure tokenizer: `<...>` and `"..."` stay single
// tokens, `{` `}` `.` separate, `#` comments run to end of line.
fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            '#' => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
            }
            c if c.is_whitespace() => {
                chars.next();
            }
            '{' | '}' => {
                chars.next();
                tokens.push(c.to_string());
            }
            '.' => {
                chars.next();
                tokens.push(".".to_string());
            }
            '<' => {
                let mut tok = String::new();
                for c in chars.by_ref() {
                    tok.push(c);
                    if c == '>' {
                        break;
                    }
                }
                tokens.push(tok);
            }
            '"' => {
                let mut tok = String::from('"');
                chars.next();
                let mut closed = false;
                while let Some(c) = chars.next() {
                    tok.push(c);
                    if c == '\\' {
                        if let Some(esc) = chars.next() {
                            tok.push(esc);
                        }
                    } else if c == '"' {
                        closed = true;
                        break;
                    }
                }
                // Attach a ^^datatype or @lang suffix to the literal token.
                // `<...>` is consumed atomically so IRI dots do not read as
                // pattern terminators.
                if closed {
                    while let Some(&c) = chars.peek() {
                        if c.is_whitespace() || c == '.' || c == '}' {
                            break;
                        }
                        if c == '<' {
                            for c in chars.by_ref() {
                                tok.push(c);
                                if c == '>' {
                                    break;
                                }
                            }
                            continue;
                        }
                        tok.push(c);
                        chars.next();
                    }
                }
                tokens.push(tok);
            }
            _ => {
                let mut tok = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_whitespace() || matches!(c, '{' | '}' | '<' | '"') {
                        break;
                    }
                    // A bare '.' terminates a pattern; inside prefixed
                    // names it cannot occur in this restricted grammar.
                    if c == '.' {
                        break;
                    }
                    tok.push(c);
                    chars.next();
                }
                if !tok.is_empty() {
                    tokens.push(tok);
                }
            }
        }
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rdf::vocab::{nie, rdf};

    fn facts() -> Vec<(String, Term)> {
        vec![
            (
                rdf::TYPE.to_string(),
                Term::Iri("http://www.semanticdesktop.org/ontologies/2007/01/19/nie#DataObject".into()),
            ),
            (nie::MIME_TYPE.to_string(), Term::string("image/png")),
            (
                "http://purl.org/dc/terms/extent".to_string(),
                Term::typed("42", "http://www.w3.org/2001/XMLSchema#unsignedLong"),
            ),
        ]
    }

    #[test]
    fn ask_with_prefix_and_literal() {
        let q = NodeQueryTester::parse(
            "PREFIX nie: <http://www.semanticdesktop.org/ontologies/2007/01/19/nie#>\n\
             ASK { ?node nie:mimeType \"image/png\" . }",
        )
        .unwrap();
        assert!(q.matches("urn:x", &facts()));

        let q = NodeQueryTester::parse(
            "PREFIX nie: <http://www.semanticdesktop.org/ontologies/2007/01/19/nie#>\n\
             ASK { ?node nie:mimeType \"text/plain\" . }",
        )
        .unwrap();
        assert!(!q.matches("urn:x", &facts()));
    }

    #[test]
    fn conjunction_and_wildcard_object() {
        let q = NodeQueryTester::parse(
            "ASK { ?f <http://purl.org/dc/terms/extent> ?size . \
                   ?f a <http://www.semanticdesktop.org/ontologies/2007/01/19/nie#DataObject> . }",
        )
        .unwrap();
        assert!(q.matches("urn:x", &facts()));
    }

    #[test]
    fn typed_literal_token_matches_lexical_form() {
        let q = NodeQueryTester::parse(
            "ASK { ?f <http://purl.org/dc/terms/extent> \"42\"^^<http://www.w3.org/2001/XMLSchema#unsignedLong> }",
        )
        .unwrap();
        assert!(q.matches("urn:x", &facts()));
    }

    #[test]
    fn rejects_mixed_subjects_and_bad_tokens() {
        assert!(matches!(
            NodeQueryTester::parse("ASK { ?a <urn:p> ?x . ?b <urn:p> ?y . }"),
            Err(QueryParseError::SubjectNotEntityVariable { .. })
        ));
        assert!(matches!(
            NodeQueryTester::parse("SELECT * WHERE { }"),
            Err(QueryParseError::MissingAsk)
        ));
        assert!(matches!(
            NodeQueryTester::parse("ASK { ?a unknown:p ?x . }"),
            Err(QueryParseError::UnknownPrefix { .. })
        ));
        assert!(matches!(
            NodeQueryTester::parse("ASK { ?a <urn:p> "),
            Err(QueryParseError::UnexpectedEnd)
        ));
    }

    #[test]
    fn comments_are_ignored()  {
        let q = NodeQueryTester::parse(
            "# materialize images\nASK { ?n <http://www.semanticdesktop.org/ontologies/2007/01/19/nie#mimeType> \"image/png\" }",
        )
        .unwrap();
        assert!(q.matches("urn:x", &facts()));
    }
}
