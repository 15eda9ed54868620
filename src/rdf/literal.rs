//! Typed literal values and string safety.
//!
//! # Invariants
//! - Literal dispatch is a closed tagged union; values outside it are
//!   rejected at compile time, never coerced dynamically.
//! - Every emitted string literal either passes [`is_safe_string`] or is
//!   wrapped losslessly as an `rdf:JSON` literal with an `@value` field.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::rdf::vocab::{rdf, xsd};

/// The closed set of literal value types the pipeline can emit.
#[derive(Clone, Debug, PartialEq)]
pub enum LiteralValue {
    Bool(bool),
    Int(i32),
    Long(i64),
    UInt(u32),
    ULong(u64),
    Float(f32),
    Double(f64),
    /// Pre-rendered decimal lexical form.
    Decimal(String),
    Str(String),
    DateTime(DateTime<Utc>),
    Uri(String),
}

impl LiteralValue {
    /// XSD datatype IRI for this value.
    pub fn datatype(&self) -> &'static str {
        match self {
            Self::Bool(_) => xsd::BOOLEAN,
            Self::Int(_) => xsd::INT,
            Self::Long(_) => xsd::LONG,
            Self::UInt(_) => xsd::UNSIGNED_INT,
            Self::ULong(_) => xsd::UNSIGNED_LONG,
            Self::Float(_) => xsd::FLOAT,
            Self::Double(_) => xsd::DOUBLE,
            Self::Decimal(_) => xsd::DECIMAL,
            Self::Str(_) => xsd::STRING,
            Self::DateTime(_) => xsd::DATE_TIME,
            Self::Uri(_) => xsd::ANY_URI,
        }
    }

    /// Canonical lexical form.
    pub fn lexical(&self) -> String {
        match self {
            Self::Bool(v) => v.to_string(),
            Self::Int(v) => v.to_string(),
            Self::Long(v) => v.to_string(),
            Self::UInt(v) => v.to_string(),
            Self::ULong(v) => v.to_string(),
            Self::Float(v) => float_lexical(f64::from(*v)),
            Self::Double(v) => float_lexical(*v),
            Self::Decimal(v) => v.clone(),
            Self::Str(v) => v.clone(),
            Self::DateTime(v) => v.to_rfc3339_opts(SecondsFormat::Millis, true),
            Self::Uri(v) => v.clone(),
        }
    }
}

// XSD uses INF/-INF/NaN, not Rust's inf/-inf/NaN.
fn float_lexical(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else if v.is_infinite() {
        if v > 0.0 { "INF".to_string() } else { "-INF".to_string() }
    } else {
        v.to_string()
    }
}

/// True when `s` is safe to emit as a plain string literal.
///
/// Rejected: C0 controls other than tab/newline/carriage-return, C1
/// controls, a leading combining mark, the replacement character, and
/// Unicode noncharacters. Unpaired surrogates cannot occur in `&str`.
pub fn is_safe_string(s: &str) -> bool {
    let mut first = true;
    for c in s.chars() {
        let cp = c as u32;
        match c {
            '\t' | '\n' | '\r' => {}
            _ if cp < 0x20 => return false,
            _ if (0x7F..=0x9F).contains(&cp) => return false,
            '\u{FFFD}' => return false,
            _ if (0xFDD0..=0xFDEF).contains(&cp) => return false,
            _ if cp & 0xFFFE == 0xFFFE => return false,
            _ if first && is_combining_mark(cp) => return false,
            _ => {}
        }
        first = false;
    }
    true
}

fn is_combining_mark(cp: u32) -> bool {
    matches!(
        cp,
        0x0300..=0x036F | 0x1AB0..=0x1AFF | 0x1DC0..=0x1DFF | 0x20D0..=0x20FF | 0xFE20..=0xFE2F
    )
}

/// Wrap an unsafe string as an `rdf:JSON` literal preserving content
/// losslessly. Returns `(lexical, datatype)`.
pub fn json_wrap(s: &str) -> (String, &'static str) {
    let lexical = serde_json::json!({ "@value": s }).to_string();
    (lexical, rdf::JSON)
}
