//! Typed metadata values and literal annotation content.
//!
//! Annotation values keep their parsed representation next to the lexical
//! one. A [`LiteralContent`] is either plain text, a typed value, or a
//! fragment of embedded markup; construction enforces that it is never
//! none of these, and that only completed text carries a typed value.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime};

use crate::error::{Error, Result};

/// The value class of a [`MetaValue`], used as a translator lookup key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Boolean,
    Int,
    Double,
    String,
    Date,
    Time,
    DateTime,
    Bytes,
    List,
    Xml,
}

/// A typed annotation value.
#[derive(Debug, Clone, PartialEq)]
pub enum MetaValue {
    Boolean(bool),
    Int(i64),
    Double(f64),
    String(String),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(DateTime<FixedOffset>),
    Bytes(Vec<u8>),
    List(Vec<MetaValue>),
    Xml(XmlFragment),
}

impl MetaValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            MetaValue::Boolean(_) => ValueKind::Boolean,
            MetaValue::Int(_) => ValueKind::Int,
            MetaValue::Double(_) => ValueKind::Double,
            MetaValue::String(_) => ValueKind::String,
            MetaValue::Date(_) => ValueKind::Date,
            MetaValue::Time(_) => ValueKind::Time,
            MetaValue::DateTime(_) => ValueKind::DateTime,
            MetaValue::Bytes(_) => ValueKind::Bytes,
            MetaValue::List(_) => ValueKind::List,
            MetaValue::Xml(_) => ValueKind::Xml,
        }
    }

    #[inline]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            MetaValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    #[inline]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            MetaValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    #[inline]
    pub fn as_double(&self) -> Option<f64> {
        match self {
            MetaValue::Double(d) => Some(*d),
            _ => None,
        }
    }

    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetaValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// A lexical rendering of this value, usable when no translator is
    /// registered for its declared type.
    ///
    /// Numeric special values use the XSD spellings `INF`, `-INF`, `NaN`.
    pub fn lexical(&self) -> String {
        match self {
            MetaValue::Boolean(b) => b.to_string(),
            MetaValue::Int(i) => i.to_string(),
            MetaValue::Double(d) => {
                if d.is_nan() {
                    "NaN".to_string()
                } else if d.is_infinite() {
                    if *d > 0.0 { "INF".to_string() } else { "-INF".to_string() }
                } else {
                    d.to_string()
                }
            }
            MetaValue::String(s) => s.clone(),
            MetaValue::Date(d) => d.format("%Y-%m-%d").to_string(),
            MetaValue::Time(t) => t.format("%H:%M:%S%.f").to_string(),
            MetaValue::DateTime(dt) => dt.to_rfc3339(),
            MetaValue::Bytes(b) => hex::encode_upper(b),
            MetaValue::List(items) => {
                let parts: Vec<String> = items.iter().map(MetaValue::lexical).collect();
                parts.join(" ")
            }
            MetaValue::Xml(fragment) => fragment.flattened_text(),
        }
    }
}

/// A minimal generic markup tree for annotation content that is itself XML.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlFragment {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
}

impl XmlFragment {
    pub fn new(name: impl Into<String>) -> Self {
        XmlFragment { name: name.into(), attributes: Vec::new(), children: Vec::new() }
    }

    /// The concatenated text content of this fragment, depth first.
    pub fn flattened_text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        for child in &self.children {
            match child {
                XmlNode::Text(t) => out.push_str(t),
                XmlNode::Element(e) => e.collect_text(out),
            }
        }
    }
}

/// One node of an [`XmlFragment`] tree.
#[derive(Debug, Clone, PartialEq)]
pub enum XmlNode {
    Element(XmlFragment),
    Text(String),
}

/// Content of a literal metadata annotation.
///
/// Holds the lexical text, the translated value, or both. Construction
/// rejects content that has neither, and rejects a typed value on a
/// continued chunk, because a value is only meaningful once the whole
/// string has been assembled.
#[derive(Debug, Clone, PartialEq)]
pub struct LiteralContent {
    text: Option<String>,
    value: Option<MetaValue>,
    continued: bool,
}

impl LiteralContent {
    pub fn new(
        text: Option<String>,
        value: Option<MetaValue>,
        continued: bool,
    ) -> Result<Self> {
        if text.is_none() && value.is_none() {
            return Err(Error::Inconsistent(
                "literal metadata content needs a text or a value".to_string(),
            ));
        }
        if continued && value.is_some() {
            return Err(Error::Inconsistent(
                "a continued content chunk cannot carry a typed value".to_string(),
            ));
        }
        Ok(LiteralContent { text, value, continued })
    }

    /// Completed plain-text content.
    pub fn text(text: impl Into<String>) -> Self {
        LiteralContent { text: Some(text.into()), value: None, continued: false }
    }

    /// A text chunk with more chunks to follow.
    pub fn continued(text: impl Into<String>) -> Self {
        LiteralContent { text: Some(text.into()), value: None, continued: true }
    }

    /// Typed content, optionally keeping the original lexical form.
    pub fn typed(value: MetaValue, original: Option<String>) -> Self {
        LiteralContent { text: original, value: Some(value), continued: false }
    }

    pub fn text_value(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn value(&self) -> Option<&MetaValue> {
        self.value.as_ref()
    }

    pub fn is_continued(&self) -> bool {
        self.continued
    }

    /// Check if this content carries an embedded markup fragment.
    pub fn is_xml(&self) -> bool {
        matches!(self.value, Some(MetaValue::Xml(_)))
    }

    /// The best available lexical form of this content.
    pub fn lexical(&self) -> String {
        match (&self.text, &self.value) {
            (Some(t), _) => t.clone(),
            (None, Some(v)) => v.lexical(),
            (None, None) => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_needs_text_or_value() {
        assert!(LiteralContent::new(None, None, false).is_err());
        assert!(LiteralContent::new(Some("x".into()), None, false).is_ok());
        assert!(LiteralContent::new(None, Some(MetaValue::Int(1)), false).is_ok());
    }

    #[test]
    fn test_continued_cannot_be_typed() {
        let err = LiteralContent::new(Some("5".into()), Some(MetaValue::Int(5)), true);
        assert!(err.is_err());
        let ok = LiteralContent::continued("partial ");
        assert!(ok.is_continued());
        assert!(ok.value().is_none());
    }

    #[test]
    fn test_typed_keeps_original_text() {
        let content = LiteralContent::typed(MetaValue::Int(42), Some("042".into()));
        assert_eq!(content.text_value(), Some("042"));
        assert_eq!(content.value(), Some(&MetaValue::Int(42)));
        assert_eq!(content.lexical(), "042");
    }

    #[test]
    fn test_lexical_forms() {
        assert_eq!(MetaValue::Boolean(true).lexical(), "true");
        assert_eq!(MetaValue::Int(-7).lexical(), "-7");
        assert_eq!(MetaValue::Double(f64::INFINITY).lexical(), "INF");
        assert_eq!(MetaValue::Double(f64::NEG_INFINITY).lexical(), "-INF");
        assert_eq!(MetaValue::Bytes(vec![0xde, 0xad]).lexical(), "DEAD");
        let list = MetaValue::List(vec![MetaValue::Int(1), MetaValue::Int(2)]);
        assert_eq!(list.lexical(), "1 2");
    }

    #[test]
    fn test_fragment_text() {
        let mut inner = XmlFragment::new("i");
        inner.children.push(XmlNode::Text("world".into()));
        let mut outer = XmlFragment::new("p");
        outer.children.push(XmlNode::Text("hello ".into()));
        outer.children.push(XmlNode::Element(inner));
        assert_eq!(outer.flattened_text(), "hello world");
        assert_eq!(MetaValue::Xml(outer).kind(), ValueKind::Xml);
    }
}
