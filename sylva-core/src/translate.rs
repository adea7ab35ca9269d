//! Bidirectional translation between lexical text and typed values.
//!
//! Each [`ObjectTranslator`] converts between the lexical space of one
//! declared data type and a [`MetaValue`]. The [`TranslatorRegistry`] keys
//! translators by data type plus an optional value class, keeps one
//! default translator per data type, and applies the fragment-separator
//! fallback on lookup misses.
//!
//! [`TranslatorRegistry::standard`] covers the XSD simple types readers
//! meet in practice; applications layer their own translators on top for
//! domain vocabularies.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Offset, Utc};

use crate::datatype::DataTypeKey;
use crate::error::{Error, Result};
use crate::value::{MetaValue, ValueKind, XmlNode};

/// Reader-side context available to translators.
///
/// Carries the namespace prefix bindings in scope at the value's position,
/// for translators whose lexical space contains prefixed names.
#[derive(Debug, Clone, Copy)]
pub struct ReadContext<'a> {
    namespaces: &'a [(String, String)],
}

impl<'a> ReadContext<'a> {
    /// A context with no bindings, for non-XML dialects.
    pub fn empty() -> ReadContext<'static> {
        ReadContext { namespaces: &[] }
    }

    /// Bindings ordered outermost first; inner scopes shadow outer ones.
    pub fn new(namespaces: &'a [(String, String)]) -> Self {
        ReadContext { namespaces }
    }

    pub fn resolve_prefix(&self, prefix: &str) -> Option<&'a str> {
        self.namespaces
            .iter()
            .rev()
            .find(|(p, _)| p == prefix)
            .map(|(_, uri)| uri.as_str())
    }
}

/// Converts between one data type's lexical space and typed values.
pub trait ObjectTranslator: Send + Sync {
    /// The data type this translator is written for.
    fn data_type(&self) -> &DataTypeKey;

    /// Whether values of this type have a plain-text representation.
    fn has_text_form(&self) -> bool {
        true
    }

    /// Render a value as lexical text.
    ///
    /// Fails with [`Error::Inconsistent`] when handed a value class this
    /// translator does not cover.
    fn to_text(&self, value: &MetaValue) -> Result<String>;

    /// Render a value as markup. The default wraps [`Self::to_text`] in a
    /// text node.
    fn to_xml(&self, value: &MetaValue) -> Result<XmlNode> {
        Ok(XmlNode::Text(self.to_text(value)?))
    }

    /// Read lexical text into a typed value.
    ///
    /// Fails with [`Error::InvalidValue`] on unparsable input.
    fn from_text(&self, text: &str, context: &ReadContext<'_>) -> Result<MetaValue>;

    /// Read markup into a typed value. The default accepts only text nodes.
    fn from_xml(&self, node: &XmlNode, context: &ReadContext<'_>) -> Result<MetaValue> {
        match node {
            XmlNode::Text(text) => self.from_text(text, context),
            XmlNode::Element(_) => Err(Error::invalid_value(
                "<element content>",
                self.data_type().clone(),
            )),
        }
    }
}

type SharedTranslator = Arc<dyn ObjectTranslator>;

/// Registry of translators keyed by data type and optional value class.
pub struct TranslatorRegistry {
    by_kind: HashMap<(DataTypeKey, ValueKind), SharedTranslator>,
    defaults: HashMap<DataTypeKey, SharedTranslator>,
}

impl TranslatorRegistry {
    pub fn new() -> Self {
        TranslatorRegistry { by_kind: HashMap::new(), defaults: HashMap::new() }
    }

    /// Register a translator for `data_type`, optionally narrowed to one
    /// value class.
    ///
    /// The first registration for a slot wins; a later registration with
    /// `is_default` set replaces both the slot and the per-type default.
    pub fn register(
        &mut self,
        data_type: DataTypeKey,
        kind: Option<ValueKind>,
        translator: SharedTranslator,
        is_default: bool,
    ) {
        if let Some(kind) = kind {
            let slot = (data_type.clone(), kind);
            if is_default || !self.by_kind.contains_key(&slot) {
                self.by_kind.insert(slot, translator.clone());
            }
        }
        if is_default || !self.defaults.contains_key(&data_type) {
            self.defaults.insert(data_type, translator);
        }
    }

    /// Exact lookup, with `None` standing for the per-type default.
    pub fn lookup(
        &self,
        data_type: &DataTypeKey,
        kind: Option<ValueKind>,
    ) -> Option<&SharedTranslator> {
        match kind {
            Some(kind) => self.by_kind.get(&(data_type.clone(), kind)),
            None => self.defaults.get(data_type),
        }
    }

    /// The default translator for a data type.
    pub fn default_for(&self, data_type: &DataTypeKey) -> Option<&SharedTranslator> {
        self.defaults.get(data_type)
    }

    /// Lookup with the fragment-separator fallback: on a miss with a
    /// namespace ending in `#`, retry once with the separator stripped.
    pub fn lookup_fallback(
        &self,
        data_type: &DataTypeKey,
        kind: Option<ValueKind>,
    ) -> Option<&SharedTranslator> {
        if let Some(found) = self.lookup(data_type, kind) {
            return Some(found);
        }
        let stripped = data_type.without_fragment()?;
        self.lookup(&stripped, kind)
    }

    /// Read `text` through the default translator for `data_type`.
    ///
    /// Returns `Ok(None)` when no translator is registered, so callers can
    /// fall back to string content.
    pub fn read_text(
        &self,
        data_type: &DataTypeKey,
        text: &str,
        context: &ReadContext<'_>,
    ) -> Result<Option<MetaValue>> {
        match self.lookup_fallback(data_type, None) {
            Some(translator) => Ok(Some(translator.from_text(text, context)?)),
            None => Ok(None),
        }
    }

    /// Render `value` for output, preferring a translator for its declared
    /// type and falling back to the value's own lexical form.
    pub fn render(&self, data_type: Option<&DataTypeKey>, value: &MetaValue) -> String {
        if let Some(data_type) = data_type {
            let translator = self
                .lookup_fallback(data_type, Some(value.kind()))
                .or_else(|| self.lookup_fallback(data_type, None));
            if let Some(translator) = translator {
                if translator.has_text_form() {
                    if let Ok(text) = translator.to_text(value) {
                        return text;
                    }
                }
            }
        }
        value.lexical()
    }

    /// A registry covering the XSD simple types.
    pub fn standard() -> Self {
        let mut registry = TranslatorRegistry::new();

        let boolean: SharedTranslator = Arc::new(BooleanTranslator::new());
        registry.register(DataTypeKey::xsd("boolean"), Some(ValueKind::Boolean), boolean, true);

        for (local, min, max) in [
            ("byte", i8::MIN as i64, i8::MAX as i64),
            ("short", i16::MIN as i64, i16::MAX as i64),
            ("int", i32::MIN as i64, i32::MAX as i64),
            ("long", i64::MIN, i64::MAX),
            ("integer", i64::MIN, i64::MAX),
        ] {
            let translator: SharedTranslator =
                Arc::new(IntegerTranslator::new(DataTypeKey::xsd(local), min, max));
            registry.register(DataTypeKey::xsd(local), Some(ValueKind::Int), translator, true);
        }

        for local in ["float", "double", "decimal"] {
            let translator: SharedTranslator =
                Arc::new(FloatTranslator::new(DataTypeKey::xsd(local)));
            registry.register(DataTypeKey::xsd(local), Some(ValueKind::Double), translator, true);
        }

        for (local, mode) in [
            ("string", WhitespaceMode::Preserve),
            ("normalizedString", WhitespaceMode::Replace),
            ("token", WhitespaceMode::Collapse),
            ("anyURI", WhitespaceMode::Collapse),
        ] {
            let translator: SharedTranslator =
                Arc::new(StringTranslator::new(DataTypeKey::xsd(local), mode));
            registry.register(DataTypeKey::xsd(local), Some(ValueKind::String), translator, true);
        }

        registry.register(
            DataTypeKey::xsd("date"),
            Some(ValueKind::Date),
            Arc::new(DateTranslator::new()),
            true,
        );
        registry.register(
            DataTypeKey::xsd("time"),
            Some(ValueKind::Time),
            Arc::new(TimeTranslator::new()),
            true,
        );
        registry.register(
            DataTypeKey::xsd("dateTime"),
            Some(ValueKind::DateTime),
            Arc::new(DateTimeTranslator::new()),
            true,
        );
        registry.register(
            DataTypeKey::xsd("hexBinary"),
            Some(ValueKind::Bytes),
            Arc::new(HexBinaryTranslator::new()),
            true,
        );

        let token_item: SharedTranslator = Arc::new(StringTranslator::new(
            DataTypeKey::xsd("token"),
            WhitespaceMode::Collapse,
        ));
        registry.register(
            DataTypeKey::xsd("NMTOKENS"),
            Some(ValueKind::List),
            Arc::new(ListTranslator::new(DataTypeKey::xsd("NMTOKENS"), token_item)),
            true,
        );

        registry
    }
}

impl Default for TranslatorRegistry {
    fn default() -> Self {
        TranslatorRegistry::new()
    }
}

// ============================================================================
// Built-in translators
// ============================================================================

struct BooleanTranslator {
    key: DataTypeKey,
}

impl BooleanTranslator {
    fn new() -> Self {
        BooleanTranslator { key: DataTypeKey::xsd("boolean") }
    }
}

impl ObjectTranslator for BooleanTranslator {
    fn data_type(&self) -> &DataTypeKey {
        &self.key
    }

    fn to_text(&self, value: &MetaValue) -> Result<String> {
        match value {
            MetaValue::Boolean(b) => Ok(b.to_string()),
            other => Err(wrong_kind(&self.key, other)),
        }
    }

    fn from_text(&self, text: &str, _context: &ReadContext<'_>) -> Result<MetaValue> {
        match text.trim() {
            "true" | "1" => Ok(MetaValue::Boolean(true)),
            "false" | "0" => Ok(MetaValue::Boolean(false)),
            _ => Err(Error::invalid_value(text, self.key.clone())),
        }
    }
}

struct IntegerTranslator {
    key: DataTypeKey,
    min: i64,
    max: i64,
}

impl IntegerTranslator {
    fn new(key: DataTypeKey, min: i64, max: i64) -> Self {
        IntegerTranslator { key, min, max }
    }
}

impl ObjectTranslator for IntegerTranslator {
    fn data_type(&self) -> &DataTypeKey {
        &self.key
    }

    fn to_text(&self, value: &MetaValue) -> Result<String> {
        match value {
            MetaValue::Int(i) if (self.min..=self.max).contains(i) => Ok(i.to_string()),
            MetaValue::Int(i) => Err(Error::Inconsistent(format!(
                "{i} is out of range for {}",
                self.key
            ))),
            other => Err(wrong_kind(&self.key, other)),
        }
    }

    fn from_text(&self, text: &str, _context: &ReadContext<'_>) -> Result<MetaValue> {
        let parsed: i64 = text
            .trim()
            .parse()
            .map_err(|_| Error::invalid_value(text, self.key.clone()))?;
        if (self.min..=self.max).contains(&parsed) {
            Ok(MetaValue::Int(parsed))
        } else {
            Err(Error::invalid_value(text, self.key.clone()))
        }
    }
}

struct FloatTranslator {
    key: DataTypeKey,
}

impl FloatTranslator {
    fn new(key: DataTypeKey) -> Self {
        FloatTranslator { key }
    }
}

impl ObjectTranslator for FloatTranslator {
    fn data_type(&self) -> &DataTypeKey {
        &self.key
    }

    fn to_text(&self, value: &MetaValue) -> Result<String> {
        match value {
            MetaValue::Double(d) => {
                if d.is_nan() {
                    Ok("NaN".to_string())
                } else if d.is_infinite() {
                    Ok(if *d > 0.0 { "INF" } else { "-INF" }.to_string())
                } else {
                    Ok(d.to_string())
                }
            }
            MetaValue::Int(i) => Ok(i.to_string()),
            other => Err(wrong_kind(&self.key, other)),
        }
    }

    fn from_text(&self, text: &str, _context: &ReadContext<'_>) -> Result<MetaValue> {
        let trimmed = text.trim();
        let value = match trimmed {
            "INF" => f64::INFINITY,
            "-INF" => f64::NEG_INFINITY,
            "NaN" => f64::NAN,
            other => other
                .parse()
                .map_err(|_| Error::invalid_value(text, self.key.clone()))?,
        };
        Ok(MetaValue::Double(value))
    }
}

#[derive(Clone, Copy)]
enum WhitespaceMode {
    /// Keep text as is.
    Preserve,
    /// Replace tab, carriage return, and newline with spaces.
    Replace,
    /// Replace, then collapse runs and trim.
    Collapse,
}

struct StringTranslator {
    key: DataTypeKey,
    mode: WhitespaceMode,
}

impl StringTranslator {
    fn new(key: DataTypeKey, mode: WhitespaceMode) -> Self {
        StringTranslator { key, mode }
    }

    fn normalize(&self, text: &str) -> String {
        match self.mode {
            WhitespaceMode::Preserve => text.to_string(),
            WhitespaceMode::Replace => text.replace(['\t', '\r', '\n'], " "),
            WhitespaceMode::Collapse => {
                text.split_whitespace().collect::<Vec<_>>().join(" ")
            }
        }
    }
}

impl ObjectTranslator for StringTranslator {
    fn data_type(&self) -> &DataTypeKey {
        &self.key
    }

    fn to_text(&self, value: &MetaValue) -> Result<String> {
        match value {
            MetaValue::String(s) => Ok(self.normalize(s)),
            other => Err(wrong_kind(&self.key, other)),
        }
    }

    fn from_text(&self, text: &str, _context: &ReadContext<'_>) -> Result<MetaValue> {
        Ok(MetaValue::String(self.normalize(text)))
    }
}

struct DateTranslator {
    key: DataTypeKey,
}

impl DateTranslator {
    fn new() -> Self {
        DateTranslator { key: DataTypeKey::xsd("date") }
    }
}

impl ObjectTranslator for DateTranslator {
    fn data_type(&self) -> &DataTypeKey {
        &self.key
    }

    fn to_text(&self, value: &MetaValue) -> Result<String> {
        match value {
            MetaValue::Date(d) => Ok(d.format("%Y-%m-%d").to_string()),
            other => Err(wrong_kind(&self.key, other)),
        }
    }

    fn from_text(&self, text: &str, _context: &ReadContext<'_>) -> Result<MetaValue> {
        NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d")
            .map(MetaValue::Date)
            .map_err(|_| Error::invalid_value(text, self.key.clone()))
    }
}

struct TimeTranslator {
    key: DataTypeKey,
}

impl TimeTranslator {
    fn new() -> Self {
        TimeTranslator { key: DataTypeKey::xsd("time") }
    }
}

impl ObjectTranslator for TimeTranslator {
    fn data_type(&self) -> &DataTypeKey {
        &self.key
    }

    fn to_text(&self, value: &MetaValue) -> Result<String> {
        match value {
            MetaValue::Time(t) => Ok(t.format("%H:%M:%S%.f").to_string()),
            other => Err(wrong_kind(&self.key, other)),
        }
    }

    fn from_text(&self, text: &str, _context: &ReadContext<'_>) -> Result<MetaValue> {
        NaiveTime::parse_from_str(text.trim(), "%H:%M:%S%.f")
            .map(MetaValue::Time)
            .map_err(|_| Error::invalid_value(text, self.key.clone()))
    }
}

struct DateTimeTranslator {
    key: DataTypeKey,
}

impl DateTimeTranslator {
    fn new() -> Self {
        DateTimeTranslator { key: DataTypeKey::xsd("dateTime") }
    }
}

impl ObjectTranslator for DateTimeTranslator {
    fn data_type(&self) -> &DataTypeKey {
        &self.key
    }

    fn to_text(&self, value: &MetaValue) -> Result<String> {
        match value {
            MetaValue::DateTime(dt) => Ok(dt.to_rfc3339()),
            other => Err(wrong_kind(&self.key, other)),
        }
    }

    fn from_text(&self, text: &str, _context: &ReadContext<'_>) -> Result<MetaValue> {
        let trimmed = text.trim();
        if let Ok(with_offset) = DateTime::parse_from_rfc3339(trimmed) {
            return Ok(MetaValue::DateTime(with_offset));
        }
        // Zone-less timestamps are read as UTC.
        NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| MetaValue::DateTime(DateTime::from_naive_utc_and_offset(naive, Utc.fix())))
            .map_err(|_| Error::invalid_value(text, self.key.clone()))
    }
}

struct HexBinaryTranslator {
    key: DataTypeKey,
}

impl HexBinaryTranslator {
    fn new() -> Self {
        HexBinaryTranslator { key: DataTypeKey::xsd("hexBinary") }
    }
}

impl ObjectTranslator for HexBinaryTranslator {
    fn data_type(&self) -> &DataTypeKey {
        &self.key
    }

    fn to_text(&self, value: &MetaValue) -> Result<String> {
        match value {
            MetaValue::Bytes(bytes) => Ok(hex::encode_upper(bytes)),
            other => Err(wrong_kind(&self.key, other)),
        }
    }

    fn from_text(&self, text: &str, _context: &ReadContext<'_>) -> Result<MetaValue> {
        hex::decode(text.trim())
            .map(MetaValue::Bytes)
            .map_err(|_| Error::invalid_value(text, self.key.clone()))
    }
}

/// Whitespace-separated list of another translator's values.
pub struct ListTranslator {
    key: DataTypeKey,
    item: SharedTranslator,
}

impl ListTranslator {
    pub fn new(key: DataTypeKey, item: SharedTranslator) -> Self {
        ListTranslator { key, item }
    }
}

impl ObjectTranslator for ListTranslator {
    fn data_type(&self) -> &DataTypeKey {
        &self.key
    }

    fn to_text(&self, value: &MetaValue) -> Result<String> {
        match value {
            MetaValue::List(items) => {
                let mut parts = Vec::with_capacity(items.len());
                for item in items {
                    parts.push(self.item.to_text(item)?);
                }
                Ok(parts.join(" "))
            }
            other => Err(wrong_kind(&self.key, other)),
        }
    }

    fn from_text(&self, text: &str, context: &ReadContext<'_>) -> Result<MetaValue> {
        let mut items = Vec::new();
        for part in text.split_whitespace() {
            items.push(self.item.from_text(part, context)?);
        }
        Ok(MetaValue::List(items))
    }
}

fn wrong_kind(key: &DataTypeKey, value: &MetaValue) -> Error {
    Error::Inconsistent(format!(
        "translator for {} cannot render a {:?} value",
        key,
        value.kind()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> ReadContext<'static> {
        ReadContext::empty()
    }

    #[test]
    fn test_first_registration_wins() {
        let mut registry = TranslatorRegistry::new();
        let a: SharedTranslator = Arc::new(FloatTranslator::new(DataTypeKey::xsd("double")));
        let b: SharedTranslator = Arc::new(IntegerTranslator::new(
            DataTypeKey::xsd("double"),
            i64::MIN,
            i64::MAX,
        ));
        registry.register(DataTypeKey::xsd("double"), None, a.clone(), false);
        registry.register(DataTypeKey::xsd("double"), None, b, false);
        let found = registry.default_for(&DataTypeKey::xsd("double")).unwrap();
        assert!(Arc::ptr_eq(found, &a));
    }

    #[test]
    fn test_default_flag_overrides() {
        let mut registry = TranslatorRegistry::new();
        let a: SharedTranslator = Arc::new(FloatTranslator::new(DataTypeKey::xsd("double")));
        let b: SharedTranslator = Arc::new(IntegerTranslator::new(
            DataTypeKey::xsd("double"),
            i64::MIN,
            i64::MAX,
        ));
        registry.register(DataTypeKey::xsd("double"), None, a, false);
        registry.register(DataTypeKey::xsd("double"), None, b.clone(), true);
        let found = registry.default_for(&DataTypeKey::xsd("double")).unwrap();
        assert!(Arc::ptr_eq(found, &b));
    }

    #[test]
    fn test_fragment_fallback_only_on_miss() {
        let registry = TranslatorRegistry::standard();
        let fragment_form = DataTypeKey::new("http://www.w3.org/2001/XMLSchema#", "int");
        assert!(registry.lookup(&fragment_form, None).is_none());
        assert!(registry.lookup_fallback(&fragment_form, None).is_some());
        let other = DataTypeKey::new("http://example.org/ns#", "int");
        assert!(registry.lookup_fallback(&other, None).is_none());
    }

    #[test]
    fn test_boolean_round_trip() {
        let registry = TranslatorRegistry::standard();
        let translator = registry.default_for(&DataTypeKey::xsd("boolean")).unwrap();
        assert_eq!(
            translator.from_text("1", &ctx()).unwrap(),
            MetaValue::Boolean(true)
        );
        assert_eq!(
            translator.to_text(&MetaValue::Boolean(false)).unwrap(),
            "false"
        );
        assert!(translator.from_text("yes", &ctx()).is_err());
    }

    #[test]
    fn test_integer_bounds() {
        let registry = TranslatorRegistry::standard();
        let byte = registry.default_for(&DataTypeKey::xsd("byte")).unwrap();
        assert_eq!(byte.from_text("-128", &ctx()).unwrap(), MetaValue::Int(-128));
        assert!(byte.from_text("128", &ctx()).is_err());
        let long = registry.default_for(&DataTypeKey::xsd("long")).unwrap();
        assert_eq!(
            long.from_text("9007199254740993", &ctx()).unwrap(),
            MetaValue::Int(9007199254740993)
        );
    }

    #[test]
    fn test_double_special_values() {
        let registry = TranslatorRegistry::standard();
        let double = registry.default_for(&DataTypeKey::xsd("double")).unwrap();
        assert_eq!(
            double.from_text("INF", &ctx()).unwrap(),
            MetaValue::Double(f64::INFINITY)
        );
        assert_eq!(double.to_text(&MetaValue::Double(f64::NEG_INFINITY)).unwrap(), "-INF");
        match double.from_text("NaN", &ctx()).unwrap() {
            MetaValue::Double(d) => assert!(d.is_nan()),
            other => panic!("expected double, got {other:?}"),
        }
    }

    #[test]
    fn test_token_collapses_whitespace() {
        let registry = TranslatorRegistry::standard();
        let token = registry.default_for(&DataTypeKey::xsd("token")).unwrap();
        assert_eq!(
            token.from_text("  a \t b\n c ", &ctx()).unwrap(),
            MetaValue::String("a b c".to_string())
        );
    }

    #[test]
    fn test_date_and_time() {
        let registry = TranslatorRegistry::standard();
        let date = registry.default_for(&DataTypeKey::xsd("date")).unwrap();
        let value = date.from_text("2006-05-04", &ctx()).unwrap();
        assert_eq!(date.to_text(&value).unwrap(), "2006-05-04");

        let datetime = registry.default_for(&DataTypeKey::xsd("dateTime")).unwrap();
        let value = datetime.from_text("2006-05-04T18:13:51+02:00", &ctx()).unwrap();
        assert_eq!(datetime.to_text(&value).unwrap(), "2006-05-04T18:13:51+02:00");
        assert!(datetime.from_text("2006-05-04T18:13:51", &ctx()).is_ok());
        assert!(datetime.from_text("not a date", &ctx()).is_err());
    }

    #[test]
    fn test_hex_binary() {
        let registry = TranslatorRegistry::standard();
        let hex_t = registry.default_for(&DataTypeKey::xsd("hexBinary")).unwrap();
        assert_eq!(
            hex_t.from_text("0fB8", &ctx()).unwrap(),
            MetaValue::Bytes(vec![0x0f, 0xb8])
        );
        assert_eq!(
            hex_t.to_text(&MetaValue::Bytes(vec![0x0f, 0xb8])).unwrap(),
            "0FB8"
        );
        assert!(hex_t.from_text("zz", &ctx()).is_err());
    }

    #[test]
    fn test_list_translator() {
        let registry = TranslatorRegistry::standard();
        let list = registry.default_for(&DataTypeKey::xsd("NMTOKENS")).unwrap();
        let value = list.from_text("a b  c", &ctx()).unwrap();
        assert_eq!(
            value,
            MetaValue::List(vec![
                MetaValue::String("a".into()),
                MetaValue::String("b".into()),
                MetaValue::String("c".into()),
            ])
        );
        assert_eq!(list.to_text(&value).unwrap(), "a b c");
    }

    #[test]
    fn test_render_falls_back_to_lexical() {
        let registry = TranslatorRegistry::standard();
        let unknown = DataTypeKey::new("http://example.org/ns", "custom");
        assert_eq!(registry.render(Some(&unknown), &MetaValue::Int(3)), "3");
        assert_eq!(registry.render(None, &MetaValue::Boolean(true)), "true");
        assert_eq!(
            registry.render(Some(&DataTypeKey::xsd("double")), &MetaValue::Double(f64::INFINITY)),
            "INF"
        );
    }
}
