//! Data type identifiers for typed metadata values.
//!
//! Annotation values carry a declared type, written in documents as a
//! namespaced name (an XSD simple type in the common case). Translator
//! lookup keys on these identifiers, including the fragment-separator
//! fallback some documents need because the XSD namespace is bound both
//! with and without a trailing `#`.

use std::fmt;

use phf::phf_set;

/// The XML Schema datatype namespace, without a fragment separator.
pub const XSD_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema";

/// XSD locals whose value space is plain text.
///
/// Character data declared with one of these types is forwarded as string
/// content instead of being routed through a translator.
pub static XSD_STRING_LOCALS: phf::Set<&'static str> = phf_set! {
    "string",
    "normalizedString",
    "token",
    "anyURI",
};

/// A namespaced data type name, e.g. `{http://www.w3.org/2001/XMLSchema}int`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DataTypeKey {
    namespace: String,
    local: String,
}

impl DataTypeKey {
    pub fn new(namespace: impl Into<String>, local: impl Into<String>) -> Self {
        DataTypeKey { namespace: namespace.into(), local: local.into() }
    }

    /// A key in the XSD namespace.
    pub fn xsd(local: impl Into<String>) -> Self {
        DataTypeKey::new(XSD_NAMESPACE, local)
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn local(&self) -> &str {
        &self.local
    }

    pub fn is_xsd(&self) -> bool {
        self.namespace == XSD_NAMESPACE || self.namespace == "http://www.w3.org/2001/XMLSchema#"
    }

    /// The same key with a trailing `#` removed from the namespace.
    ///
    /// Returns `None` when the namespace carries no fragment separator,
    /// so callers retry a lookup at most once.
    pub fn without_fragment(&self) -> Option<DataTypeKey> {
        let stripped = self.namespace.strip_suffix('#')?;
        Some(DataTypeKey::new(stripped, self.local.clone()))
    }
}

impl fmt::Display for DataTypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.ends_with('#') || self.namespace.ends_with('/') {
            write!(f, "{}{}", self.namespace, self.local)
        } else {
            write!(f, "{}#{}", self.namespace, self.local)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xsd_key() {
        let key = DataTypeKey::xsd("int");
        assert_eq!(key.namespace(), XSD_NAMESPACE);
        assert_eq!(key.local(), "int");
        assert!(key.is_xsd());
    }

    #[test]
    fn test_without_fragment() {
        let with = DataTypeKey::new("http://example.org/terms#", "thing");
        let stripped = with.without_fragment().unwrap();
        assert_eq!(stripped.namespace(), "http://example.org/terms");
        assert_eq!(stripped.local(), "thing");
        assert!(stripped.without_fragment().is_none());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            DataTypeKey::xsd("boolean").to_string(),
            "http://www.w3.org/2001/XMLSchema#boolean"
        );
        assert_eq!(
            DataTypeKey::new("http://example.org/ns#", "x").to_string(),
            "http://example.org/ns#x"
        );
    }

    #[test]
    fn test_string_locals() {
        assert!(XSD_STRING_LOCALS.contains("string"));
        assert!(XSD_STRING_LOCALS.contains("anyURI"));
        assert!(!XSD_STRING_LOCALS.contains("int"));
    }
}
