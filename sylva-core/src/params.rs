//! Reader and writer configuration.
//!
//! A flat key to value map handed to every reader and writer call site.
//! Dialects read the keys they recognize and ignore the rest, so one map
//! can configure a whole pipeline. Typed accessors carry the documented
//! defaults; a value of the wrong type counts as unset.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::translate::TranslatorRegistry;

/// Recognized configuration keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamKey {
    /// Symbol standing for "same token as the first sequence here".
    MatchToken,
    /// Replace match tokens while reading. Defaults to on.
    ReplaceMatchTokens,
    /// Name-column width for fixed-width dialects.
    MaxNameLength,
    /// Whitespace-delimited Phylip names instead of a fixed-width column.
    RelaxedPhylip,
    /// Run internal node labels through translation tables too.
    TranslateNodeLabels,
    /// Read `#H`-tagged Newick input as networks.
    ExtendedNewick,
    /// Surface unknown commands as events instead of skipping them.
    EmitUnknownCommands,
    /// Override for the built-in translator registry.
    Translators,
}

/// A configuration value.
#[derive(Clone)]
pub enum ParamValue {
    Bool(bool),
    Int(u64),
    Text(String),
    Registry(Arc<TranslatorRegistry>),
}

impl fmt::Debug for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(b) => write!(f, "Bool({b})"),
            ParamValue::Int(i) => write!(f, "Int({i})"),
            ParamValue::Text(t) => write!(f, "Text({t:?})"),
            ParamValue::Registry(_) => f.write_str("Registry(..)"),
        }
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

impl From<u64> for ParamValue {
    fn from(value: u64) -> Self {
        ParamValue::Int(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Text(value)
    }
}

impl From<Arc<TranslatorRegistry>> for ParamValue {
    fn from(value: Arc<TranslatorRegistry>) -> Self {
        ParamValue::Registry(value)
    }
}

/// Flat configuration map passed to readers and writers.
#[derive(Debug, Clone, Default)]
pub struct ParameterMap {
    entries: HashMap<ParamKey, ParamValue>,
}

impl ParameterMap {
    pub fn new() -> Self {
        ParameterMap::default()
    }

    pub fn set(&mut self, key: ParamKey, value: impl Into<ParamValue>) {
        self.entries.insert(key, value.into());
    }

    /// Builder-style [`Self::set`].
    pub fn with(mut self, key: ParamKey, value: impl Into<ParamValue>) -> Self {
        self.set(key, value);
        self
    }

    pub fn get(&self, key: ParamKey) -> Option<&ParamValue> {
        self.entries.get(&key)
    }

    fn bool_or(&self, key: ParamKey, default: bool) -> bool {
        match self.entries.get(&key) {
            Some(ParamValue::Bool(b)) => *b,
            _ => default,
        }
    }

    fn text(&self, key: ParamKey) -> Option<&str> {
        match self.entries.get(&key) {
            Some(ParamValue::Text(t)) => Some(t.as_str()),
            _ => None,
        }
    }

    // ------------------------------------------------------------------
    // Typed accessors
    // ------------------------------------------------------------------

    pub fn match_token(&self) -> Option<&str> {
        self.text(ParamKey::MatchToken)
    }

    pub fn replace_match_tokens(&self) -> bool {
        self.bool_or(ParamKey::ReplaceMatchTokens, true)
    }

    pub fn max_name_length(&self) -> Option<usize> {
        match self.entries.get(&ParamKey::MaxNameLength) {
            Some(ParamValue::Int(i)) => Some(*i as usize),
            _ => None,
        }
    }

    pub fn relaxed_phylip(&self) -> bool {
        self.bool_or(ParamKey::RelaxedPhylip, false)
    }

    pub fn translate_node_labels(&self) -> bool {
        self.bool_or(ParamKey::TranslateNodeLabels, false)
    }

    pub fn extended_newick(&self) -> bool {
        self.bool_or(ParamKey::ExtendedNewick, false)
    }

    pub fn emit_unknown_commands(&self) -> bool {
        self.bool_or(ParamKey::EmitUnknownCommands, false)
    }

    /// The configured registry, or the built-in standard one.
    pub fn registry(&self) -> Arc<TranslatorRegistry> {
        match self.entries.get(&ParamKey::Translators) {
            Some(ParamValue::Registry(registry)) => Arc::clone(registry),
            _ => Arc::new(TranslatorRegistry::standard()),
        }
    }
}
