//! Error taxonomy shared by readers, writers, and translators.
//!
//! Malformed input surfaces as [`Error::Parse`] with a best-effort source
//! location. Constructs a reader recognizes but declines are
//! [`Error::Unsupported`] and can be caught per record. Violations of the
//! event grammar ([`Error::Grammar`], [`Error::IllegalEvent`]) indicate a
//! programming error in the event producer and should fail fast.

use crate::datatype::DataTypeKey;
use crate::event::ContentType;
use crate::span::Location;

pub type Result<T, E = Error> = std::result::Result<T, E>;

fn fmt_location(location: &Option<Location>) -> String {
    match location {
        Some(loc) => format!(" at {loc}"),
        None => String::new(),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed input that cannot be consumed further.
    #[error("parse error{}: {message}", fmt_location(.location))]
    Parse {
        message: String,
        location: Option<Location>,
    },

    /// A structurally valid construct this reader or writer declines.
    #[error("unsupported{}: {message}", fmt_location(.location))]
    Unsupported {
        message: String,
        location: Option<Location>,
    },

    /// An event sequence that breaks the nesting contract.
    #[error("grammar violation: expected {expected}, found {found}")]
    Grammar {
        expected: ContentType,
        found: ContentType,
    },

    /// An event whose content type is not allowed under its parent.
    #[error("{content} event is not allowed under {}", parent_name(.parent))]
    IllegalEvent {
        parent: Option<ContentType>,
        content: ContentType,
    },

    /// Input text a translator could not read as its declared type.
    #[error("cannot read {text:?} as {data_type}")]
    InvalidValue { text: String, data_type: DataTypeKey },

    /// Data supplied by a writer adapter that contradicts itself.
    #[error("inconsistent source data: {0}")]
    Inconsistent(String),

    #[error("xml error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("xml attribute error: {0}")]
    XmlAttr(#[from] quick_xml::events::attributes::AttrError),

    #[error("xml escape error: {0}")]
    Escape(#[from] quick_xml::escape::EscapeError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn parent_name(parent: &Option<ContentType>) -> &'static str {
    match parent {
        Some(content) => content.name(),
        None => "the stream top level",
    }
}

impl Error {
    pub fn parse(message: impl Into<String>, location: Option<Location>) -> Self {
        Error::Parse { message: message.into(), location }
    }

    pub fn parse_at(message: impl Into<String>, location: Location) -> Self {
        Error::Parse { message: message.into(), location: Some(location) }
    }

    pub fn unsupported(message: impl Into<String>, location: Option<Location>) -> Self {
        Error::Unsupported { message: message.into(), location }
    }

    pub fn invalid_value(text: impl Into<String>, data_type: DataTypeKey) -> Self {
        Error::InvalidValue { text: text.into(), data_type }
    }

    /// The source location attached to this error, if any.
    pub fn location(&self) -> Option<Location> {
        match self {
            Error::Parse { location, .. } | Error::Unsupported { location, .. } => *location,
            _ => None,
        }
    }

    /// Fill in a location on errors that track one but have none yet.
    pub fn with_location(self, location: Location) -> Self {
        match self {
            Error::Parse { message, location: None } => {
                Error::Parse { message, location: Some(location) }
            }
            Error::Unsupported { message, location: None } => {
                Error::Unsupported { message, location: Some(location) }
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_display_with_location() {
        let err = Error::parse_at("unexpected token", Location::new(10, 2, 3));
        assert_eq!(
            err.to_string(),
            "parse error at line 2, column 3 (offset 10): unexpected token"
        );
    }

    #[test]
    fn test_parse_display_without_location() {
        let err = Error::parse("truncated input", None);
        assert_eq!(err.to_string(), "parse error: truncated input");
    }

    #[test]
    fn test_with_location_fills_only_missing() {
        let located = Error::parse_at("x", Location::new(1, 1, 2));
        let kept = located.with_location(Location::new(9, 9, 9));
        assert_eq!(kept.location(), Some(Location::new(1, 1, 2)));

        let filled = Error::parse("y", None).with_location(Location::new(4, 1, 5));
        assert_eq!(filled.location(), Some(Location::new(4, 1, 5)));
    }

    #[test]
    fn test_illegal_event_display() {
        let err = Error::IllegalEvent {
            parent: Some(ContentType::Otu),
            content: ContentType::Tree,
        };
        assert_eq!(err.to_string(), "tree event is not allowed under OTU");
    }
}
