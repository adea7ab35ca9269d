//! Document events - the unified output of every format reader.
//!
//! This is a SAX-style event model over phylogenetic content: events are
//! emitted as the reader encounters structure, with no accumulation into
//! a document object. Structure is represented by start/end event pairs;
//! childless constructs are emitted as a single sole event.
//!
//! Every event projects onto two axes: a [`ContentType`] saying what kind
//! of object it describes, and a [`Topology`] saying whether it opens,
//! closes, or fully represents that object. Readers for all dialects emit
//! the same event vocabulary, so a consumer written against this module
//! works unchanged across formats.
//!
//! These types are stable and hand-written.

use crate::datatype::DataTypeKey;
use crate::value::LiteralContent;

/// The kind of object an event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentType {
    /// The document itself. Every stream starts and ends here.
    Document,
    /// A list of operational taxonomic units.
    OtuList,
    /// One operational taxonomic unit.
    Otu,
    /// A character matrix or sequence alignment.
    Alignment,
    /// One row of an alignment.
    Sequence,
    /// A run of aligned tokens within a sequence.
    SequenceTokens,
    /// A column definition of a matrix.
    CharacterDefinition,
    /// A token set declaration (symbol alphabet) of a matrix.
    TokenSetDefinition,
    /// A single symbol definition inside a token set.
    TokenDefinition,
    /// A membership element inside a set-like construct.
    SetElement,
    /// A group of trees or networks sharing one OTU list.
    TreeGroup,
    /// A rooted or unrooted tree.
    Tree,
    /// A phylogenetic network.
    Network,
    /// A node of a tree or network.
    Node,
    /// A directed edge of a tree or network.
    Edge,
    /// An edge leading into the root, with no source node.
    RootEdge,
    /// A literal (value-carrying) metadata annotation.
    LiteralMeta,
    /// The content of a literal metadata annotation.
    LiteralMetaContent,
    /// A resource (link-carrying) metadata annotation.
    ResourceMeta,
    /// A comment carried by the source document.
    Comment,
    /// A command the reader recognized as well-formed but does not model.
    UnknownCommand,
}

impl ContentType {
    pub fn name(&self) -> &'static str {
        match self {
            ContentType::Document => "document",
            ContentType::OtuList => "OTU list",
            ContentType::Otu => "OTU",
            ContentType::Alignment => "alignment",
            ContentType::Sequence => "sequence",
            ContentType::SequenceTokens => "sequence tokens",
            ContentType::CharacterDefinition => "character definition",
            ContentType::TokenSetDefinition => "token set definition",
            ContentType::TokenDefinition => "token definition",
            ContentType::SetElement => "set element",
            ContentType::TreeGroup => "tree group",
            ContentType::Tree => "tree",
            ContentType::Network => "network",
            ContentType::Node => "node",
            ContentType::Edge => "edge",
            ContentType::RootEdge => "root edge",
            ContentType::LiteralMeta => "literal metadata",
            ContentType::LiteralMetaContent => "literal metadata content",
            ContentType::ResourceMeta => "resource metadata",
            ContentType::Comment => "comment",
            ContentType::UnknownCommand => "unknown command",
        }
    }

    /// Whether this content type belongs to the metadata layer.
    ///
    /// Metadata and comments may attach to any open construct; nesting
    /// rules treat them separately from structural content.
    pub fn is_meta(&self) -> bool {
        matches!(
            self,
            ContentType::LiteralMeta
                | ContentType::LiteralMetaContent
                | ContentType::ResourceMeta
        )
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Whether an event opens, closes, or fully represents its object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topology {
    Start,
    End,
    Sole,
}

/// A document-unique identifier.
///
/// Ids are non-empty strings. Within one read or write of a document each
/// id names exactly one object; a repeated `SequenceStart` carrying an
/// already-seen id continues that sequence rather than opening a new one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Id(String);

impl Id {
    /// Returns `None` for an empty string.
    pub fn new(value: impl Into<String>) -> Option<Id> {
        let value = value.into();
        if value.is_empty() {
            None
        } else {
            Some(Id(value))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Caller guarantees `value` is non-empty.
    pub(crate) fn from_trusted(value: String) -> Id {
        debug_assert!(!value.is_empty());
        Id(value)
    }
}

impl std::fmt::Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Id {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// The symbol alphabet a token set declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenSetKind {
    Dna,
    Rna,
    Protein,
    Standard,
    Continuous,
    Unknown,
}

impl TokenSetKind {
    pub fn name(&self) -> &'static str {
        match self {
            TokenSetKind::Dna => "DNA",
            TokenSetKind::Rna => "RNA",
            TokenSetKind::Protein => "protein",
            TokenSetKind::Standard => "standard",
            TokenSetKind::Continuous => "continuous",
            TokenSetKind::Unknown => "unknown",
        }
    }

    /// Whether tokens of this alphabet are single characters by default.
    pub fn single_char_tokens(&self) -> bool {
        !matches!(self, TokenSetKind::Continuous)
    }
}

/// What a single token definition stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenMeaning {
    /// An ordinary character state symbol.
    CharacterState,
    /// The gap symbol of the matrix.
    Gap,
    /// The missing-data symbol of the matrix.
    Missing,
    /// The match symbol, standing for the token of the first sequence.
    Match,
    /// A symbol with dialect-specific meaning not modeled here.
    Other,
}

/// A streaming document event.
///
/// Start and sole variants carry their payloads; a single [`Event::End`]
/// variant closes any open construct. Events are immutable once emitted.
///
/// ## Event sequences
///
/// A taxon list with two entries emits:
/// ```text
/// OtuListStart { id: "e1", label: None }
/// OtuStart { id: "e2", label: Some("A") }
/// End(Otu)
/// OtuStart { id: "e3", label: Some("B") }
/// End(Otu)
/// End(OtuList)
/// ```
///
/// Metadata and comments may appear inside any open construct:
/// ```text
/// NodeStart { .. }
/// LiteralMetaStart { predicate: "ex:support", .. }
/// LiteralMetaContent { .. }
/// End(LiteralMeta)
/// End(Node)
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Document start. The first event of every stream.
    DocumentStart,

    // ========== OTU Events ==========

    /// OTU list start.
    OtuListStart { id: Id, label: Option<String> },

    /// Single OTU start. Closed by `End(Otu)`; may contain metadata.
    OtuStart { id: Id, label: Option<String> },

    // ========== Matrix Events ==========

    /// Alignment start, optionally linked to the OTU list its rows refer to.
    AlignmentStart {
        id: Id,
        label: Option<String>,
        otu_list: Option<Id>,
    },

    /// Sequence (row) start, optionally linked to an OTU.
    ///
    /// Interleaved dialects emit several runs for one row; every run after
    /// the first reuses the id of the first.
    SequenceStart {
        id: Id,
        label: Option<String>,
        otu: Option<Id>,
    },

    /// A run of aligned tokens in document order.
    SequenceTokens { tokens: Vec<String> },

    /// Column definition of the enclosing alignment.
    CharacterDefinitionStart {
        id: Id,
        index: u64,
        label: Option<String>,
    },

    /// Token set declaration of the enclosing alignment.
    TokenSetDefinitionStart {
        id: Id,
        kind: TokenSetKind,
        label: Option<String>,
    },

    /// One symbol definition inside a token set.
    TokenDefinition {
        id: Id,
        token: String,
        meaning: TokenMeaning,
    },

    /// Membership of a previously declared object in a set-like construct.
    SetElement { referenced: Id },

    // ========== Tree Events ==========

    /// Tree group start, optionally linked to an OTU list.
    TreeGroupStart {
        id: Id,
        label: Option<String>,
        otu_list: Option<Id>,
    },

    /// Tree start.
    TreeStart { id: Id, label: Option<String> },

    /// Network start. Nodes may have several parent edges.
    NetworkStart { id: Id, label: Option<String> },

    /// Node start. Closed by `End(Node)`; may contain metadata.
    NodeStart {
        id: Id,
        label: Option<String>,
        otu: Option<Id>,
        root: bool,
    },

    /// Edge start. A missing source marks an edge into the root; such an
    /// event has content type [`ContentType::RootEdge`] and is closed by
    /// `End(RootEdge)`.
    EdgeStart {
        id: Id,
        source: Option<Id>,
        target: Id,
        length: Option<f64>,
    },

    // ========== Metadata Events ==========

    /// Literal metadata annotation start.
    LiteralMetaStart {
        id: Id,
        predicate: String,
        original_type: Option<DataTypeKey>,
        /// Alternative identifiers declared for the same annotation.
        alternatives: Vec<Id>,
    },

    /// Content of the enclosing literal metadata annotation.
    LiteralMetaContent { content: LiteralContent },

    /// Resource metadata annotation start. May contain nested metadata.
    ResourceMetaStart {
        id: Id,
        predicate: String,
        href: Option<String>,
        about: Option<String>,
    },

    /// A source comment. Oversized comments arrive as a chain of chunks;
    /// every chunk except the last sets `continued`.
    Comment { text: String, continued: bool },

    /// A well-formed command the reader does not model, surfaced verbatim.
    UnknownCommand { name: String, content: String },

    /// Closes the matching start event.
    End(ContentType),
}

impl Event {
    /// The content axis of this event.
    pub fn content_type(&self) -> ContentType {
        match self {
            Event::DocumentStart => ContentType::Document,
            Event::OtuListStart { .. } => ContentType::OtuList,
            Event::OtuStart { .. } => ContentType::Otu,
            Event::AlignmentStart { .. } => ContentType::Alignment,
            Event::SequenceStart { .. } => ContentType::Sequence,
            Event::SequenceTokens { .. } => ContentType::SequenceTokens,
            Event::CharacterDefinitionStart { .. } => ContentType::CharacterDefinition,
            Event::TokenSetDefinitionStart { .. } => ContentType::TokenSetDefinition,
            Event::TokenDefinition { .. } => ContentType::TokenDefinition,
            Event::SetElement { .. } => ContentType::SetElement,
            Event::TreeGroupStart { .. } => ContentType::TreeGroup,
            Event::TreeStart { .. } => ContentType::Tree,
            Event::NetworkStart { .. } => ContentType::Network,
            Event::NodeStart { .. } => ContentType::Node,
            Event::EdgeStart { source, .. } => {
                if source.is_some() {
                    ContentType::Edge
                } else {
                    ContentType::RootEdge
                }
            }
            Event::LiteralMetaStart { .. } => ContentType::LiteralMeta,
            Event::LiteralMetaContent { .. } => ContentType::LiteralMetaContent,
            Event::ResourceMetaStart { .. } => ContentType::ResourceMeta,
            Event::Comment { .. } => ContentType::Comment,
            Event::UnknownCommand { .. } => ContentType::UnknownCommand,
            Event::End(content) => *content,
        }
    }

    /// The topology axis of this event.
    pub fn topology(&self) -> Topology {
        match self {
            Event::End(_) => Topology::End,
            Event::SequenceTokens { .. }
            | Event::TokenDefinition { .. }
            | Event::SetElement { .. }
            | Event::LiteralMetaContent { .. }
            | Event::Comment { .. }
            | Event::UnknownCommand { .. } => Topology::Sole,
            _ => Topology::Start,
        }
    }

    /// The id of the object this event introduces, if it carries one.
    pub fn id(&self) -> Option<&Id> {
        match self {
            Event::OtuListStart { id, .. }
            | Event::OtuStart { id, .. }
            | Event::AlignmentStart { id, .. }
            | Event::SequenceStart { id, .. }
            | Event::CharacterDefinitionStart { id, .. }
            | Event::TokenSetDefinitionStart { id, .. }
            | Event::TokenDefinition { id, .. }
            | Event::TreeGroupStart { id, .. }
            | Event::TreeStart { id, .. }
            | Event::NetworkStart { id, .. }
            | Event::NodeStart { id, .. }
            | Event::EdgeStart { id, .. }
            | Event::LiteralMetaStart { id, .. }
            | Event::ResourceMetaStart { id, .. } => Some(id),
            _ => None,
        }
    }

    /// The label of the object this event introduces, if it carries one.
    pub fn label(&self) -> Option<&str> {
        match self {
            Event::OtuListStart { label, .. }
            | Event::OtuStart { label, .. }
            | Event::AlignmentStart { label, .. }
            | Event::SequenceStart { label, .. }
            | Event::CharacterDefinitionStart { label, .. }
            | Event::TokenSetDefinitionStart { label, .. }
            | Event::TreeGroupStart { label, .. }
            | Event::TreeStart { label, .. }
            | Event::NetworkStart { label, .. }
            | Event::NodeStart { label, .. } => label.as_deref(),
            _ => None,
        }
    }

    /// Check if this event belongs to the metadata layer.
    pub fn is_meta(&self) -> bool {
        self.content_type().is_meta()
    }

    /// Check if this is a comment event.
    pub fn is_comment(&self) -> bool {
        matches!(self, Event::Comment { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> Id {
        Id::new(s).unwrap()
    }

    #[test]
    fn test_id_rejects_empty() {
        assert!(Id::new("").is_none());
        assert_eq!(id("t1").as_str(), "t1");
    }

    #[test]
    fn test_topology_projection() {
        assert_eq!(Event::DocumentStart.topology(), Topology::Start);
        assert_eq!(
            Event::SequenceTokens { tokens: vec![] }.topology(),
            Topology::Sole
        );
        assert_eq!(Event::End(ContentType::Tree).topology(), Topology::End);
    }

    #[test]
    fn test_root_edge_content_type() {
        let edge = Event::EdgeStart {
            id: id("e1"),
            source: Some(id("n1")),
            target: id("n2"),
            length: Some(0.5),
        };
        assert_eq!(edge.content_type(), ContentType::Edge);

        let root_edge = Event::EdgeStart {
            id: id("e2"),
            source: None,
            target: id("n1"),
            length: None,
        };
        assert_eq!(root_edge.content_type(), ContentType::RootEdge);
    }

    #[test]
    fn test_label_projection() {
        let node = Event::NodeStart {
            id: id("n1"),
            label: Some("A".to_string()),
            otu: None,
            root: false,
        };
        assert_eq!(node.label(), Some("A"));
        assert_eq!(node.id(), Some(&id("n1")));
        assert_eq!(Event::End(ContentType::Node).label(), None);
    }

    #[test]
    fn test_meta_classification() {
        let meta = Event::ResourceMetaStart {
            id: id("m1"),
            predicate: "ex:see".to_string(),
            href: None,
            about: None,
        };
        assert!(meta.is_meta());
        assert!(!Event::DocumentStart.is_meta());
        assert!(Event::Comment { text: String::new(), continued: false }.is_comment());
    }
}
