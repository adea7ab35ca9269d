//! Event-stream nesting rules.
//!
//! A conforming stream opens with a document start, closes every start with
//! an end of the same content type before its parent closes, and places each
//! structural event under a parent that allows it. [`Nesting`] checks those
//! rules one event at a time over a [`GrammarTable`] of per-parent allow
//! lists.
//!
//! Metadata and comments are exempt from the allow lists: they may attach to
//! any open construct. They carry their own constraints instead. A continued
//! comment must be followed by another comment, a continued literal content
//! by another content, and the contents of one literal annotation must agree
//! in class. Text chains until a non-continued content completes the value,
//! markup fragments may repeat, and a typed value stands alone.

use crate::error::{Error, Result};
use crate::event::{ContentType, Event, Topology};
use crate::value::LiteralContent;

/// Per-parent allow lists for structural events.
///
/// `None` as parent stands for the stream top level. Content types absent
/// from the table accept no structural children.
pub struct GrammarTable {
    rules: &'static [(Option<ContentType>, &'static [ContentType])],
}

impl GrammarTable {
    pub const fn new(
        rules: &'static [(Option<ContentType>, &'static [ContentType])],
    ) -> Self {
        GrammarTable { rules }
    }

    /// Whether `child` may occur directly under `parent`.
    pub fn allows(&self, parent: Option<ContentType>, child: ContentType) -> bool {
        self.rules
            .iter()
            .find(|(rule_parent, _)| *rule_parent == parent)
            .is_some_and(|(_, children)| children.contains(&child))
    }
}

/// The complete document grammar covering every structural content type.
///
/// Dialect writers narrow this down to the constructs their format can
/// represent; the validator itself always checks against the full grammar.
pub static DOCUMENT_GRAMMAR: GrammarTable = GrammarTable::new(&[
    (None, &[ContentType::Document]),
    (
        Some(ContentType::Document),
        &[
            ContentType::OtuList,
            ContentType::Alignment,
            ContentType::TreeGroup,
            ContentType::UnknownCommand,
        ],
    ),
    (
        Some(ContentType::OtuList),
        &[ContentType::Otu, ContentType::UnknownCommand],
    ),
    (
        Some(ContentType::Alignment),
        &[
            ContentType::CharacterDefinition,
            ContentType::TokenSetDefinition,
            ContentType::Sequence,
            ContentType::UnknownCommand,
        ],
    ),
    (Some(ContentType::Sequence), &[ContentType::SequenceTokens]),
    (
        Some(ContentType::TokenSetDefinition),
        &[ContentType::TokenDefinition, ContentType::SetElement],
    ),
    (
        Some(ContentType::TreeGroup),
        &[
            ContentType::Tree,
            ContentType::Network,
            ContentType::UnknownCommand,
        ],
    ),
    (
        Some(ContentType::Tree),
        &[ContentType::Node, ContentType::Edge, ContentType::RootEdge],
    ),
    (
        Some(ContentType::Network),
        &[ContentType::Node, ContentType::Edge, ContentType::RootEdge],
    ),
]);

/// Class of one literal metadata content event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContentClass {
    Text,
    Markup,
    Typed,
}

impl ContentClass {
    fn of(content: &LiteralContent) -> ContentClass {
        if content.is_xml() {
            ContentClass::Markup
        } else if content.value().is_some() {
            ContentClass::Typed
        } else {
            ContentClass::Text
        }
    }
}

/// Progress of the current literal annotation's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LiteralMode {
    /// No content seen yet.
    Open,
    /// A continued text chain is in progress.
    Text,
    /// One or more markup fragments seen; more may follow.
    Markup,
    /// The value is complete; only the closing end may follow.
    Done,
}

/// Incremental validator for one event stream.
pub struct Nesting {
    table: &'static GrammarTable,
    stack: Vec<ContentType>,
    literal: Option<LiteralMode>,
    awaiting_comment: bool,
    awaiting_content: bool,
}

impl Nesting {
    pub fn new(table: &'static GrammarTable) -> Self {
        Nesting {
            table,
            stack: Vec::new(),
            literal: None,
            awaiting_comment: false,
            awaiting_content: false,
        }
    }

    /// The innermost open content type.
    pub fn parent(&self) -> Option<ContentType> {
        self.stack.last().copied()
    }

    /// Number of currently open starts.
    #[inline]
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Whether every start has been closed and no continuation is pending.
    pub fn is_complete(&self) -> bool {
        self.stack.is_empty() && !self.awaiting_comment && !self.awaiting_content
    }

    /// Fails with a descriptive parse error when the stream stopped short.
    pub fn expect_complete(&self) -> Result<()> {
        if self.awaiting_comment {
            return Err(Error::parse("input ended inside a continued comment", None));
        }
        if self.awaiting_content {
            return Err(Error::parse(
                "input ended inside a continued literal metadata value",
                None,
            ));
        }
        match self.stack.last() {
            Some(open) => Err(Error::parse(
                format!(
                    "input ended with {} unclosed element(s); innermost is {open}",
                    self.stack.len()
                ),
                None,
            )),
            None => Ok(()),
        }
    }

    /// Validate one event and update the open-parent stack.
    pub fn advance(&mut self, event: &Event) -> Result<()> {
        let content_type = event.content_type();

        if self.awaiting_comment && content_type != ContentType::Comment {
            return Err(Error::Grammar {
                expected: ContentType::Comment,
                found: content_type,
            });
        }
        if self.awaiting_content
            && !matches!(
                content_type,
                ContentType::LiteralMetaContent | ContentType::Comment
            )
        {
            return Err(Error::Grammar {
                expected: ContentType::LiteralMetaContent,
                found: content_type,
            });
        }

        match event {
            Event::Comment { continued, .. } => {
                self.awaiting_comment = *continued;
                Ok(())
            }
            Event::End(closed) => {
                let closed = *closed;
                match self.stack.last() {
                    None => Err(Error::parse(
                        format!("unmatched end event for {closed}"),
                        None,
                    )),
                    Some(open) if *open != closed => Err(Error::Grammar {
                        expected: *open,
                        found: closed,
                    }),
                    Some(_) => {
                        self.stack.pop();
                        if closed == ContentType::LiteralMeta {
                            self.literal = None;
                        }
                        Ok(())
                    }
                }
            }
            Event::LiteralMetaContent { content } => {
                let mode = match self.literal {
                    Some(mode) => mode,
                    None => {
                        return Err(Error::IllegalEvent {
                            parent: self.parent(),
                            content: ContentType::LiteralMetaContent,
                        })
                    }
                };
                self.literal = Some(self.next_literal_mode(mode, content)?);
                self.awaiting_content = content.is_continued();
                Ok(())
            }
            Event::LiteralMetaStart { .. } | Event::ResourceMetaStart { .. } => {
                if self.literal.is_some() {
                    return Err(Error::IllegalEvent {
                        parent: Some(ContentType::LiteralMeta),
                        content: content_type,
                    });
                }
                if self.stack.is_empty() {
                    return Err(Error::IllegalEvent {
                        parent: None,
                        content: content_type,
                    });
                }
                if content_type == ContentType::LiteralMeta {
                    self.literal = Some(LiteralMode::Open);
                }
                self.stack.push(content_type);
                Ok(())
            }
            _ => {
                if self.literal.is_some() {
                    return Err(Error::IllegalEvent {
                        parent: Some(ContentType::LiteralMeta),
                        content: content_type,
                    });
                }
                if !self.table.allows(self.parent(), content_type) {
                    return Err(Error::IllegalEvent {
                        parent: self.parent(),
                        content: content_type,
                    });
                }
                if event.topology() == Topology::Start {
                    self.stack.push(content_type);
                }
                Ok(())
            }
        }
    }

    fn next_literal_mode(
        &self,
        mode: LiteralMode,
        content: &LiteralContent,
    ) -> Result<LiteralMode> {
        let class = ContentClass::of(content);
        match (mode, class) {
            (LiteralMode::Done, _) => Err(Error::parse(
                "literal metadata already carries a complete value",
                None,
            )),
            (LiteralMode::Open, ContentClass::Typed) => Ok(LiteralMode::Done),
            (LiteralMode::Open | LiteralMode::Text, ContentClass::Text) => {
                if content.is_continued() {
                    Ok(LiteralMode::Text)
                } else {
                    Ok(LiteralMode::Done)
                }
            }
            (LiteralMode::Open | LiteralMode::Markup, ContentClass::Markup) => {
                Ok(LiteralMode::Markup)
            }
            (LiteralMode::Text, ContentClass::Markup)
            | (LiteralMode::Markup, ContentClass::Text) => Err(Error::parse(
                "cannot mix text and markup in one literal metadata value",
                None,
            )),
            (LiteralMode::Text | LiteralMode::Markup, ContentClass::Typed) => {
                Err(Error::parse("a typed literal value must be the only content", None))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Id;
    use crate::value::{MetaValue, XmlFragment};

    fn id(text: &str) -> Id {
        Id::new(text).unwrap()
    }

    fn literal_start() -> Event {
        Event::LiteralMetaStart {
            id: id("m1"),
            predicate: "has_note".to_string(),
            original_type: None,
            alternatives: Vec::new(),
        }
    }

    fn advance_all(nesting: &mut Nesting, events: &[Event]) -> Result<()> {
        for event in events {
            nesting.advance(event)?;
        }
        Ok(())
    }

    #[test]
    fn test_accepts_document_with_tree() {
        let mut nesting = Nesting::new(&DOCUMENT_GRAMMAR);
        let events = [
            Event::DocumentStart,
            Event::TreeGroupStart { id: id("g1"), label: None, otu_list: None },
            Event::TreeStart { id: id("t1"), label: None },
            Event::NodeStart { id: id("n1"), label: None, otu: None, root: true },
            Event::End(ContentType::Node),
            Event::End(ContentType::Tree),
            Event::End(ContentType::TreeGroup),
            Event::End(ContentType::Document),
        ];
        advance_all(&mut nesting, &events).unwrap();
        assert!(nesting.is_complete());
        nesting.expect_complete().unwrap();
    }

    #[test]
    fn test_rejects_mismatched_end() {
        let mut nesting = Nesting::new(&DOCUMENT_GRAMMAR);
        nesting.advance(&Event::DocumentStart).unwrap();
        nesting
            .advance(&Event::OtuListStart { id: id("o1"), label: None })
            .unwrap();
        let err = nesting.advance(&Event::End(ContentType::Document)).unwrap_err();
        assert!(matches!(
            err,
            Error::Grammar { expected: ContentType::OtuList, found: ContentType::Document }
        ));
    }

    #[test]
    fn test_rejects_unmatched_end() {
        let mut nesting = Nesting::new(&DOCUMENT_GRAMMAR);
        assert!(nesting.advance(&Event::End(ContentType::Document)).is_err());
    }

    #[test]
    fn test_rejects_out_of_context_event() {
        let mut nesting = Nesting::new(&DOCUMENT_GRAMMAR);
        nesting.advance(&Event::DocumentStart).unwrap();
        nesting
            .advance(&Event::AlignmentStart { id: id("a1"), label: None, otu_list: None })
            .unwrap();
        let err = nesting
            .advance(&Event::NodeStart { id: id("n1"), label: None, otu: None, root: false })
            .unwrap_err();
        assert!(matches!(
            err,
            Error::IllegalEvent { parent: Some(ContentType::Alignment), content: ContentType::Node }
        ));
    }

    #[test]
    fn test_continued_comment_requires_comment() {
        let mut nesting = Nesting::new(&DOCUMENT_GRAMMAR);
        nesting.advance(&Event::DocumentStart).unwrap();
        nesting
            .advance(&Event::Comment { text: "part one".to_string(), continued: true })
            .unwrap();
        let err = nesting.advance(&Event::End(ContentType::Document)).unwrap_err();
        assert!(matches!(
            err,
            Error::Grammar { expected: ContentType::Comment, .. }
        ));
        nesting
            .advance(&Event::Comment { text: "part two".to_string(), continued: false })
            .unwrap();
        nesting.advance(&Event::End(ContentType::Document)).unwrap();
    }

    #[test]
    fn test_literal_text_chain() {
        let mut nesting = Nesting::new(&DOCUMENT_GRAMMAR);
        nesting.advance(&Event::DocumentStart).unwrap();
        nesting.advance(&literal_start()).unwrap();
        nesting
            .advance(&Event::LiteralMetaContent {
                content: LiteralContent::continued("long val"),
            })
            .unwrap();
        // The chain is open, so closing now is rejected.
        assert!(nesting.advance(&Event::End(ContentType::LiteralMeta)).is_err());
        nesting
            .advance(&Event::LiteralMetaContent {
                content: LiteralContent::text("ue"),
            })
            .unwrap();
        nesting.advance(&Event::End(ContentType::LiteralMeta)).unwrap();
        nesting.advance(&Event::End(ContentType::Document)).unwrap();
        assert!(nesting.is_complete());
    }

    #[test]
    fn test_literal_rejects_mixed_classes() {
        let mut nesting = Nesting::new(&DOCUMENT_GRAMMAR);
        nesting.advance(&Event::DocumentStart).unwrap();
        nesting.advance(&literal_start()).unwrap();
        nesting
            .advance(&Event::LiteralMetaContent {
                content: LiteralContent::continued("text"),
            })
            .unwrap();
        let markup =
            LiteralContent::typed(MetaValue::Xml(XmlFragment::new("span")), None);
        assert!(nesting
            .advance(&Event::LiteralMetaContent { content: markup })
            .is_err());
    }

    #[test]
    fn test_literal_typed_value_stands_alone() {
        let mut nesting = Nesting::new(&DOCUMENT_GRAMMAR);
        nesting.advance(&Event::DocumentStart).unwrap();
        nesting.advance(&literal_start()).unwrap();
        nesting
            .advance(&Event::LiteralMetaContent {
                content: LiteralContent::typed(MetaValue::Int(5), Some("5".to_string())),
            })
            .unwrap();
        let err = nesting
            .advance(&Event::LiteralMetaContent {
                content: LiteralContent::text("extra"),
            })
            .unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
    }

    #[test]
    fn test_markup_fragments_may_repeat() {
        let mut nesting = Nesting::new(&DOCUMENT_GRAMMAR);
        nesting.advance(&Event::DocumentStart).unwrap();
        nesting.advance(&literal_start()).unwrap();
        for name in ["a", "b"] {
            let fragment =
                LiteralContent::typed(MetaValue::Xml(XmlFragment::new(name)), None);
            nesting
                .advance(&Event::LiteralMetaContent { content: fragment })
                .unwrap();
        }
        nesting.advance(&Event::End(ContentType::LiteralMeta)).unwrap();
    }

    #[test]
    fn test_empty_literal_is_legal() {
        let mut nesting = Nesting::new(&DOCUMENT_GRAMMAR);
        nesting.advance(&Event::DocumentStart).unwrap();
        nesting.advance(&literal_start()).unwrap();
        nesting.advance(&Event::End(ContentType::LiteralMeta)).unwrap();
    }

    #[test]
    fn test_metadata_nests_under_resource_meta() {
        let mut nesting = Nesting::new(&DOCUMENT_GRAMMAR);
        nesting.advance(&Event::DocumentStart).unwrap();
        nesting
            .advance(&Event::ResourceMetaStart {
                id: id("r1"),
                predicate: "see_also".to_string(),
                href: None,
                about: None,
            })
            .unwrap();
        nesting.advance(&literal_start()).unwrap();
        nesting.advance(&Event::End(ContentType::LiteralMeta)).unwrap();
        nesting.advance(&Event::End(ContentType::ResourceMeta)).unwrap();
    }

    #[test]
    fn test_metadata_rejected_at_top_level() {
        let mut nesting = Nesting::new(&DOCUMENT_GRAMMAR);
        let err = nesting.advance(&literal_start()).unwrap_err();
        assert!(matches!(err, Error::IllegalEvent { parent: None, .. }));
    }

    #[test]
    fn test_expect_complete_reports_innermost() {
        let mut nesting = Nesting::new(&DOCUMENT_GRAMMAR);
        nesting.advance(&Event::DocumentStart).unwrap();
        nesting
            .advance(&Event::TreeGroupStart { id: id("g1"), label: None, otu_list: None })
            .unwrap();
        let err = nesting.expect_complete().unwrap_err();
        let text = err.to_string();
        assert!(text.contains("tree group"), "unexpected message: {text}");
    }
}
