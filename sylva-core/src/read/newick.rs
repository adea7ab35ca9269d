//! Newick tree reader.
//!
//! A Newick file is a sequence of parenthesized tree descriptions, each
//! terminated by `;`. The reader wraps them all in one synthesized tree
//! group. Node events are emitted in completion order (children before
//! parents), edge events at the completion of their source node, and a
//! root edge when the outermost node carries a branch length.
//!
//! The payload parser is shared with the Nexus `TREE` command, which layers
//! translation-table label resolution on top via the resolver callback.
//!
//! With [`ParamKey::ExtendedNewick`](crate::params::ParamKey) set, node
//! labels carrying a `#`-tag (such as `X#H1`) are merged by tag into one
//! node, and the payload is delivered as a network instead of a tree.

use std::collections::HashMap;
use std::io::Read;

use crate::error::{Error, Result};
use crate::event::{ContentType, Event, Id};
use crate::params::ParameterMap;
use crate::read::text::Cursor;
use crate::read::EventReader;
use crate::state::{DocState, IdAllocator};

/// Resolves a node label token to a linked OTU id and display label.
///
/// Returning `None` keeps the token itself as the label, with no link.
pub(crate) type LabelResolver<'a> =
    dyn FnMut(&str, bool) -> Option<(Id, Option<String>)> + 'a;

// ============================================================================
// Payload parser
// ============================================================================

struct PayloadParser<'a, 'b> {
    cursor: &'a mut Cursor,
    ids: &'a mut IdAllocator,
    extended: bool,
    resolve: &'a mut LabelResolver<'b>,
    out: &'a mut Vec<Event>,
    /// Node ids in completion order.
    nodes: Vec<Id>,
    /// eNewick hybrid tag to merged node index.
    tags: HashMap<String, usize>,
}

/// Parse one `...;` tree description, emitting node and edge events.
///
/// Returns `true` when hybrid tags were merged, in which case the payload
/// describes a network.
pub(crate) fn parse_tree_payload(
    cursor: &mut Cursor,
    ids: &mut IdAllocator,
    extended: bool,
    resolve: &mut LabelResolver<'_>,
    out: &mut Vec<Event>,
) -> Result<bool> {
    let mut parser = PayloadParser {
        cursor,
        ids,
        extended,
        resolve,
        out,
        nodes: Vec::new(),
        tags: HashMap::new(),
    };
    parser.run()?;
    Ok(!parser.tags.is_empty())
}

impl PayloadParser<'_, '_> {
    fn run(&mut self) -> Result<()> {
        let mut stack: Vec<Vec<(usize, Option<f64>)>> = Vec::new();
        let mut closed_root = false;
        loop {
            self.skip_trivia()?;
            let location = self.cursor.location();
            match self.cursor.peek() {
                None => {
                    return Err(Error::parse_at(
                        "unexpected end of input in tree description",
                        location,
                    ));
                }
                Some(b';') => {
                    self.cursor.bump();
                    return Ok(());
                }
                Some(b'(') => {
                    if closed_root {
                        return Err(Error::parse_at(
                            "unexpected '(' after the tree root",
                            location,
                        ));
                    }
                    self.cursor.bump();
                    stack.push(Vec::new());
                }
                Some(b')') => {
                    let children = stack.pop().ok_or_else(|| {
                        Error::parse_at("unbalanced ')' in tree description", location)
                    })?;
                    self.cursor.bump();
                    let (label, length) = self.read_decorations()?;
                    self.complete_node(children, label, length, &mut stack)?;
                    closed_root = stack.is_empty();
                }
                Some(b',') => {
                    if stack.is_empty() {
                        return Err(Error::parse_at(
                            "unexpected ',' outside parentheses",
                            location,
                        ));
                    }
                    self.cursor.bump();
                }
                Some(_) => {
                    if closed_root {
                        return Err(Error::parse_at(
                            "unexpected text after the tree root",
                            location,
                        ));
                    }
                    let (label, length) = self.read_decorations()?;
                    if label.is_none() && length.is_none() {
                        return Err(Error::parse_at(
                            "unexpected character in tree description",
                            location,
                        ));
                    }
                    self.complete_node(Vec::new(), label, length, &mut stack)?;
                    closed_root = stack.is_empty();
                }
            }
        }
    }

    /// Emit the events for a node that just finished parsing.
    fn complete_node(
        &mut self,
        children: Vec<(usize, Option<f64>)>,
        label: Option<String>,
        length: Option<f64>,
        stack: &mut Vec<Vec<(usize, Option<f64>)>>,
    ) -> Result<()> {
        let is_root = stack.is_empty();
        let is_leaf = children.is_empty();

        let (name, tag) = self.split_hybrid_tag(label);
        let merged = tag.as_ref().and_then(|tag| self.tags.get(tag).copied());
        let index = match merged {
            // Later occurrences of a tag only contribute edges; the first
            // occurrence fixed the node's label and link.
            Some(index) => index,
            None => {
                let id = self.ids.fresh();
                let (otu, display) = match name.as_deref() {
                    Some(token) => match (self.resolve)(token, is_leaf) {
                        Some((otu, display)) => (Some(otu), display.or(name)),
                        None => (None, name),
                    },
                    None => (None, None),
                };
                self.out.push(Event::NodeStart {
                    id: id.clone(),
                    label: display,
                    otu,
                    root: is_root,
                });
                self.out.push(Event::End(ContentType::Node));
                self.nodes.push(id);
                let index = self.nodes.len() - 1;
                if let Some(tag) = tag {
                    self.tags.insert(tag, index);
                }
                index
            }
        };

        let source = self.nodes[index].clone();
        for (child, child_length) in children {
            self.out.push(Event::EdgeStart {
                id: self.ids.fresh(),
                source: Some(source.clone()),
                target: self.nodes[child].clone(),
                length: child_length,
            });
            self.out.push(Event::End(ContentType::Edge));
        }

        if is_root {
            if let Some(length) = length {
                self.out.push(Event::EdgeStart {
                    id: self.ids.fresh(),
                    source: None,
                    target: source,
                    length: Some(length),
                });
                self.out.push(Event::End(ContentType::RootEdge));
            }
        } else if let Some(list) = stack.last_mut() {
            list.push((index, length));
        }
        Ok(())
    }

    fn split_hybrid_tag(&mut self, label: Option<String>) -> (Option<String>, Option<String>) {
        if !self.extended {
            return (label, None);
        }
        match label {
            Some(label) => match label.find('#') {
                Some(at) => {
                    let name = &label[..at];
                    let tag = label[at..].to_string();
                    let name = if name.is_empty() {
                        None
                    } else {
                        Some(name.to_string())
                    };
                    (name, Some(tag))
                }
                None => (Some(label), None),
            },
            None => (None, None),
        }
    }

    /// Read the optional label and optional `:length` after a subtree.
    fn read_decorations(&mut self) -> Result<(Option<String>, Option<f64>)> {
        self.skip_trivia()?;
        let label = match self.cursor.peek() {
            Some(b'\'') => Some(self.cursor.read_quoted(b'\'')?),
            _ => {
                let raw = self.cursor.take_while(|b| {
                    !b.is_ascii_whitespace()
                        && !matches!(b, b'(' | b')' | b',' | b':' | b';' | b'[')
                });
                if raw.is_empty() {
                    None
                } else {
                    // Unquoted underscores stand for spaces.
                    Some(raw.replace('_', " "))
                }
            }
        };

        self.skip_trivia()?;
        let length = if self.cursor.eat(b':') {
            self.skip_trivia()?;
            let start = self.cursor.location();
            let token = self.cursor.take_while(|b| {
                matches!(b, b'0'..=b'9' | b'.' | b'-' | b'+' | b'e' | b'E')
            });
            let parsed: f64 = token.parse().map_err(|_| {
                Error::parse_at(format!("invalid branch length {token:?}"), start)
            })?;
            Some(parsed)
        } else {
            None
        };
        Ok((label, length))
    }

    /// Skip whitespace, emitting any comments met along the way.
    fn skip_trivia(&mut self) -> Result<()> {
        loop {
            self.cursor.skip_whitespace();
            if self.cursor.peek() == Some(b'[') {
                let text = self.cursor.read_bracketed(true)?;
                self.out.push(Event::Comment { text, continued: false });
            } else {
                return Ok(());
            }
        }
    }
}

// ============================================================================
// Reader
// ============================================================================

enum Stage {
    Start,
    Trees,
    Done,
}

/// Pull reader over a Newick file.
pub struct NewickReader {
    cursor: Cursor,
    doc: DocState,
    params: ParameterMap,
    stage: Stage,
}

impl NewickReader {
    pub fn new(reader: impl Read, params: ParameterMap) -> Result<Self> {
        Ok(NewickReader {
            cursor: Cursor::from_reader(reader)?,
            doc: DocState::new(),
            params,
            stage: Stage::Start,
        })
    }

    pub fn from_text(text: impl Into<String>, params: ParameterMap) -> Self {
        NewickReader {
            cursor: Cursor::new(text),
            doc: DocState::new(),
            params,
            stage: Stage::Start,
        }
    }

    fn fill(&mut self) -> Result<()> {
        while !self.doc.has_pending() {
            match self.stage {
                Stage::Start => {
                    self.doc.emit(Event::DocumentStart);
                    let group = self.doc.fresh_id();
                    self.doc.emit(Event::TreeGroupStart {
                        id: group,
                        label: None,
                        otu_list: None,
                    });
                    self.stage = Stage::Trees;
                }
                Stage::Trees => {
                    self.step_tree()?;
                }
                Stage::Done => return Ok(()),
            }
        }
        Ok(())
    }

    /// Parse one tree, or close the document at end of input.
    fn step_tree(&mut self) -> Result<()> {
        self.cursor.skip_whitespace();
        if self.cursor.peek() == Some(b'[') {
            // A comment between trees belongs to the group.
            let text = self.cursor.read_bracketed(true)?;
            self.doc.emit(Event::Comment { text, continued: false });
            return Ok(());
        }
        if self.cursor.is_eof() {
            self.doc.emit(Event::End(ContentType::TreeGroup));
            self.doc.emit(Event::End(ContentType::Document));
            self.stage = Stage::Done;
            return Ok(());
        }

        let mut payload = Vec::new();
        let mut resolve = |_: &str, _: bool| -> Option<(Id, Option<String>)> { None };
        let network = parse_tree_payload(
            &mut self.cursor,
            &mut self.doc.ids,
            self.params.extended_newick(),
            &mut resolve,
            &mut payload,
        )?;

        let id = self.doc.fresh_id();
        if network {
            self.doc.emit(Event::NetworkStart { id, label: None });
        } else {
            self.doc.emit(Event::TreeStart { id, label: None });
        }
        for event in payload {
            self.doc.emit(event);
        }
        self.doc.emit(Event::End(if network {
            ContentType::Network
        } else {
            ContentType::Tree
        }));
        Ok(())
    }
}

impl EventReader for NewickReader {
    fn next_event(&mut self) -> Result<Option<Event>> {
        self.fill()?;
        Ok(self.doc.take_next())
    }

    fn peek_event(&mut self) -> Result<Option<&Event>> {
        self.fill()?;
        Ok(self.doc.peek_front())
    }
}
