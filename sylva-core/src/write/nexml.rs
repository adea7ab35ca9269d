//! NeXML writer.
//!
//! Renders the event stream as `nexml` version 0.9 XML in the shape the
//! NeXML reader accepts. OTU lists, tree groups, trees, nodes and edges
//! stream out as their events arrive; a characters block is buffered
//! until its end event so its `xsi:type` can name the alphabet declared
//! by the token sets inside it and interleaved runs merge into one `seq`
//! per row. Stream ids are rewritten into XML-name-safe form, and every
//! reference to an id resolves to the same rewritten value.
//!
//! Literal annotations buffer their content. A short value becomes a
//! `content` attribute, oversized text falls back to element text, and
//! markup content nests as child elements. A datatype outside the XSD
//! namespace binds a local `d` prefix on its own `meta` element so the
//! name stays resolvable. Annotations arriving inside a buffered
//! characters block have no stable place in the output and are reported
//! as ignored; unknown commands have no XML form and are skipped.

use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::sync::Arc;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event as XmlEvent};
use quick_xml::Writer as XmlWriter;
use tracing::warn;
use unicode_xid::UnicodeXID;

use crate::datatype::{DataTypeKey, XSD_NAMESPACE};
use crate::error::{Error, Result};
use crate::event::{ContentType, Event, Id, TokenSetKind};
use crate::params::ParameterMap;
use crate::read::TEXT_CHUNK;
use crate::translate::TranslatorRegistry;
use crate::value::{LiteralContent, MetaValue, XmlFragment, XmlNode};
use crate::write::EventSink;

const NEXML_NAMESPACE: &str = "http://www.nexml.org/2009";
const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";

struct TokenBuf {
    id: Id,
    symbol: String,
    members: Vec<Id>,
}

struct TokenSetBuf {
    id: Id,
    label: Option<String>,
    tokens: Vec<TokenBuf>,
}

struct RowBuf {
    id: Id,
    label: Option<String>,
    otu: Option<Id>,
    data: Vec<String>,
}

/// One characters block, held back until its end event.
struct MatrixBuf {
    id: Id,
    label: Option<String>,
    otu_list: Option<Id>,
    kind: Option<TokenSetKind>,
    sets: Vec<TokenSetBuf>,
    chars: Vec<(Id, Option<String>)>,
    rows: Vec<RowBuf>,
    index: HashMap<Id, usize>,
    current: Option<usize>,
}

struct LiteralBuf {
    id: Id,
    predicate: String,
    datatype: Option<DataTypeKey>,
    pieces: Vec<LiteralContent>,
}

/// Maps stream ids to XML-name-safe ids, consistently for a declaration
/// and every reference to it.
struct IdMap {
    assigned: HashMap<Id, String>,
    used: HashSet<String>,
}

impl IdMap {
    fn new() -> Self {
        IdMap { assigned: HashMap::new(), used: HashSet::new() }
    }

    fn resolve(&mut self, id: &Id) -> String {
        if let Some(existing) = self.assigned.get(id) {
            return existing.clone();
        }
        let base = sanitize_id(id.as_str());
        let mut candidate = base.clone();
        let mut suffix = 1;
        while !self.used.insert(candidate.clone()) {
            suffix += 1;
            candidate = format!("{base}-{suffix}");
        }
        self.assigned.insert(id.clone(), candidate.clone());
        candidate
    }
}

/// Rewrite an id into a valid XML name: the first character must be a
/// letter or underscore, later ones may add digits, `-` and `.`.
fn sanitize_id(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for (position, c) in raw.chars().enumerate() {
        if position == 0 {
            if c.is_xid_start() || c == '_' {
                out.push(c);
            } else {
                out.push('_');
                if c.is_xid_continue() || matches!(c, '-' | '.') {
                    out.push(c);
                }
            }
        } else if c.is_xid_continue() || matches!(c, '-' | '.') {
            out.push(c);
        } else {
            out.push('_');
        }
    }
    out
}

fn seq_type(kind: TokenSetKind) -> Option<&'static str> {
    match kind {
        TokenSetKind::Dna => Some("nex:DnaSeqs"),
        TokenSetKind::Rna => Some("nex:RnaSeqs"),
        TokenSetKind::Protein => Some("nex:ProteinSeqs"),
        TokenSetKind::Standard => Some("nex:StandardSeqs"),
        TokenSetKind::Continuous => Some("nex:ContinuousSeqs"),
        TokenSetKind::Unknown => None,
    }
}

/// Inverse of the reader's tokenization: standard and continuous data
/// separate tokens with spaces, molecular alphabets pack one character
/// per column.
fn join_tokens(kind: TokenSetKind, tokens: &[String]) -> String {
    match kind {
        TokenSetKind::Standard | TokenSetKind::Continuous => tokens.join(" "),
        _ => tokens.concat(),
    }
}

/// Streaming NeXML writer.
pub struct NexmlWriter<W: Write> {
    writer: XmlWriter<W>,
    registry: Arc<TranslatorRegistry>,
    ids: IdMap,
    /// Names of open output elements, innermost last.
    open: Vec<&'static str>,
    matrix: Option<MatrixBuf>,
    literal: Option<LiteralBuf>,
    comment_buf: String,
    comment_pending: bool,
    skipped_objects: u64,
}

impl<W: Write> NexmlWriter<W> {
    pub fn new(out: W) -> Self {
        Self::with_params(out, &ParameterMap::new())
    }

    /// Writer honoring the translator registry in `params`.
    pub fn with_params(out: W, params: &ParameterMap) -> Self {
        NexmlWriter {
            writer: XmlWriter::new_with_indent(out, b' ', 1),
            registry: params.registry(),
            ids: IdMap::new(),
            open: Vec::new(),
            matrix: None,
            literal: None,
            comment_buf: String::new(),
            comment_pending: false,
            skipped_objects: 0,
        }
    }

    /// Recover the underlying output.
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }

    fn start(&mut self, elem: BytesStart<'_>, name: &'static str) -> Result<()> {
        self.writer.write_event(XmlEvent::Start(elem))?;
        self.open.push(name);
        Ok(())
    }

    fn close_open(&mut self) -> Result<()> {
        let name = self
            .open
            .pop()
            .ok_or_else(|| Error::Inconsistent("end event without an open element".into()))?;
        self.writer.write_event(XmlEvent::End(BytesEnd::new(name)))?;
        Ok(())
    }

    fn open_element(
        &mut self,
        name: &'static str,
        id: &Id,
        label: Option<&str>,
        type_name: Option<&str>,
    ) -> Result<()> {
        let id = self.ids.resolve(id);
        let mut elem = BytesStart::new(name);
        elem.push_attribute(("id", id.as_str()));
        if let Some(label) = label {
            elem.push_attribute(("label", label));
        }
        if let Some(type_name) = type_name {
            elem.push_attribute(("xsi:type", type_name));
        }
        self.start(elem, name)
    }

    /// Route one event into the open characters buffer.
    fn matrix_event(&mut self, event: &Event, parent: Option<ContentType>) -> Result<()> {
        if matches!(event, Event::End(ContentType::Alignment)) {
            if let Some(buffer) = self.matrix.take() {
                self.flush_matrix(buffer)?;
            }
            return Ok(());
        }
        let Some(buffer) = self.matrix.as_mut() else {
            return Ok(());
        };
        match event {
            Event::TokenSetDefinitionStart { id, kind, label } => {
                // The first token set decides the xsi:type of the block.
                buffer.kind.get_or_insert(*kind);
                buffer.sets.push(TokenSetBuf {
                    id: id.clone(),
                    label: label.clone(),
                    tokens: Vec::new(),
                });
            }
            Event::TokenDefinition { id, token, .. } => {
                if let Some(set) = buffer.sets.last_mut() {
                    set.tokens.push(TokenBuf {
                        id: id.clone(),
                        symbol: token.clone(),
                        members: Vec::new(),
                    });
                }
            }
            Event::SetElement { referenced } => {
                if let Some(token) = buffer.sets.last_mut().and_then(|set| set.tokens.last_mut()) {
                    token.members.push(referenced.clone());
                }
            }
            Event::CharacterDefinitionStart { id, label, .. } => {
                buffer.chars.push((id.clone(), label.clone()));
            }
            Event::SequenceStart { id, label, otu } => {
                let index = match buffer.index.get(id) {
                    Some(&index) => index,
                    None => {
                        buffer.rows.push(RowBuf {
                            id: id.clone(),
                            label: label.clone(),
                            otu: otu.clone(),
                            data: Vec::new(),
                        });
                        let index = buffer.rows.len() - 1;
                        buffer.index.insert(id.clone(), index);
                        index
                    }
                };
                buffer.current = Some(index);
            }
            Event::SequenceTokens { tokens } => {
                if let Some(index) = buffer.current {
                    buffer.rows[index].data.extend(tokens.iter().cloned());
                }
            }
            Event::End(ContentType::Sequence) => buffer.current = None,
            Event::End(ContentType::TokenSetDefinition | ContentType::CharacterDefinition) => {}
            Event::UnknownCommand { .. } => self.skipped_objects += 1,
            other => {
                return Err(Error::IllegalEvent {
                    parent,
                    content: other.content_type(),
                });
            }
        }
        Ok(())
    }

    fn flush_matrix(&mut self, buffer: MatrixBuf) -> Result<()> {
        let kind = buffer.kind.unwrap_or(TokenSetKind::Unknown);
        let id = self.ids.resolve(&buffer.id);
        let otus = buffer.otu_list.as_ref().map(|list| self.ids.resolve(list));
        let mut elem = BytesStart::new("characters");
        elem.push_attribute(("id", id.as_str()));
        if let Some(label) = &buffer.label {
            elem.push_attribute(("label", label.as_str()));
        }
        if let Some(otus) = &otus {
            elem.push_attribute(("otus", otus.as_str()));
        }
        if let Some(type_name) = seq_type(kind) {
            elem.push_attribute(("xsi:type", type_name));
        }
        self.writer.write_event(XmlEvent::Start(elem))?;

        if !buffer.sets.is_empty() || !buffer.chars.is_empty() {
            self.writer.write_event(XmlEvent::Start(BytesStart::new("format")))?;
            for set in &buffer.sets {
                let id = self.ids.resolve(&set.id);
                let mut elem = BytesStart::new("states");
                elem.push_attribute(("id", id.as_str()));
                if let Some(label) = &set.label {
                    elem.push_attribute(("label", label.as_str()));
                }
                self.writer.write_event(XmlEvent::Start(elem))?;
                for token in &set.tokens {
                    let id = self.ids.resolve(&token.id);
                    let mut elem = BytesStart::new("state");
                    elem.push_attribute(("id", id.as_str()));
                    elem.push_attribute(("symbol", token.symbol.as_str()));
                    if token.members.is_empty() {
                        self.writer.write_event(XmlEvent::Empty(elem))?;
                        continue;
                    }
                    self.writer.write_event(XmlEvent::Start(elem))?;
                    for member in &token.members {
                        let state = self.ids.resolve(member);
                        let mut elem = BytesStart::new("member");
                        elem.push_attribute(("state", state.as_str()));
                        self.writer.write_event(XmlEvent::Empty(elem))?;
                    }
                    self.writer.write_event(XmlEvent::End(BytesEnd::new("state")))?;
                }
                self.writer.write_event(XmlEvent::End(BytesEnd::new("states")))?;
            }
            for (id, label) in &buffer.chars {
                let id = self.ids.resolve(id);
                let mut elem = BytesStart::new("char");
                elem.push_attribute(("id", id.as_str()));
                if let Some(label) = label {
                    elem.push_attribute(("label", label.as_str()));
                }
                self.writer.write_event(XmlEvent::Empty(elem))?;
            }
            self.writer.write_event(XmlEvent::End(BytesEnd::new("format")))?;
        }

        self.writer.write_event(XmlEvent::Start(BytesStart::new("matrix")))?;
        for row in &buffer.rows {
            let id = self.ids.resolve(&row.id);
            let otu = row.otu.as_ref().map(|otu| self.ids.resolve(otu));
            let mut elem = BytesStart::new("row");
            elem.push_attribute(("id", id.as_str()));
            if let Some(label) = &row.label {
                elem.push_attribute(("label", label.as_str()));
            }
            if let Some(otu) = &otu {
                elem.push_attribute(("otu", otu.as_str()));
            }
            self.writer.write_event(XmlEvent::Start(elem))?;
            if !row.data.is_empty() {
                let text = join_tokens(kind, &row.data);
                self.writer.write_event(XmlEvent::Start(BytesStart::new("seq")))?;
                self.writer.write_event(XmlEvent::Text(BytesText::new(&text)))?;
                self.writer.write_event(XmlEvent::End(BytesEnd::new("seq")))?;
            }
            self.writer.write_event(XmlEvent::End(BytesEnd::new("row")))?;
        }
        self.writer.write_event(XmlEvent::End(BytesEnd::new("matrix")))?;
        self.writer.write_event(XmlEvent::End(BytesEnd::new("characters")))?;
        Ok(())
    }

    fn flush_literal(&mut self, buffer: LiteralBuf) -> Result<()> {
        let id = self.ids.resolve(&buffer.id);
        let datatype = buffer.datatype.as_ref().map(|key| {
            if key.is_xsd() {
                (None, format!("xsd:{}", key.local()))
            } else {
                (Some(key.namespace()), format!("d:{}", key.local()))
            }
        });
        let mut elem = BytesStart::new("meta");
        elem.push_attribute(("id", id.as_str()));
        elem.push_attribute(("xsi:type", "nex:LiteralMeta"));
        elem.push_attribute(("property", buffer.predicate.as_str()));
        if let Some((binding, value)) = &datatype {
            if let Some(namespace) = binding {
                elem.push_attribute(("xmlns:d", *namespace));
            }
            elem.push_attribute(("datatype", value.as_str()));
        }

        if buffer.pieces.iter().any(LiteralContent::is_xml) {
            self.writer.write_event(XmlEvent::Start(elem))?;
            for piece in &buffer.pieces {
                if let Some(MetaValue::Xml(fragment)) = piece.value() {
                    self.write_fragment(fragment)?;
                }
            }
            self.writer.write_event(XmlEvent::End(BytesEnd::new("meta")))?;
            return Ok(());
        }

        let text = match buffer.pieces.as_slice() {
            // A lone typed piece keeps its original text when it has one;
            // otherwise the registry renders the value back out.
            [single] => match (single.text_value(), single.value()) {
                (Some(text), _) => text.to_string(),
                (None, Some(value)) => self.registry.render(buffer.datatype.as_ref(), value),
                (None, None) => String::new(),
            },
            pieces => {
                let mut text = String::new();
                for piece in pieces {
                    if let Some(chunk) = piece.text_value() {
                        text.push_str(chunk);
                    }
                }
                text
            }
        };

        if text.len() > TEXT_CHUNK {
            self.writer.write_event(XmlEvent::Start(elem))?;
            self.writer.write_event(XmlEvent::Text(BytesText::new(&text)))?;
            self.writer.write_event(XmlEvent::End(BytesEnd::new("meta")))?;
            return Ok(());
        }
        if !text.is_empty() {
            elem.push_attribute(("content", text.as_str()));
        }
        self.writer.write_event(XmlEvent::Empty(elem))?;
        Ok(())
    }

    fn write_fragment(&mut self, fragment: &XmlFragment) -> Result<()> {
        let mut elem = BytesStart::new(fragment.name.as_str());
        for (key, value) in &fragment.attributes {
            elem.push_attribute((key.as_str(), value.as_str()));
        }
        if fragment.children.is_empty() {
            self.writer.write_event(XmlEvent::Empty(elem))?;
            return Ok(());
        }
        self.writer.write_event(XmlEvent::Start(elem))?;
        for child in &fragment.children {
            match child {
                XmlNode::Element(child) => self.write_fragment(child)?,
                XmlNode::Text(text) => {
                    self.writer.write_event(XmlEvent::Text(BytesText::new(text)))?;
                }
            }
        }
        self.writer.write_event(XmlEvent::End(BytesEnd::new(fragment.name.as_str())))?;
        Ok(())
    }

    /// Write the accumulated comment before the next construct opens.
    fn flush_comment(&mut self) -> Result<()> {
        if !self.comment_pending {
            return Ok(());
        }
        self.comment_pending = false;
        let text = std::mem::take(&mut self.comment_buf);
        // XML comments cannot contain a double hyphen or end on one.
        let mut safe = text.replace("--", "- -");
        if safe.ends_with('-') {
            safe.push(' ');
        }
        self.writer.write_event(XmlEvent::Comment(BytesText::from_escaped(safe)))?;
        Ok(())
    }
}

impl<W: Write> EventSink for NexmlWriter<W> {
    fn handle_event(&mut self, event: &Event, parent: Option<ContentType>) -> Result<()> {
        self.flush_comment()?;
        if self.matrix.is_some() {
            return self.matrix_event(event, parent);
        }
        match event {
            Event::DocumentStart => {
                self.writer
                    .write_event(XmlEvent::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
                let mut root = BytesStart::new("nexml");
                root.push_attribute(("version", "0.9"));
                root.push_attribute(("xmlns", NEXML_NAMESPACE));
                root.push_attribute(("xmlns:nex", NEXML_NAMESPACE));
                root.push_attribute(("xmlns:xsi", XSI_NAMESPACE));
                root.push_attribute(("xmlns:xsd", XSD_NAMESPACE));
                self.start(root, "nexml")?;
            }
            Event::OtuListStart { id, label } => {
                self.open_element("otus", id, label.as_deref(), None)?;
            }
            Event::OtuStart { id, label } => {
                self.open_element("otu", id, label.as_deref(), None)?;
            }
            Event::AlignmentStart { id, label, otu_list } => {
                self.matrix = Some(MatrixBuf {
                    id: id.clone(),
                    label: label.clone(),
                    otu_list: otu_list.clone(),
                    kind: None,
                    sets: Vec::new(),
                    chars: Vec::new(),
                    rows: Vec::new(),
                    index: HashMap::new(),
                    current: None,
                });
            }
            Event::TreeGroupStart { id, label, otu_list } => {
                let id = self.ids.resolve(id);
                let otus = otu_list.as_ref().map(|list| self.ids.resolve(list));
                let mut elem = BytesStart::new("trees");
                elem.push_attribute(("id", id.as_str()));
                if let Some(label) = label {
                    elem.push_attribute(("label", label.as_str()));
                }
                if let Some(otus) = &otus {
                    elem.push_attribute(("otus", otus.as_str()));
                }
                self.start(elem, "trees")?;
            }
            Event::TreeStart { id, label } => {
                self.open_element("tree", id, label.as_deref(), Some("nex:FloatTree"))?;
            }
            Event::NetworkStart { id, label } => {
                self.open_element("network", id, label.as_deref(), Some("nex:FloatNetwork"))?;
            }
            Event::NodeStart { id, label, otu, root } => {
                let id = self.ids.resolve(id);
                let otu = otu.as_ref().map(|otu| self.ids.resolve(otu));
                let mut elem = BytesStart::new("node");
                elem.push_attribute(("id", id.as_str()));
                if let Some(label) = label {
                    elem.push_attribute(("label", label.as_str()));
                }
                if let Some(otu) = &otu {
                    elem.push_attribute(("otu", otu.as_str()));
                }
                if *root {
                    elem.push_attribute(("root", "true"));
                }
                self.start(elem, "node")?;
            }
            Event::EdgeStart { id, source, target, length } => {
                let id = self.ids.resolve(id);
                let source = source.as_ref().map(|source| self.ids.resolve(source));
                let target = self.ids.resolve(target);
                let length = length.map(|length| length.to_string());
                let name = if source.is_some() { "edge" } else { "rootedge" };
                let mut elem = BytesStart::new(name);
                elem.push_attribute(("id", id.as_str()));
                if let Some(source) = &source {
                    elem.push_attribute(("source", source.as_str()));
                }
                elem.push_attribute(("target", target.as_str()));
                if let Some(length) = &length {
                    elem.push_attribute(("length", length.as_str()));
                }
                self.start(elem, name)?;
            }
            Event::UnknownCommand { .. } => self.skipped_objects += 1,
            Event::End(_) => self.close_open()?,
            other => {
                return Err(Error::IllegalEvent {
                    parent,
                    content: other.content_type(),
                });
            }
        }
        Ok(())
    }

    fn handle_metadata(&mut self, event: &Event, _parent: Option<ContentType>) -> Result<bool> {
        if self.matrix.is_some() {
            return Ok(false);
        }
        self.flush_comment()?;
        match event {
            Event::LiteralMetaStart { id, predicate, original_type, .. } => {
                self.literal = Some(LiteralBuf {
                    id: id.clone(),
                    predicate: predicate.clone(),
                    datatype: original_type.clone(),
                    pieces: Vec::new(),
                });
            }
            Event::LiteralMetaContent { content } => {
                if let Some(buffer) = self.literal.as_mut() {
                    buffer.pieces.push(content.clone());
                }
            }
            Event::End(ContentType::LiteralMeta) => {
                if let Some(buffer) = self.literal.take() {
                    self.flush_literal(buffer)?;
                }
            }
            Event::ResourceMetaStart { id, predicate, href, about } => {
                let id = self.ids.resolve(id);
                let mut elem = BytesStart::new("meta");
                elem.push_attribute(("id", id.as_str()));
                elem.push_attribute(("xsi:type", "nex:ResourceMeta"));
                elem.push_attribute(("rel", predicate.as_str()));
                if let Some(href) = href {
                    elem.push_attribute(("href", href.as_str()));
                }
                if let Some(about) = about {
                    elem.push_attribute(("about", about.as_str()));
                }
                self.start(elem, "meta")?;
            }
            Event::End(ContentType::ResourceMeta) => self.close_open()?,
            _ => return Ok(false),
        }
        Ok(true)
    }

    fn handle_comment(&mut self, text: &str, continued: bool) -> Result<bool> {
        if !continued {
            self.flush_comment()?;
        }
        self.comment_pending = true;
        self.comment_buf.push_str(text);
        Ok(true)
    }

    fn finish(&mut self) -> Result<()> {
        self.flush_comment()?;
        if self.skipped_objects > 0 {
            warn!(
                target: "sylva::write",
                skipped = self.skipped_objects,
                "nexml output skipped constructs the dialect cannot express"
            );
        }
        self.writer.get_mut().flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::TokenMeaning;
    use crate::read::{EventReader, NexmlReader};
    use crate::write::Receiver;

    fn id(s: &str) -> Id {
        Id::new(s).unwrap()
    }

    fn write_all(events: &[Event]) -> String {
        let mut receiver = Receiver::new(NexmlWriter::new(Vec::new()));
        for event in events {
            receiver.add(event).unwrap();
        }
        let sink = receiver.finish().unwrap();
        String::from_utf8(sink.into_inner()).unwrap()
    }

    fn read_all(text: &str) -> Vec<Event> {
        let mut reader = NexmlReader::from_text(text, ParameterMap::new());
        let mut events = Vec::new();
        while let Some(event) = reader.next_event().unwrap() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_writes_minimal_document() {
        let events = vec![
            Event::DocumentStart,
            Event::OtuListStart { id: id("otus1"), label: Some("Primary".to_string()) },
            Event::OtuStart { id: id("t1"), label: Some("A".to_string()) },
            Event::End(ContentType::Otu),
            Event::End(ContentType::OtuList),
            Event::End(ContentType::Document),
        ];
        let expected = concat!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n",
            "<nexml version=\"0.9\" xmlns=\"http://www.nexml.org/2009\"",
            " xmlns:nex=\"http://www.nexml.org/2009\"",
            " xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\"",
            " xmlns:xsd=\"http://www.w3.org/2001/XMLSchema\">\n",
            " <otus id=\"otus1\" label=\"Primary\">\n",
            "  <otu id=\"t1\" label=\"A\">\n",
            "  </otu>\n",
            " </otus>\n",
            "</nexml>",
        );
        assert_eq!(write_all(&events), expected);
    }

    #[test]
    fn test_document_roundtrips_through_reader() {
        let events = vec![
            Event::DocumentStart,
            Event::OtuListStart { id: id("otus1"), label: Some("Taxa".to_string()) },
            Event::OtuStart { id: id("t1"), label: Some("A".to_string()) },
            Event::End(ContentType::Otu),
            Event::OtuStart { id: id("t2"), label: Some("B".to_string()) },
            Event::End(ContentType::Otu),
            Event::End(ContentType::OtuList),
            Event::AlignmentStart {
                id: id("c1"),
                label: None,
                otu_list: Some(id("otus1")),
            },
            Event::TokenSetDefinitionStart {
                id: id("s1"),
                kind: TokenSetKind::Dna,
                label: None,
            },
            Event::TokenDefinition {
                id: id("st1"),
                token: "A".to_string(),
                meaning: TokenMeaning::CharacterState,
            },
            Event::TokenDefinition {
                id: id("st2"),
                token: "-".to_string(),
                meaning: TokenMeaning::Gap,
            },
            Event::End(ContentType::TokenSetDefinition),
            Event::CharacterDefinitionStart { id: id("ch1"), index: 0, label: None },
            Event::End(ContentType::CharacterDefinition),
            Event::CharacterDefinitionStart { id: id("ch2"), index: 1, label: None },
            Event::End(ContentType::CharacterDefinition),
            Event::SequenceStart { id: id("r1"), label: None, otu: Some(id("t1")) },
            Event::SequenceTokens { tokens: vec!["A".to_string(), "C".to_string()] },
            Event::End(ContentType::Sequence),
            Event::SequenceStart { id: id("r2"), label: None, otu: Some(id("t2")) },
            Event::SequenceTokens { tokens: vec!["A".to_string(), "-".to_string()] },
            Event::End(ContentType::Sequence),
            Event::End(ContentType::Alignment),
            Event::TreeGroupStart {
                id: id("g1"),
                label: None,
                otu_list: Some(id("otus1")),
            },
            Event::TreeStart { id: id("tr1"), label: None },
            Event::NodeStart { id: id("n1"), label: None, otu: None, root: true },
            Event::End(ContentType::Node),
            Event::NodeStart { id: id("n2"), label: None, otu: Some(id("t1")), root: false },
            Event::End(ContentType::Node),
            Event::NodeStart { id: id("n3"), label: None, otu: Some(id("t2")), root: false },
            Event::End(ContentType::Node),
            Event::EdgeStart {
                id: id("e1"),
                source: Some(id("n1")),
                target: id("n2"),
                length: Some(0.1),
            },
            Event::End(ContentType::Edge),
            Event::EdgeStart {
                id: id("e2"),
                source: Some(id("n1")),
                target: id("n3"),
                length: Some(0.2),
            },
            Event::End(ContentType::Edge),
            Event::End(ContentType::Tree),
            Event::End(ContentType::TreeGroup),
            Event::End(ContentType::Document),
        ];
        let text = write_all(&events);
        assert_eq!(read_all(&text), events);
    }

    #[test]
    fn test_literal_meta_written_as_content_attribute() {
        let events = vec![
            Event::DocumentStart,
            Event::LiteralMetaStart {
                id: id("m1"),
                predicate: "dc:rating".to_string(),
                original_type: Some(DataTypeKey::xsd("int")),
                alternatives: Vec::new(),
            },
            Event::LiteralMetaContent {
                content: LiteralContent::typed(MetaValue::Int(42), Some("42".to_string())),
            },
            Event::End(ContentType::LiteralMeta),
            Event::End(ContentType::Document),
        ];
        let text = write_all(&events);
        assert!(text.contains("xsi:type=\"nex:LiteralMeta\""));
        assert!(text.contains("property=\"dc:rating\""));
        assert!(text.contains("datatype=\"xsd:int\""));
        assert!(text.contains("content=\"42\""));

        let back = read_all(&text);
        let value = back.iter().find_map(|event| match event {
            Event::LiteralMetaContent { content } => content.value(),
            _ => None,
        });
        assert_eq!(value, Some(&MetaValue::Int(42)));
    }

    #[test]
    fn test_custom_datatype_binds_local_prefix() {
        let events = vec![
            Event::DocumentStart,
            Event::LiteralMetaStart {
                id: id("m1"),
                predicate: "ex:shade".to_string(),
                original_type: Some(DataTypeKey::new("http://example.org/types", "color")),
                alternatives: Vec::new(),
            },
            Event::LiteralMetaContent { content: LiteralContent::text("teal") },
            Event::End(ContentType::LiteralMeta),
            Event::End(ContentType::Document),
        ];
        let text = write_all(&events);
        assert!(text.contains("xmlns:d=\"http://example.org/types\""));
        assert!(text.contains("datatype=\"d:color\""));
        assert!(text.contains("content=\"teal\""));
    }

    #[test]
    fn test_long_text_falls_back_to_element_content() {
        let long = "x".repeat(TEXT_CHUNK + 10);
        let events = vec![
            Event::DocumentStart,
            Event::LiteralMetaStart {
                id: id("m1"),
                predicate: "ex:blob".to_string(),
                original_type: None,
                alternatives: Vec::new(),
            },
            Event::LiteralMetaContent { content: LiteralContent::text(&long[..TEXT_CHUNK]) },
            Event::LiteralMetaContent { content: LiteralContent::continued(&long[TEXT_CHUNK..]) },
            Event::End(ContentType::LiteralMeta),
            Event::End(ContentType::Document),
        ];
        let text = write_all(&events);
        assert!(!text.contains("content="));
        assert!(text.contains(&format!(">{long}</meta>")));

        let back = read_all(&text);
        let pieces: String = back
            .iter()
            .filter_map(|event| match event {
                Event::LiteralMetaContent { content } => content.text_value(),
                _ => None,
            })
            .collect();
        assert_eq!(pieces, long);
    }

    #[test]
    fn test_awkward_ids_are_rewritten_consistently() {
        let events = vec![
            Event::DocumentStart,
            Event::OtuListStart { id: id("taxon set"), label: None },
            Event::OtuStart { id: id("2 fish"), label: Some("Fish".to_string()) },
            Event::End(ContentType::Otu),
            Event::End(ContentType::OtuList),
            Event::AlignmentStart {
                id: id("c1"),
                label: None,
                otu_list: Some(id("taxon set")),
            },
            Event::SequenceStart { id: id("r1"), label: None, otu: Some(id("2 fish")) },
            Event::SequenceTokens { tokens: vec!["A".to_string()] },
            Event::End(ContentType::Sequence),
            Event::End(ContentType::Alignment),
            Event::End(ContentType::Document),
        ];
        let text = write_all(&events);
        assert!(text.contains("<otus id=\"taxon_set\">"));
        assert!(text.contains("id=\"_2_fish\""));
        assert!(text.contains("otus=\"taxon_set\""));
        assert!(text.contains("otu=\"_2_fish\""));
    }

    #[test]
    fn test_colliding_ids_get_distinct_names() {
        let mut ids = IdMap::new();
        assert_eq!(ids.resolve(&id("a b")), "a_b");
        assert_eq!(ids.resolve(&id("a.b")), "a.b");
        assert_eq!(ids.resolve(&id("a_b")), "a_b-2");
        // A second lookup returns the name already assigned.
        assert_eq!(ids.resolve(&id("a b")), "a_b");
    }

    #[test]
    fn test_comment_written_with_hyphens_sanitized() {
        let events = vec![
            Event::DocumentStart,
            Event::Comment { text: "checked -- twice".to_string(), continued: false },
            Event::OtuListStart { id: id("otus1"), label: None },
            Event::End(ContentType::OtuList),
            Event::End(ContentType::Document),
        ];
        let text = write_all(&events);
        assert!(text.contains("<!--checked - - twice-->"));

        let back = read_all(&text);
        assert!(back
            .iter()
            .any(|event| matches!(event, Event::Comment { text, .. } if text.contains("twice"))));
    }

    #[test]
    fn test_annotations_inside_matrix_are_reported_ignored() {
        let events = vec![
            Event::DocumentStart,
            Event::AlignmentStart { id: id("c1"), label: None, otu_list: None },
            Event::SequenceStart { id: id("r1"), label: Some("A".to_string()), otu: None },
            Event::LiteralMetaStart {
                id: id("m1"),
                predicate: "ex:note".to_string(),
                original_type: None,
                alternatives: Vec::new(),
            },
            Event::LiteralMetaContent { content: LiteralContent::text("dropped") },
            Event::End(ContentType::LiteralMeta),
            Event::End(ContentType::Sequence),
            Event::End(ContentType::Alignment),
            Event::End(ContentType::Document),
        ];
        let mut receiver = Receiver::new(NexmlWriter::new(Vec::new()));
        for event in &events {
            receiver.add(event).unwrap();
        }
        let (metadata, comments) = receiver.ignored();
        assert_eq!((metadata, comments), (1, 0));
        let text = String::from_utf8(receiver.finish().unwrap().into_inner()).unwrap();
        assert!(!text.contains("dropped"));
    }

    #[test]
    fn test_resource_meta_nests_its_children() {
        let events = vec![
            Event::DocumentStart,
            Event::ResourceMetaStart {
                id: id("m1"),
                predicate: "dc:source".to_string(),
                href: Some("http://example.org/study".to_string()),
                about: None,
            },
            Event::LiteralMetaStart {
                id: id("m2"),
                predicate: "dc:title".to_string(),
                original_type: None,
                alternatives: Vec::new(),
            },
            Event::LiteralMetaContent { content: LiteralContent::text("field notes") },
            Event::End(ContentType::LiteralMeta),
            Event::End(ContentType::ResourceMeta),
            Event::End(ContentType::Document),
        ];
        let text = write_all(&events);
        let outer = text.find("rel=\"dc:source\"").unwrap();
        let inner = text.find("property=\"dc:title\"").unwrap();
        let close = text.find("</meta>").unwrap();
        assert!(outer < inner && inner < close);

        let back = read_all(&text);
        assert!(back.iter().any(|event| matches!(
            event,
            Event::ResourceMetaStart { href: Some(href), .. }
            if href == "http://example.org/study"
        )));
    }
}
