//! NeXML reader.
//!
//! NeXML is the richest dialect this crate reads: OTU lists, character
//! matrices with explicit token sets, trees, networks, and metadata
//! annotations nested to any depth. The reader walks the XML token stream
//! and dispatches on the pair of an element's local name and the structural
//! context it appears in. Elements modeled in neither place are skipped
//! whole, subtree and all.
//!
//! Metadata needs the most care. A `meta` element is either a literal
//! annotation carrying a `property` and a value (from its `content`
//! attribute, its character data, or embedded markup) or a resource
//! annotation carrying `rel`, an optional `href`, and nested annotations.
//! Literal values with a non-string `datatype` go through the translator
//! registry; when the lexical form does not parse, the text is kept as-is.
//!
//! Cell-based matrices (`xsi:type="nex:DnaCells"` and friends) are skipped
//! with a recoverable [`Error::Unsupported`]: the offending `characters`
//! element is consumed before the error is returned, so the next call picks
//! up with the rest of the document.

use std::io::BufRead;
use std::sync::Arc;

use quick_xml::events::{BytesStart, Event as XmlEvent};
use quick_xml::Reader as XmlReader;
use tracing::{debug, warn};

use crate::datatype::{DataTypeKey, XSD_STRING_LOCALS};
use crate::error::{Error, Result};
use crate::event::{ContentType, Event, Id, TokenMeaning, TokenSetKind};
use crate::params::ParameterMap;
use crate::read::{for_each_chunk, EventReader};
use crate::sequence::MatchTokenManager;
use crate::span::Location;
use crate::state::DocState;
use crate::translate::{ReadContext, TranslatorRegistry};
use crate::value::{LiteralContent, MetaValue, XmlFragment, XmlNode};

/// Where the reader is relative to the document envelope.
enum Stage {
    Start,
    Body,
    Done,
}

/// Buffered value of an open literal annotation. Content is collected
/// until the closing tag because typed translation needs the complete
/// lexical form.
struct LiteralState {
    datatype: Option<DataTypeKey>,
    pieces: Vec<Piece>,
}

/// One unit of literal annotation content, in document order.
enum Piece {
    Text(String),
    Fragment(XmlFragment),
}

/// The structural meaning assigned to one open element.
enum Frame {
    Root,
    OtuList,
    Otu,
    Characters { kind: TokenSetKind, chars: u64 },
    Format,
    States,
    StateToken,
    Member,
    CharDef,
    Matrix,
    Row { id: Id },
    Seq { row: Id },
    TreeGroup,
    Tree,
    Network,
    Node,
    Edge(ContentType),
    LiteralMeta(LiteralState),
    ResourceMeta,
    Fragment,
}

/// An entry on the open element stack.
struct OpenElement {
    /// Local element name, kept for error reporting.
    name: String,
    /// How many namespace bindings this element declared.
    bindings: usize,
    frame: Frame,
}

/// Dispatch context, the frame on top of the stack.
#[derive(Clone, Copy)]
enum Ctx {
    Top,
    Root,
    OtuList,
    Otu,
    Characters,
    Format,
    States,
    StateToken,
    Member,
    CharDef,
    Matrix,
    Row,
    Seq,
    TreeGroup,
    Tree,
    Network,
    Node,
    Edge,
    LiteralMeta,
    ResourceMeta,
    Fragment,
}

/// Streaming reader for NeXML documents.
pub struct NexmlReader<R: BufRead> {
    reader: XmlReader<R>,
    buf: Vec<u8>,
    doc: DocState,
    registry: Arc<TranslatorRegistry>,
    match_token: Option<String>,
    replace_match: bool,
    manager: MatchTokenManager,
    stack: Vec<OpenElement>,
    /// In-scope `(prefix, uri)` bindings, outermost first. The empty
    /// prefix stands for the default namespace.
    namespaces: Vec<(String, String)>,
    /// Open custom elements inside a literal annotation.
    fragments: Vec<XmlFragment>,
    stage: Stage,
}

impl<'a> NexmlReader<&'a [u8]> {
    pub fn from_text(text: &'a str, params: ParameterMap) -> Self {
        NexmlReader::new(text.as_bytes(), params)
    }
}

impl<R: BufRead> NexmlReader<R> {
    pub fn new(input: R, params: ParameterMap) -> Self {
        let mut reader = XmlReader::from_reader(input);
        let config = reader.config_mut();
        config.trim_text(true);
        config.expand_empty_elements = true;
        let match_token = params.match_token().map(str::to_string);
        let replace_match = params.replace_match_tokens();
        NexmlReader {
            reader,
            buf: Vec::new(),
            doc: DocState::new(),
            registry: params.registry(),
            manager: MatchTokenManager::new(match_token.clone(), replace_match),
            match_token,
            replace_match,
            stack: Vec::new(),
            namespaces: Vec::new(),
            fragments: Vec::new(),
            stage: Stage::Start,
        }
    }

    /// The current byte offset. XML input is not line-indexed, so
    /// locations carry the offset alone.
    fn location(&self) -> Location {
        Location::at_offset(self.reader.buffer_position() as usize)
    }

    fn fill(&mut self) -> Result<()> {
        while !self.doc.has_pending() {
            match self.stage {
                Stage::Start => {
                    self.doc.emit(Event::DocumentStart);
                    self.stage = Stage::Body;
                }
                Stage::Body => self.step()?,
                Stage::Done => return Ok(()),
            }
        }
        Ok(())
    }

    /// Consume one XML token and queue whatever events it produces.
    fn step(&mut self) -> Result<()> {
        self.buf.clear();
        let token = self.reader.read_event_into(&mut self.buf)?.into_owned();
        match token {
            XmlEvent::Start(start) => self.on_start(start)?,
            // Empty never arrives: the config expands it into a start
            // and an end.
            XmlEvent::Empty(_) => {}
            XmlEvent::End(_) => self.on_end()?,
            XmlEvent::Text(text) => {
                let text = text.unescape()?;
                self.on_text(&text)?;
            }
            XmlEvent::CData(data) => {
                let bytes = data.into_inner();
                let text = std::str::from_utf8(&bytes).map_err(|_| {
                    Error::parse_at("CDATA section is not valid UTF-8", self.location())
                })?;
                self.on_text(text)?;
            }
            XmlEvent::Comment(comment) => {
                let bytes = comment.into_inner();
                let text = std::str::from_utf8(&bytes).map_err(|_| {
                    Error::parse_at("comment is not valid UTF-8", self.location())
                })?;
                self.on_comment(text);
            }
            XmlEvent::Decl(_) | XmlEvent::PI(_) | XmlEvent::DocType(_) => {}
            XmlEvent::Eof => return self.on_eof(),
        }
        Ok(())
    }

    fn on_start(&mut self, start: BytesStart<'static>) -> Result<()> {
        let raw_name = self.utf8(start.name().as_ref())?.to_string();
        let name = local_part(&raw_name).to_string();
        let attrs = self.collect_attrs(&start)?;
        let bindings = self.push_bindings(&attrs);
        let context = self.context();

        // Everything below a literal annotation is captured as markup.
        if matches!(context, Ctx::LiteralMeta | Ctx::Fragment) {
            let mut fragment = XmlFragment::new(raw_name);
            fragment.attributes = attrs;
            self.fragments.push(fragment);
            self.stack.push(OpenElement { name, bindings, frame: Frame::Fragment });
            return Ok(());
        }

        let frame = match (context, name.as_str()) {
            (Ctx::Top, "nexml") => Frame::Root,
            (Ctx::Root, "otus") => {
                let id = self.identified(&attrs);
                let label = label_attr(&attrs);
                self.doc.emit(Event::OtuListStart { id, label });
                Frame::OtuList
            }
            (Ctx::OtuList, "otu") => {
                let id = self.identified(&attrs);
                let label = label_attr(&attrs);
                self.doc.emit(Event::OtuStart { id, label });
                Frame::Otu
            }
            (Ctx::Root, "characters") => {
                let (kind, cells) = characters_layout(attr(&attrs, "type"));
                if cells {
                    self.skip_subtree(&start, bindings)?;
                    return Err(Error::unsupported(
                        "cell-based characters matrices are not supported",
                        Some(self.location()),
                    ));
                }
                let id = self.identified(&attrs);
                let label = label_attr(&attrs);
                let otu_list = link_attr(&attrs, "otus");
                self.doc.emit(Event::AlignmentStart { id, label, otu_list });
                // A fresh matrix starts over with its own reference row.
                self.manager =
                    MatchTokenManager::new(self.match_token.clone(), self.replace_match);
                Frame::Characters { kind, chars: 0 }
            }
            (Ctx::Characters, "format") => Frame::Format,
            (Ctx::Format, "states") => {
                let id = self.identified(&attrs);
                let label = label_attr(&attrs);
                let kind = self.alignment_kind();
                self.doc.emit(Event::TokenSetDefinitionStart { id, kind, label });
                Frame::States
            }
            (Ctx::States, "state" | "polymorphic_state_set" | "uncertain_state_set") => {
                let id = self.identified(&attrs);
                let symbol = self.required(&attrs, "symbol", "state")?.to_string();
                let meaning = match symbol.as_str() {
                    "?" => TokenMeaning::Missing,
                    "-" => TokenMeaning::Gap,
                    _ => TokenMeaning::CharacterState,
                };
                self.doc.emit(Event::TokenDefinition { id, token: symbol, meaning });
                Frame::StateToken
            }
            (Ctx::StateToken, "member") => {
                let referenced = self.required_id(&attrs, "state", "member")?;
                self.doc.emit(Event::SetElement { referenced });
                Frame::Member
            }
            (Ctx::Format, "char") => {
                let id = self.identified(&attrs);
                let label = label_attr(&attrs);
                let index = self.next_char_index();
                self.doc.emit(Event::CharacterDefinitionStart { id, index, label });
                Frame::CharDef
            }
            (Ctx::Characters, "matrix") => Frame::Matrix,
            (Ctx::Matrix, "row") => {
                let id = self.identified(&attrs);
                let label = label_attr(&attrs);
                let otu = link_attr(&attrs, "otu");
                self.doc.emit(Event::SequenceStart { id: id.clone(), label, otu });
                Frame::Row { id }
            }
            (Ctx::Row, "seq") => {
                let row = self.current_row().unwrap_or_else(|| self.doc.fresh_id());
                Frame::Seq { row }
            }
            (Ctx::Root, "trees") => {
                let id = self.identified(&attrs);
                let label = label_attr(&attrs);
                let otu_list = link_attr(&attrs, "otus");
                self.doc.emit(Event::TreeGroupStart { id, label, otu_list });
                Frame::TreeGroup
            }
            (Ctx::TreeGroup, "tree") => {
                let id = self.identified(&attrs);
                let label = label_attr(&attrs);
                self.doc.emit(Event::TreeStart { id, label });
                Frame::Tree
            }
            (Ctx::TreeGroup, "network") => {
                let id = self.identified(&attrs);
                let label = label_attr(&attrs);
                self.doc.emit(Event::NetworkStart { id, label });
                Frame::Network
            }
            (Ctx::Tree | Ctx::Network, "node") => {
                let id = self.identified(&attrs);
                let label = label_attr(&attrs);
                let otu = link_attr(&attrs, "otu");
                let root = matches!(attr(&attrs, "root"), Some("true") | Some("1"));
                self.doc.emit(Event::NodeStart { id, label, otu, root });
                Frame::Node
            }
            (Ctx::Tree | Ctx::Network, "edge") => {
                let id = self.identified(&attrs);
                let source = self.required_id(&attrs, "source", "edge")?;
                let target = self.required_id(&attrs, "target", "edge")?;
                let length = self.length_attr(&attrs)?;
                self.doc.emit(Event::EdgeStart {
                    id,
                    source: Some(source),
                    target,
                    length,
                });
                Frame::Edge(ContentType::Edge)
            }
            (Ctx::Tree | Ctx::Network, "rootedge") => {
                let id = self.identified(&attrs);
                let target = self.required_id(&attrs, "target", "rootedge")?;
                let length = self.length_attr(&attrs)?;
                self.doc.emit(Event::EdgeStart { id, source: None, target, length });
                Frame::Edge(ContentType::RootEdge)
            }
            (context, "meta") if allows_meta(context) => self.meta_start(&attrs)?,
            _ => {
                debug!(target: "sylva::nexml", element = %name, "skipping unmodeled element");
                self.skip_subtree(&start, bindings)?;
                return Ok(());
            }
        };
        self.stack.push(OpenElement { name, bindings, frame });
        Ok(())
    }

    /// Open a `meta` element as either a literal or a resource annotation.
    fn meta_start(&mut self, attrs: &[(String, String)]) -> Result<Frame> {
        let id = self.identified(attrs);
        let resource = match attr(attrs, "type").map(local_part) {
            Some("LiteralMeta") => false,
            Some("ResourceMeta") => true,
            Some(other) => {
                return Err(Error::parse_at(
                    format!("meta element with unrecognized type {other:?}"),
                    self.location(),
                ));
            }
            // Without xsi:type, infer the flavor from the attributes.
            None => attr(attrs, "rel").is_some() || attr(attrs, "href").is_some(),
        };

        if resource {
            let predicate = self.required(attrs, "rel", "resource meta")?.to_string();
            let href = attr(attrs, "href").map(str::to_string);
            let about = attr(attrs, "about").map(str::to_string);
            self.doc.emit(Event::ResourceMetaStart { id, predicate, href, about });
            return Ok(Frame::ResourceMeta);
        }

        let predicate = self.required(attrs, "property", "literal meta")?.to_string();
        let datatype = match attr(attrs, "datatype") {
            Some(value) => Some(self.resolve_datatype(value)?),
            None => None,
        };
        self.doc.emit(Event::LiteralMetaStart {
            id,
            predicate,
            original_type: datatype.clone(),
            alternatives: Vec::new(),
        });
        let mut pieces = Vec::new();
        if let Some(content) = attr(attrs, "content") {
            pieces.push(Piece::Text(content.to_string()));
        }
        Ok(Frame::LiteralMeta(LiteralState { datatype, pieces }))
    }

    fn on_end(&mut self) -> Result<()> {
        let open = self
            .stack
            .pop()
            .ok_or_else(|| Error::parse_at("unexpected closing tag", self.location()))?;
        match open.frame {
            Frame::Root => {
                self.doc.emit(Event::End(ContentType::Document));
                self.stage = Stage::Done;
            }
            Frame::OtuList => self.doc.emit(Event::End(ContentType::OtuList)),
            Frame::Otu => self.doc.emit(Event::End(ContentType::Otu)),
            Frame::Characters { .. } => self.doc.emit(Event::End(ContentType::Alignment)),
            Frame::Format | Frame::Matrix | Frame::StateToken | Frame::Member => {}
            Frame::Seq { .. } => {}
            Frame::States => self.doc.emit(Event::End(ContentType::TokenSetDefinition)),
            Frame::CharDef => self.doc.emit(Event::End(ContentType::CharacterDefinition)),
            Frame::Row { .. } => self.doc.emit(Event::End(ContentType::Sequence)),
            Frame::TreeGroup => self.doc.emit(Event::End(ContentType::TreeGroup)),
            Frame::Tree => self.doc.emit(Event::End(ContentType::Tree)),
            Frame::Network => self.doc.emit(Event::End(ContentType::Network)),
            Frame::Node => self.doc.emit(Event::End(ContentType::Node)),
            Frame::Edge(content) => self.doc.emit(Event::End(content)),
            Frame::LiteralMeta(state) => {
                // Flush before dropping this element's bindings; typed
                // translation resolves prefixes against the full scope.
                self.flush_literal(state)?;
                self.doc.emit(Event::End(ContentType::LiteralMeta));
            }
            Frame::ResourceMeta => self.doc.emit(Event::End(ContentType::ResourceMeta)),
            Frame::Fragment => self.close_fragment(),
        }
        self.namespaces.truncate(self.namespaces.len() - open.bindings);
        Ok(())
    }

    fn on_text(&mut self, text: &str) -> Result<()> {
        match self.context() {
            Ctx::Seq => {
                let kind = self.alignment_kind();
                let tokens = tokenize_run(kind, text);
                if tokens.is_empty() {
                    return Ok(());
                }
                let row = match self.stack.last() {
                    Some(OpenElement { frame: Frame::Seq { row }, .. }) => row.clone(),
                    _ => return Ok(()),
                };
                let location = self.location();
                let tokens = self
                    .manager
                    .process(row.as_str(), tokens)
                    .map_err(|err| err.with_location(location))?;
                self.doc.emit(Event::SequenceTokens { tokens });
            }
            Ctx::Fragment => {
                if let Some(top) = self.fragments.last_mut() {
                    top.children.push(XmlNode::Text(text.to_string()));
                }
            }
            Ctx::LiteralMeta => {
                if let Some(state) = self.literal_state_mut() {
                    match state.pieces.last_mut() {
                        Some(Piece::Text(existing)) => existing.push_str(text),
                        _ => state.pieces.push(Piece::Text(text.to_string())),
                    }
                }
            }
            _ => {
                debug!(target: "sylva::nexml", "ignoring stray character data");
            }
        }
        Ok(())
    }

    fn on_comment(&mut self, text: &str) {
        let doc = &mut self.doc;
        for_each_chunk(text, |chunk, continued| {
            doc.emit(Event::Comment { text: chunk.to_string(), continued });
        });
    }

    fn on_eof(&mut self) -> Result<()> {
        if let Some(open) = self.stack.last() {
            return Err(Error::parse_at(
                format!("input ended inside an unclosed {} element", open.name),
                self.location(),
            ));
        }
        // Reaching EOF in the body with nothing open means no root
        // element was ever seen; a closed root parks the reader in Done.
        Err(Error::parse_at("missing nexml root element", self.location()))
    }

    /// Turn the buffered content of a literal annotation into events.
    fn flush_literal(&mut self, state: LiteralState) -> Result<()> {
        let LiteralState { datatype, pieces } = state;
        if let [Piece::Text(text)] = &pieces[..] {
            if let Some(key) = datatype.as_ref().filter(|key| wants_translation(key)) {
                let translated = {
                    let context = ReadContext::new(&self.namespaces);
                    self.registry.read_text(key, text, &context)
                };
                match translated {
                    Ok(Some(value)) => {
                        let content = LiteralContent::typed(value, Some(text.clone()));
                        self.doc.emit(Event::LiteralMetaContent { content });
                        return Ok(());
                    }
                    Ok(None) => {}
                    Err(Error::InvalidValue { .. }) => {
                        warn!(
                            target: "sylva::nexml",
                            data_type = %key,
                            "annotation value did not parse, keeping its text"
                        );
                    }
                    Err(other) => return Err(other),
                }
            }
            self.emit_literal_text(text);
            return Ok(());
        }
        for piece in pieces {
            match piece {
                Piece::Text(text) => self.emit_literal_text(&text),
                Piece::Fragment(fragment) => self.doc.emit(Event::LiteralMetaContent {
                    content: LiteralContent::typed(MetaValue::Xml(fragment), None),
                }),
            }
        }
        Ok(())
    }

    /// Emit plain text content, splitting oversized values into
    /// continued chunks.
    fn emit_literal_text(&mut self, text: &str) {
        let doc = &mut self.doc;
        for_each_chunk(text, |chunk, continued| {
            let content = if continued {
                LiteralContent::continued(chunk)
            } else {
                LiteralContent::text(chunk)
            };
            doc.emit(Event::LiteralMetaContent { content });
        });
    }

    /// Close the innermost custom element, attaching it to its parent
    /// or, at the top, to the enclosing literal annotation.
    fn close_fragment(&mut self) {
        let Some(fragment) = self.fragments.pop() else { return };
        if let Some(parent) = self.fragments.last_mut() {
            parent.children.push(XmlNode::Element(fragment));
            return;
        }
        if let Some(state) = self.literal_state_mut() {
            state.pieces.push(Piece::Fragment(fragment));
        }
    }

    fn literal_state_mut(&mut self) -> Option<&mut LiteralState> {
        self.stack.iter_mut().rev().find_map(|open| match &mut open.frame {
            Frame::LiteralMeta(state) => Some(state),
            _ => None,
        })
    }

    fn context(&self) -> Ctx {
        match self.stack.last().map(|open| &open.frame) {
            None => Ctx::Top,
            Some(Frame::Root) => Ctx::Root,
            Some(Frame::OtuList) => Ctx::OtuList,
            Some(Frame::Otu) => Ctx::Otu,
            Some(Frame::Characters { .. }) => Ctx::Characters,
            Some(Frame::Format) => Ctx::Format,
            Some(Frame::States) => Ctx::States,
            Some(Frame::StateToken) => Ctx::StateToken,
            Some(Frame::Member) => Ctx::Member,
            Some(Frame::CharDef) => Ctx::CharDef,
            Some(Frame::Matrix) => Ctx::Matrix,
            Some(Frame::Row { .. }) => Ctx::Row,
            Some(Frame::Seq { .. }) => Ctx::Seq,
            Some(Frame::TreeGroup) => Ctx::TreeGroup,
            Some(Frame::Tree) => Ctx::Tree,
            Some(Frame::Network) => Ctx::Network,
            Some(Frame::Node) => Ctx::Node,
            Some(Frame::Edge(_)) => Ctx::Edge,
            Some(Frame::LiteralMeta(_)) => Ctx::LiteralMeta,
            Some(Frame::ResourceMeta) => Ctx::ResourceMeta,
            Some(Frame::Fragment) => Ctx::Fragment,
        }
    }

    fn current_row(&self) -> Option<Id> {
        self.stack.iter().rev().find_map(|open| match &open.frame {
            Frame::Row { id } => Some(id.clone()),
            _ => None,
        })
    }

    /// The token set kind of the nearest enclosing alignment.
    fn alignment_kind(&self) -> TokenSetKind {
        for open in self.stack.iter().rev() {
            if let Frame::Characters { kind, .. } = &open.frame {
                return *kind;
            }
        }
        TokenSetKind::Unknown
    }

    /// Running column index within the nearest enclosing alignment.
    fn next_char_index(&mut self) -> u64 {
        for open in self.stack.iter_mut().rev() {
            if let Frame::Characters { chars, .. } = &mut open.frame {
                let index = *chars;
                *chars += 1;
                return index;
            }
        }
        0
    }

    /// Consume an element's whole subtree without producing events.
    fn skip_subtree(&mut self, start: &BytesStart<'_>, bindings: usize) -> Result<()> {
        self.namespaces.truncate(self.namespaces.len() - bindings);
        let mut skip = Vec::new();
        self.reader.read_to_end_into(start.to_end().name(), &mut skip)?;
        Ok(())
    }

    /// Record the namespace bindings an element declares and report how
    /// many were pushed.
    fn push_bindings(&mut self, attrs: &[(String, String)]) -> usize {
        let mut pushed = 0;
        for (key, value) in attrs {
            if key == "xmlns" {
                self.namespaces.push((String::new(), value.clone()));
                pushed += 1;
            } else if let Some(prefix) = key.strip_prefix("xmlns:") {
                self.namespaces.push((prefix.to_string(), value.clone()));
                pushed += 1;
            }
        }
        pushed
    }

    fn collect_attrs(&self, start: &BytesStart<'_>) -> Result<Vec<(String, String)>> {
        let mut attrs = Vec::new();
        for attr in start.attributes() {
            let attr = attr?;
            let key = self.utf8(attr.key.as_ref())?.to_string();
            let value = attr.unescape_value()?.into_owned();
            attrs.push((key, value));
        }
        Ok(attrs)
    }

    /// The element's declared id, or a fresh one. Declared ids feed the
    /// allocator so generated ids never collide with them.
    fn identified(&mut self, attrs: &[(String, String)]) -> Id {
        match attr(attrs, "id").and_then(Id::new) {
            Some(id) => {
                self.doc.ids.observe(&id);
                id
            }
            None => self.doc.fresh_id(),
        }
    }

    fn required<'v>(
        &self,
        attrs: &'v [(String, String)],
        name: &str,
        element: &str,
    ) -> Result<&'v str> {
        attr(attrs, name).ok_or_else(|| {
            Error::parse_at(
                format!("{element} element needs a {name} attribute"),
                self.location(),
            )
        })
    }

    fn required_id(
        &self,
        attrs: &[(String, String)],
        name: &str,
        element: &str,
    ) -> Result<Id> {
        let value = self.required(attrs, name, element)?;
        Id::new(value).ok_or_else(|| {
            Error::parse_at(
                format!("{element} element needs a non-empty {name} attribute"),
                self.location(),
            )
        })
    }

    fn length_attr(&self, attrs: &[(String, String)]) -> Result<Option<f64>> {
        match attr(attrs, "length") {
            Some(value) => match value.parse() {
                Ok(length) => Ok(Some(length)),
                Err(_) => Err(Error::parse_at(
                    format!("invalid branch length {value:?}"),
                    self.location(),
                )),
            },
            None => Ok(None),
        }
    }

    /// Resolve a `datatype` attribute against the in-scope bindings.
    fn resolve_datatype(&self, value: &str) -> Result<DataTypeKey> {
        let context = ReadContext::new(&self.namespaces);
        match value.split_once(':') {
            Some((prefix, local)) => match context.resolve_prefix(prefix) {
                Some(uri) => Ok(DataTypeKey::new(uri, local)),
                None => Err(Error::parse_at(
                    format!("unbound namespace prefix {prefix:?}"),
                    self.location(),
                )),
            },
            None => {
                let namespace = context.resolve_prefix("").unwrap_or("");
                Ok(DataTypeKey::new(namespace, value))
            }
        }
    }

    fn utf8<'b>(&self, bytes: &'b [u8]) -> Result<&'b str> {
        std::str::from_utf8(bytes).map_err(|_| {
            Error::parse_at("element or attribute name is not valid UTF-8", self.location())
        })
    }
}

impl<R: BufRead> EventReader for NexmlReader<R> {
    fn next_event(&mut self) -> Result<Option<Event>> {
        self.fill()?;
        Ok(self.doc.take_next())
    }

    fn peek_event(&mut self) -> Result<Option<&Event>> {
        self.fill()?;
        Ok(self.doc.peek_front())
    }
}

/// The part of a qualified name after the prefix.
fn local_part(name: &str) -> &str {
    match name.rsplit_once(':') {
        Some((_, local)) => local,
        None => name,
    }
}

/// The value of the attribute whose local name is `name`.
fn attr<'v>(attrs: &'v [(String, String)], name: &str) -> Option<&'v str> {
    attrs
        .iter()
        .find(|(key, _)| local_part(key) == name)
        .map(|(_, value)| value.as_str())
}

fn label_attr(attrs: &[(String, String)]) -> Option<String> {
    attr(attrs, "label").map(str::to_string)
}

fn link_attr(attrs: &[(String, String)], name: &str) -> Option<Id> {
    attr(attrs, name).and_then(Id::new)
}

/// Contexts in which a `meta` child is meaningful.
fn allows_meta(context: Ctx) -> bool {
    matches!(
        context,
        Ctx::Root
            | Ctx::OtuList
            | Ctx::Otu
            | Ctx::Characters
            | Ctx::Format
            | Ctx::States
            | Ctx::StateToken
            | Ctx::CharDef
            | Ctx::Row
            | Ctx::TreeGroup
            | Ctx::Tree
            | Ctx::Network
            | Ctx::Node
            | Ctx::Edge
            | Ctx::ResourceMeta
    )
}

/// The alignment kind and cell layout declared by a characters block's
/// `xsi:type`, such as `nex:DnaSeqs` or `nex:StandardCells`.
fn characters_layout(type_attr: Option<&str>) -> (TokenSetKind, bool) {
    let Some(value) = type_attr else {
        return (TokenSetKind::Unknown, false);
    };
    let local = local_part(value);
    let (base, cells) = match local.strip_suffix("Seqs") {
        Some(base) => (base, false),
        None => match local.strip_suffix("Cells") {
            Some(base) => (base, true),
            None => (local, false),
        },
    };
    let kind = match base {
        "Dna" => TokenSetKind::Dna,
        "Rna" => TokenSetKind::Rna,
        "Protein" => TokenSetKind::Protein,
        "Standard" | "Restriction" => TokenSetKind::Standard,
        "Continuous" => TokenSetKind::Continuous,
        _ => TokenSetKind::Unknown,
    };
    (kind, cells)
}

/// Standard and continuous alignments carry whitespace-separated tokens;
/// molecular alphabets are one character per column.
fn tokenize_run(kind: TokenSetKind, text: &str) -> Vec<String> {
    match kind {
        TokenSetKind::Standard | TokenSetKind::Continuous => {
            text.split_whitespace().map(str::to_string).collect()
        }
        _ => text
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(String::from)
            .collect(),
    }
}

/// Plain string types keep their text form; everything else is offered
/// to the translator registry.
fn wants_translation(key: &DataTypeKey) -> bool {
    !(key.is_xsd() && XSD_STRING_LOCALS.contains(key.local()))
}
