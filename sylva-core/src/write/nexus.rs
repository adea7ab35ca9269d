//! Nexus writer.
//!
//! Renders OTU lists as TAXA blocks, alignments as CHARACTERS blocks, and
//! tree groups as TREES blocks behind a `#NEXUS` header. Blocks are
//! buffered until their end event so DIMENSIONS counts are known up front
//! and interleaved sequence runs merge back into single rows.
//!
//! Labels become TITLE commands, and a link to a titled OTU list becomes a
//! LINK command; links to untitled lists fall back to the reader-side
//! default of the first TAXA block, which keeps unlabeled documents free
//! of synthetic titles. Tree groups emit a TRANSLATE table over the
//! effective OTU list and trees reference taxa by their keys. The output
//! never declares a MATCHCHAR, whatever the input did. Unknown commands
//! surfaced by a reader are written back into the block they came from.
//! Metadata has no Nexus form here and is reported as ignored; comments
//! are written in brackets where they fall.

use std::collections::HashMap;
use std::io::Write;

use tracing::warn;

use crate::error::{Error, Result};
use crate::event::{ContentType, Event, Id, TokenMeaning, TokenSetKind, Topology};
use crate::write::tree::TreeBuffer;
use crate::write::{quote_label, EventSink, OtuLabels};

struct Row {
    name: String,
    tokens: Vec<String>,
}

#[derive(Default)]
struct MatrixBlock {
    label: Option<String>,
    link_title: Option<String>,
    rows: Vec<Row>,
    index: HashMap<Id, usize>,
    current: Option<usize>,
    kind: Option<TokenSetKind>,
    symbols: Vec<String>,
    gap: Option<String>,
    missing: Option<String>,
    extras: Vec<String>,
}

struct TreesBlock {
    label: Option<String>,
    link_title: Option<String>,
    /// Translate key per OTU of the effective list.
    keys: HashMap<Id, usize>,
    /// `(key, display name)` rows of the TRANSLATE table.
    entries: Vec<(usize, String)>,
    /// Rendered TREE commands, buffered so TRANSLATE can precede them.
    trees: Vec<String>,
    extras: Vec<String>,
}

struct OtuBlock {
    id: Id,
    label: Option<String>,
    members: Vec<Id>,
    extras: Vec<String>,
}

pub struct NexusWriter<W: Write> {
    out: W,
    labels: OtuLabels,
    /// Member OTUs per finished list, in document order.
    lists: Vec<(Id, Vec<Id>)>,
    /// TITLE written per OTU list id; only titled lists are LINK targets.
    titles: HashMap<Id, String>,
    otus: Option<OtuBlock>,
    matrix: Option<MatrixBlock>,
    trees: Option<TreesBlock>,
    /// Open tree or network and its command name.
    tree: Option<(TreeBuffer, String)>,
    comment_open: bool,
    /// Nesting depth inside a skipped construct.
    skipping: usize,
    skipped_objects: u64,
}

impl<W: Write> NexusWriter<W> {
    pub fn new(out: W) -> Self {
        NexusWriter {
            out,
            labels: OtuLabels::default(),
            lists: Vec::new(),
            titles: HashMap::new(),
            otus: None,
            matrix: None,
            trees: None,
            tree: None,
            comment_open: false,
            skipping: 0,
            skipped_objects: 0,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn flush_otus(&mut self, block: OtuBlock) -> Result<()> {
        writeln!(self.out, "BEGIN TAXA;")?;
        if let Some(label) = &block.label {
            writeln!(self.out, "  TITLE {};", quote_label(label))?;
            self.titles.insert(block.id.clone(), label.clone());
        }
        writeln!(self.out, "  DIMENSIONS NTAX={};", block.members.len())?;
        if !block.members.is_empty() {
            let mut names = Vec::with_capacity(block.members.len());
            for otu in &block.members {
                names.push(quote_label(&self.labels.label_for(otu)?));
            }
            writeln!(self.out, "  TAXLABELS {};", names.join(" "))?;
        }
        for extra in &block.extras {
            writeln!(self.out, "  {extra}")?;
        }
        writeln!(self.out, "END;")?;
        self.lists.push((block.id, block.members));
        Ok(())
    }

    fn flush_matrix(&mut self, block: MatrixBlock) -> Result<()> {
        writeln!(self.out, "BEGIN CHARACTERS;")?;
        if let Some(label) = &block.label {
            writeln!(self.out, "  TITLE {};", quote_label(label))?;
        }
        if let Some(title) = &block.link_title {
            writeln!(self.out, "  LINK TAXA = {};", quote_label(title))?;
        }
        let nchar = block.rows.first().map(|row| row.tokens.len()).unwrap_or(0);
        if block.rows.iter().any(|row| row.tokens.len() != nchar) {
            warn!(
                target: "sylva::write",
                "nexus matrix rows differ in length; NCHAR declares the first row's"
            );
        }
        writeln!(self.out, "  DIMENSIONS NTAX={} NCHAR={nchar};", block.rows.len())?;

        let mut format = Vec::new();
        if let Some(keyword) = block.kind.and_then(datatype_keyword) {
            format.push(format!("DATATYPE={keyword}"));
        }
        if block.kind == Some(TokenSetKind::Standard) && !block.symbols.is_empty() {
            format.push(format!("SYMBOLS=\"{}\"", join_tokens(&block.symbols)));
        }
        if let Some(gap) = &block.gap {
            format.push(format!("GAP={gap}"));
        }
        if let Some(missing) = &block.missing {
            format.push(format!("MISSING={missing}"));
        }
        if !format.is_empty() {
            writeln!(self.out, "  FORMAT {};", format.join(" "))?;
        }

        if block.rows.is_empty() {
            writeln!(self.out, "  MATRIX;")?;
        } else {
            writeln!(self.out, "  MATRIX")?;
            for (i, row) in block.rows.iter().enumerate() {
                let end = if i + 1 == block.rows.len() { ";" } else { "" };
                writeln!(
                    self.out,
                    "    {} {}{end}",
                    quote_label(&row.name),
                    join_tokens(&row.tokens)
                )?;
            }
        }
        for extra in &block.extras {
            writeln!(self.out, "  {extra}")?;
        }
        writeln!(self.out, "END;")?;
        Ok(())
    }

    fn flush_trees(&mut self, block: TreesBlock) -> Result<()> {
        writeln!(self.out, "BEGIN TREES;")?;
        if let Some(label) = &block.label {
            writeln!(self.out, "  TITLE {};", quote_label(label))?;
        }
        if let Some(title) = &block.link_title {
            writeln!(self.out, "  LINK TAXA = {};", quote_label(title))?;
        }
        if !block.entries.is_empty() {
            writeln!(self.out, "  TRANSLATE")?;
            for (i, (key, name)) in block.entries.iter().enumerate() {
                let end = if i + 1 == block.entries.len() { ";" } else { "," };
                writeln!(self.out, "    {key} {}{end}", quote_label(name))?;
            }
        }
        for tree in &block.trees {
            writeln!(self.out, "  {tree}")?;
        }
        for extra in &block.extras {
            writeln!(self.out, "  {extra}")?;
        }
        writeln!(self.out, "END;")?;
        Ok(())
    }

    /// Render one finished tree into its TREE command.
    fn render_tree(&mut self, buffer: TreeBuffer, name: String) -> Result<()> {
        let Some(block) = self.trees.as_mut() else {
            return Err(Error::Inconsistent("tree outside a tree group".to_string()));
        };
        let labels = &self.labels;
        let keys = &block.keys;
        let payload = buffer.render(|node, _id| {
            if let Some(key) = node.otu.as_ref().and_then(|otu| keys.get(otu)) {
                return Ok(key.to_string());
            }
            if let Some(label) = node.label.as_deref() {
                return Ok(quote_label(label));
            }
            if let Some(otu) = &node.otu {
                return labels.label_for(otu).map(|name| quote_label(&name));
            }
            Ok(String::new())
        })?;
        let rooting = if buffer.has_root_flag() { "[&R]" } else { "[&U]" };
        block
            .trees
            .push(format!("TREE {} = {rooting} {payload};", quote_label(&name)));
        Ok(())
    }

    /// The list the reader will resolve for this group: the link target
    /// when it was written with a TITLE, else the first list.
    fn effective_list(&self, link: Option<&Id>) -> Option<&[Id]> {
        let target = link
            .filter(|id| self.titles.contains_key(*id))
            .or_else(|| self.lists.first().map(|(id, _)| id));
        let target = target?;
        self.lists
            .iter()
            .find(|(id, _)| id == target)
            .map(|(_, members)| members.as_slice())
    }
}

impl<W: Write> EventSink for NexusWriter<W> {
    fn handle_event(&mut self, event: &Event, parent: Option<ContentType>) -> Result<()> {
        if self.skipping > 0 {
            match event.topology() {
                Topology::Start => self.skipping += 1,
                Topology::End => self.skipping -= 1,
                Topology::Sole => {}
            }
            return Ok(());
        }
        if self.tree.is_some() {
            if matches!(
                event,
                Event::End(ContentType::Tree) | Event::End(ContentType::Network)
            ) {
                if let Some((buffer, name)) = self.tree.take() {
                    return self.render_tree(buffer, name);
                }
                return Ok(());
            }
            if let Some((buffer, _)) = self.tree.as_mut() {
                buffer.add(event);
            }
            return Ok(());
        }
        match event {
            Event::DocumentStart => writeln!(self.out, "#NEXUS")?,
            Event::End(ContentType::Document) => {}
            Event::OtuListStart { id, label } => {
                self.otus = Some(OtuBlock {
                    id: id.clone(),
                    label: label.clone(),
                    members: Vec::new(),
                    extras: Vec::new(),
                });
            }
            Event::OtuStart { id, label } => {
                self.labels.record(id, label.as_deref());
                if let Some(block) = self.otus.as_mut() {
                    block.members.push(id.clone());
                }
            }
            Event::End(ContentType::Otu) => {}
            Event::End(ContentType::OtuList) => {
                if let Some(block) = self.otus.take() {
                    return self.flush_otus(block);
                }
            }
            Event::AlignmentStart { label, otu_list, .. } => {
                self.matrix = Some(MatrixBlock {
                    label: label.clone(),
                    link_title: otu_list
                        .as_ref()
                        .and_then(|id| self.titles.get(id))
                        .cloned(),
                    ..MatrixBlock::default()
                });
            }
            Event::End(ContentType::Alignment) => {
                let block = self.matrix.take().unwrap_or_default();
                return self.flush_matrix(block);
            }
            Event::TokenSetDefinitionStart { kind, .. } if self.matrix.is_some() => {
                if let Some(block) = self.matrix.as_mut() {
                    block.kind.get_or_insert(*kind);
                }
            }
            Event::TokenDefinition { token, meaning, .. } if self.matrix.is_some() => {
                if let Some(block) = self.matrix.as_mut() {
                    match meaning {
                        TokenMeaning::Gap => block.gap = Some(token.clone()),
                        TokenMeaning::Missing => block.missing = Some(token.clone()),
                        TokenMeaning::CharacterState => {
                            if !block.symbols.contains(token) {
                                block.symbols.push(token.clone());
                            }
                        }
                        // Output never declares a match token.
                        TokenMeaning::Match | TokenMeaning::Other => {}
                    }
                }
            }
            Event::SetElement { .. } if self.matrix.is_some() => {}
            Event::End(ContentType::TokenSetDefinition) => {}
            Event::CharacterDefinitionStart { .. } => {
                self.skipped_objects += 1;
                self.skipping = 1;
            }
            Event::SequenceStart { id, label, otu } if self.matrix.is_some() => {
                let name = self.labels.display_name(label.as_deref(), otu.as_ref(), id)?;
                if let Some(block) = self.matrix.as_mut() {
                    match block.index.get(id) {
                        Some(slot) => block.current = Some(*slot),
                        None => {
                            let slot = block.rows.len();
                            block.rows.push(Row { name, tokens: Vec::new() });
                            block.index.insert(id.clone(), slot);
                            block.current = Some(slot);
                        }
                    }
                }
            }
            Event::SequenceTokens { tokens } if self.matrix.is_some() => {
                if let Some(block) = self.matrix.as_mut() {
                    if let Some(row) = block.current.map(|slot| &mut block.rows[slot]) {
                        row.tokens.extend(tokens.iter().cloned());
                    }
                }
            }
            Event::End(ContentType::Sequence) => {
                if let Some(block) = self.matrix.as_mut() {
                    block.current = None;
                }
            }
            Event::TreeGroupStart { label, otu_list, .. } => {
                let link_title = otu_list
                    .as_ref()
                    .and_then(|id| self.titles.get(id))
                    .cloned();
                let mut keys = HashMap::new();
                let mut entries = Vec::new();
                if let Some(members) = self.effective_list(otu_list.as_ref()) {
                    for (i, otu) in members.iter().enumerate() {
                        keys.insert(otu.clone(), i + 1);
                        entries.push((i + 1, self.labels.label_for(otu)?));
                    }
                }
                self.trees = Some(TreesBlock {
                    label: label.clone(),
                    link_title,
                    keys,
                    entries,
                    trees: Vec::new(),
                    extras: Vec::new(),
                });
            }
            Event::End(ContentType::TreeGroup) => {
                if let Some(block) = self.trees.take() {
                    return self.flush_trees(block);
                }
            }
            Event::TreeStart { id, label } | Event::NetworkStart { id, label }
                if self.trees.is_some() =>
            {
                let name = label.clone().unwrap_or_else(|| id.as_str().to_string());
                self.tree = Some((TreeBuffer::new(), name));
            }
            Event::UnknownCommand { name, content } => {
                let line = if content.is_empty() {
                    format!("{name};")
                } else {
                    format!("{name} {content};")
                };
                let extras = match parent {
                    Some(ContentType::OtuList) => self.otus.as_mut().map(|b| &mut b.extras),
                    Some(ContentType::Alignment) => self.matrix.as_mut().map(|b| &mut b.extras),
                    Some(ContentType::TreeGroup) => self.trees.as_mut().map(|b| &mut b.extras),
                    _ => None,
                };
                match extras {
                    Some(extras) => extras.push(line),
                    None => self.skipped_objects += 1,
                }
            }
            other => {
                return Err(Error::IllegalEvent {
                    parent,
                    content: other.content_type(),
                });
            }
        }
        Ok(())
    }

    fn handle_comment(&mut self, text: &str, continued: bool) -> Result<bool> {
        if self.skipping > 0 || self.tree.is_some() {
            return Ok(false);
        }
        if !self.comment_open {
            self.out.write_all(b"[")?;
            self.comment_open = true;
        }
        // A closing bracket inside the text would end the comment early.
        self.out.write_all(text.replace(']', ")").as_bytes())?;
        if !continued {
            self.out.write_all(b"]\n")?;
            self.comment_open = false;
        }
        Ok(true)
    }

    fn finish(&mut self) -> Result<()> {
        if self.skipped_objects > 0 {
            warn!(
                target: "sylva::write",
                count = self.skipped_objects,
                "nexus output skipped constructs the dialect cannot express"
            );
        }
        self.out.flush()?;
        Ok(())
    }
}

/// The FORMAT keyword for a token set kind, when the dialect has one.
fn datatype_keyword(kind: TokenSetKind) -> Option<&'static str> {
    match kind {
        TokenSetKind::Dna => Some("DNA"),
        TokenSetKind::Rna => Some("RNA"),
        TokenSetKind::Protein => Some("PROTEIN"),
        TokenSetKind::Standard => Some("STANDARD"),
        TokenSetKind::Continuous => Some("CONTINUOUS"),
        TokenSetKind::Unknown => None,
    }
}

/// Single-character alphabets concatenate; anything longer separates
/// tokens with spaces so they read back intact.
fn join_tokens(tokens: &[String]) -> String {
    if tokens.iter().all(|t| t.chars().count() == 1) {
        tokens.concat()
    } else {
        tokens.join(" ")
    }
}
