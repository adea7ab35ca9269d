//! FASTA writer.
//!
//! Renders matrices only. Each sequence becomes a `>` header line followed
//! by its tokens, wrapped at a fixed width; rows are buffered per
//! alignment so interleaved runs of one sequence merge back into a single
//! record. Taxon lists are absorbed to resolve row names, trees and
//! character declarations have no FASTA form and are skipped, and one
//! warning summarizes everything the output left out. Comments become `;`
//! lines between records; several alignments concatenate, their boundary
//! is not representable.

use std::collections::HashMap;
use std::io::Write;

use tracing::warn;

use crate::error::{Error, Result};
use crate::event::{ContentType, Event, Id, Topology};
use crate::write::{EventSink, OtuLabels};

const LINE_WIDTH: usize = 80;

/// One output unit of a buffered alignment, in document order.
enum Entry {
    Row { name: String, data: String },
    Comment(String),
}

#[derive(Default)]
struct MatrixBuffer {
    entries: Vec<Entry>,
    rows: HashMap<Id, usize>,
    current: Option<usize>,
}

pub struct FastaWriter<W: Write> {
    out: W,
    labels: OtuLabels,
    matrix: Option<MatrixBuffer>,
    comment_buf: String,
    /// Nesting depth inside a skipped construct.
    skipping: usize,
    skipped_objects: u64,
}

impl<W: Write> FastaWriter<W> {
    pub fn new(out: W) -> Self {
        FastaWriter {
            out,
            labels: OtuLabels::default(),
            matrix: None,
            comment_buf: String::new(),
            skipping: 0,
            skipped_objects: 0,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn flush_matrix(&mut self, buffer: MatrixBuffer) -> Result<()> {
        for entry in buffer.entries {
            match entry {
                Entry::Row { name, data } => {
                    writeln!(self.out, ">{name}")?;
                    let mut rest = data.as_str();
                    while !rest.is_empty() {
                        let mut cut = LINE_WIDTH.min(rest.len());
                        while cut < rest.len() && !rest.is_char_boundary(cut) {
                            cut += 1;
                        }
                        writeln!(self.out, "{}", &rest[..cut])?;
                        rest = &rest[cut..];
                    }
                }
                Entry::Comment(text) => writeln!(self.out, "; {text}")?,
            }
        }
        Ok(())
    }
}

impl<W: Write> EventSink for FastaWriter<W> {
    fn handle_event(&mut self, event: &Event, parent: Option<ContentType>) -> Result<()> {
        if self.skipping > 0 {
            match event.topology() {
                Topology::Start => self.skipping += 1,
                Topology::End => self.skipping -= 1,
                Topology::Sole => {}
            }
            return Ok(());
        }
        match event {
            Event::DocumentStart | Event::End(ContentType::Document) => {}
            Event::OtuListStart { .. } | Event::End(ContentType::OtuList) => {}
            Event::OtuStart { id, label } => self.labels.record(id, label.as_deref()),
            Event::End(ContentType::Otu) => {}
            Event::AlignmentStart { .. } => {
                self.matrix = Some(MatrixBuffer::default());
            }
            Event::End(ContentType::Alignment) => {
                let buffer = self.matrix.take().unwrap_or_default();
                return self.flush_matrix(buffer);
            }
            Event::SequenceStart { id, label, otu } if self.matrix.is_some() => {
                let name = self.labels.display_name(label.as_deref(), otu.as_ref(), id)?;
                if let Some(buffer) = self.matrix.as_mut() {
                    match buffer.rows.get(id) {
                        Some(slot) => buffer.current = Some(*slot),
                        None => {
                            let slot = buffer.entries.len();
                            buffer.entries.push(Entry::Row { name, data: String::new() });
                            buffer.rows.insert(id.clone(), slot);
                            buffer.current = Some(slot);
                        }
                    }
                }
            }
            Event::SequenceTokens { tokens } if self.matrix.is_some() => {
                if let Some(buffer) = self.matrix.as_mut() {
                    if let Some(Entry::Row { data, .. }) =
                        buffer.current.map(|slot| &mut buffer.entries[slot])
                    {
                        for token in tokens {
                            data.push_str(token);
                        }
                    }
                }
            }
            Event::End(ContentType::Sequence) => {
                if let Some(buffer) = self.matrix.as_mut() {
                    buffer.current = None;
                }
            }
            Event::CharacterDefinitionStart { .. } | Event::TokenSetDefinitionStart { .. } => {
                self.skipped_objects += 1;
                self.skipping = 1;
            }
            Event::TreeGroupStart { .. } => {
                self.skipped_objects += 1;
                self.skipping = 1;
            }
            Event::UnknownCommand { .. } => {
                self.skipped_objects += 1;
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
        if self.skipping > 0 {
            return Ok(false);
        }
        self.comment_buf.push_str(text);
        if continued {
            return Ok(true);
        }
        // The dialect's comments are single lines.
        let line = std::mem::take(&mut self.comment_buf).replace('\n', " ");
        match self.matrix.as_mut() {
            Some(buffer) => buffer.entries.push(Entry::Comment(line)),
            None => writeln!(self.out, "; {line}")?,
        }
        Ok(true)
    }

    fn finish(&mut self) -> Result<()> {
        if self.skipped_objects > 0 {
            warn!(
                target: "sylva::write",
                count = self.skipped_objects,
                "fasta output skipped constructs the dialect cannot express"
            );
        }
        self.out.flush()?;
        Ok(())
    }
}
