//! Phylip writer.
//!
//! Renders the first matrix as a sequential Phylip file: a header line
//! with the sequence and column counts, then one line per sequence. In the
//! default strict mode the name occupies a fixed-width column
//! ([`ParamKey::MaxNameLength`](crate::params::ParamKey), 10 characters by
//! default) and longer names are truncated; relaxed mode writes the full
//! name followed by a single space. Whitespace inside names becomes `_`
//! either way, because the dialect delimits the name with it.
//!
//! Rows are buffered so interleaved runs merge and the header counts are
//! known up front. Phylip holds exactly one matrix: later matrices, trees,
//! and everything else without a place in the format are skipped and
//! summarized in one warning. The dialect has no comment syntax.

use std::collections::HashMap;
use std::io::Write;

use tracing::warn;

use crate::error::{Error, Result};
use crate::event::{ContentType, Event, Id, Topology};
use crate::params::ParameterMap;
use crate::write::{EventSink, OtuLabels};

const DEFAULT_NAME_WIDTH: usize = 10;

struct Row {
    name: String,
    data: String,
    count: usize,
}

#[derive(Default)]
struct MatrixBuffer {
    rows: Vec<Row>,
    index: HashMap<Id, usize>,
    current: Option<usize>,
}

pub struct PhylipWriter<W: Write> {
    out: W,
    labels: OtuLabels,
    matrix: Option<MatrixBuffer>,
    name_width: usize,
    relaxed: bool,
    written: bool,
    /// Nesting depth inside a skipped construct.
    skipping: usize,
    skipped_objects: u64,
}

impl<W: Write> PhylipWriter<W> {
    pub fn new(out: W) -> Self {
        PhylipWriter {
            out,
            labels: OtuLabels::default(),
            matrix: None,
            name_width: DEFAULT_NAME_WIDTH,
            relaxed: false,
            written: false,
            skipping: 0,
            skipped_objects: 0,
        }
    }

    pub fn with_params(out: W, params: &ParameterMap) -> Self {
        let mut writer = PhylipWriter::new(out);
        writer.name_width = params.max_name_length().unwrap_or(DEFAULT_NAME_WIDTH);
        writer.relaxed = params.relaxed_phylip();
        writer
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn flush_matrix(&mut self, buffer: MatrixBuffer) -> Result<()> {
        let nchar = buffer.rows.first().map(|row| row.count).unwrap_or(0);
        if buffer.rows.iter().any(|row| row.count != nchar) {
            warn!(
                target: "sylva::write",
                "phylip matrix rows differ in length; the header declares the first row's"
            );
        }
        writeln!(self.out, "{} {}", buffer.rows.len(), nchar)?;
        for row in buffer.rows {
            if self.relaxed {
                writeln!(self.out, "{} {}", row.name, row.data)?;
            } else {
                let name: String = row.name.chars().take(self.name_width).collect();
                if name.len() < row.name.len() {
                    warn!(
                        target: "sylva::write",
                        name = %row.name,
                        width = self.name_width,
                        "phylip name column truncates a sequence name"
                    );
                }
                writeln!(self.out, "{:<width$}{}", name, row.data, width = self.name_width)?;
            }
        }
        self.written = true;
        Ok(())
    }
}

impl<W: Write> EventSink for PhylipWriter<W> {
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
                if self.written {
                    self.skipped_objects += 1;
                    self.skipping = 1;
                } else {
                    self.matrix = Some(MatrixBuffer::default());
                }
            }
            Event::End(ContentType::Alignment) => {
                let buffer = self.matrix.take().unwrap_or_default();
                return self.flush_matrix(buffer);
            }
            Event::SequenceStart { id, label, otu } if self.matrix.is_some() => {
                let name = self
                    .labels
                    .display_name(label.as_deref(), otu.as_ref(), id)?
                    .split_whitespace()
                    .collect::<Vec<_>>()
                    .join("_");
                if let Some(buffer) = self.matrix.as_mut() {
                    match buffer.index.get(id) {
                        Some(slot) => buffer.current = Some(*slot),
                        None => {
                            let slot = buffer.rows.len();
                            buffer.rows.push(Row { name, data: String::new(), count: 0 });
                            buffer.index.insert(id.clone(), slot);
                            buffer.current = Some(slot);
                        }
                    }
                }
            }
            Event::SequenceTokens { tokens } if self.matrix.is_some() => {
                if let Some(buffer) = self.matrix.as_mut() {
                    if let Some(row) = buffer.current.map(|slot| &mut buffer.rows[slot]) {
                        for token in tokens {
                            row.data.push_str(token);
                        }
                        row.count += tokens.len();
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

    fn finish(&mut self) -> Result<()> {
        if self.skipped_objects > 0 {
            warn!(
                target: "sylva::write",
                count = self.skipped_objects,
                "phylip output skipped constructs the dialect cannot express"
            );
        }
        self.out.flush()?;
        Ok(())
    }
}
