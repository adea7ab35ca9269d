//! Phylip reader.
//!
//! The header line carries the sequence count and column count. The next
//! `ntax` non-blank lines each open one sequence; in the default strict
//! mode the name is a fixed-width column (10 characters, or
//! [`ParamKey::MaxNameLength`](crate::params::ParamKey)), in relaxed mode
//! ([`ParamKey::RelaxedPhylip`](crate::params::ParamKey)) it is the first
//! whitespace-delimited word. Later lines carry no names and attach to the
//! first sequence still short of `nchar`, which covers interleaved files
//! with uniform block lengths. A continuation run repeats the sequence's
//! start event with the same id.
//!
//! Truncated input (any sequence shorter than `nchar` at end of input) and
//! oversized input both fail with located parse errors.

use std::io::Read;

use crate::error::{Error, Result};
use crate::event::{ContentType, Event, Id};
use crate::params::ParameterMap;
use crate::read::text::Cursor;
use crate::read::EventReader;
use crate::sequence::MatchTokenManager;
use crate::span::Location;
use crate::state::DocState;

const DEFAULT_NAME_WIDTH: usize = 10;

enum Stage {
    Header,
    Rows,
    Done,
}

struct Row {
    id: Id,
    label: String,
    count: usize,
}

/// Pull reader over Phylip input.
pub struct PhylipReader {
    cursor: Cursor,
    doc: DocState,
    stage: Stage,
    manager: MatchTokenManager,
    relaxed: bool,
    name_width: usize,
    ntax: usize,
    nchar: usize,
    rows: Vec<Row>,
}

impl PhylipReader {
    pub fn new(reader: impl Read, params: ParameterMap) -> Result<Self> {
        Ok(Self::with_cursor(Cursor::from_reader(reader)?, &params))
    }

    pub fn from_text(text: impl Into<String>, params: ParameterMap) -> Self {
        Self::with_cursor(Cursor::new(text), &params)
    }

    fn with_cursor(cursor: Cursor, params: &ParameterMap) -> Self {
        PhylipReader {
            cursor,
            doc: DocState::new(),
            stage: Stage::Header,
            manager: MatchTokenManager::new(
                params.match_token().map(str::to_string),
                params.replace_match_tokens(),
            ),
            relaxed: params.relaxed_phylip(),
            name_width: params.max_name_length().unwrap_or(DEFAULT_NAME_WIDTH),
            ntax: 0,
            nchar: 0,
            rows: Vec::new(),
        }
    }

    fn fill(&mut self) -> Result<()> {
        while !self.doc.has_pending() {
            match self.stage {
                Stage::Header => self.read_header()?,
                Stage::Rows => self.step()?,
                Stage::Done => break,
            }
        }
        Ok(())
    }

    fn read_header(&mut self) -> Result<()> {
        self.cursor.skip_whitespace();
        let location = self.cursor.location();
        if self.cursor.is_eof() {
            return Err(Error::parse_at("missing Phylip header line", location));
        }
        let line = self.cursor.take_line();
        let mut numbers = line.split_whitespace();
        let ntax = numbers.next().and_then(|n| n.parse::<usize>().ok());
        let nchar = numbers.next().and_then(|n| n.parse::<usize>().ok());
        match (ntax, nchar) {
            (Some(ntax), Some(nchar)) => {
                self.ntax = ntax;
                self.nchar = nchar;
            }
            _ => {
                return Err(Error::parse_at(
                    format!("Phylip header must be two counts, found {:?}", line.trim()),
                    location,
                ))
            }
        }
        self.doc.emit(Event::DocumentStart);
        let id = self.doc.fresh_id();
        self.doc.emit(Event::AlignmentStart {
            id,
            label: None,
            otu_list: None,
        });
        self.stage = Stage::Rows;
        Ok(())
    }

    fn step(&mut self) -> Result<()> {
        let location = self.cursor.location();
        if self.cursor.is_eof() {
            if let Some(short) = self.rows.iter().find(|row| row.count < self.nchar) {
                return Err(Error::parse_at(
                    format!(
                        "input ended with sequence {:?} at {} of {} columns",
                        short.label, short.count, self.nchar
                    ),
                    location,
                ));
            }
            if self.rows.len() < self.ntax {
                return Err(Error::parse_at(
                    format!(
                        "input ended with {} of {} sequences",
                        self.rows.len(),
                        self.ntax
                    ),
                    location,
                ));
            }
            self.doc.emit(Event::End(ContentType::Alignment));
            self.doc.emit(Event::End(ContentType::Document));
            self.stage = Stage::Done;
            return Ok(());
        }

        let line = self.cursor.take_line();
        if line.trim().is_empty() {
            return Ok(());
        }

        if self.rows.len() < self.ntax {
            self.named_row(&line, location)
        } else {
            self.continuation_row(&line, location)
        }
    }

    fn named_row(&mut self, line: &str, location: Location) -> Result<()> {
        let (name, data) = if self.relaxed {
            let trimmed = line.trim_start();
            match trimmed.split_once(char::is_whitespace) {
                Some((name, data)) => (name.to_string(), data.to_string()),
                None => (trimmed.to_string(), String::new()),
            }
        } else {
            let cut = line
                .char_indices()
                .nth(self.name_width)
                .map(|(i, _)| i)
                .unwrap_or(line.len());
            (line[..cut].trim().to_string(), line[cut..].to_string())
        };
        if name.is_empty() {
            return Err(Error::parse_at("empty sequence name", location));
        }

        let tokens = self.line_tokens(&name, &data, location)?;
        let id = self.doc.fresh_id();
        if tokens.len() > self.nchar {
            return Err(Error::parse_at(
                format!(
                    "sequence {:?} has {} tokens but the header declares {}",
                    name,
                    tokens.len(),
                    self.nchar
                ),
                location,
            ));
        }
        self.rows.push(Row { id: id.clone(), label: name.clone(), count: tokens.len() });
        self.doc.emit(Event::SequenceStart {
            id,
            label: Some(name),
            otu: None,
        });
        self.doc.emit(Event::SequenceTokens { tokens });
        self.doc.emit(Event::End(ContentType::Sequence));
        Ok(())
    }

    fn continuation_row(&mut self, line: &str, location: Location) -> Result<()> {
        let target = match self.rows.iter().position(|row| row.count < self.nchar) {
            Some(index) => index,
            None => {
                return Err(Error::parse_at(
                    "all sequences already have their declared columns",
                    location,
                ))
            }
        };
        let (id, label) = {
            let row = &self.rows[target];
            (row.id.clone(), row.label.clone())
        };
        let tokens = self.line_tokens(&label, line, location)?;
        if self.rows[target].count + tokens.len() > self.nchar {
            return Err(Error::parse_at(
                format!(
                    "sequence {:?} exceeds the declared {} columns",
                    label, self.nchar
                ),
                location,
            ));
        }
        self.rows[target].count += tokens.len();
        self.doc.emit(Event::SequenceStart {
            id,
            label: Some(label),
            otu: None,
        });
        self.doc.emit(Event::SequenceTokens { tokens });
        self.doc.emit(Event::End(ContentType::Sequence));
        Ok(())
    }

    fn line_tokens(
        &mut self,
        name: &str,
        data: &str,
        location: Location,
    ) -> Result<Vec<String>> {
        let tokens: Vec<String> = data
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(|c| c.to_string())
            .collect();
        self.manager
            .process(name, tokens)
            .map_err(|err| err.with_location(location))
    }
}

impl EventReader for PhylipReader {
    fn next_event(&mut self) -> Result<Option<Event>> {
        self.fill()?;
        Ok(self.doc.take_next())
    }

    fn peek_event(&mut self) -> Result<Option<&Event>> {
        self.fill()?;
        Ok(self.doc.peek_front())
    }
}
