//! FASTA reader.
//!
//! `>` starts a sequence and the rest of the line is its label; following
//! lines are single-character token runs until the next header. Lines
//! starting with `;` are comments. The whole file maps to one alignment;
//! FASTA declares no taxa, so sequences carry no OTU links.
//!
//! Delivery is per line: one token run per data line, so a sequence split
//! over many lines yields many [`Event::SequenceTokens`] runs inside one
//! start/end pair. Token runs pass through the match-token manager, which
//! stays inert unless a match token is configured.

use std::io::Read;

use crate::error::{Error, Result};
use crate::event::{ContentType, Event, Id};
use crate::params::ParameterMap;
use crate::read::text::Cursor;
use crate::read::EventReader;
use crate::sequence::MatchTokenManager;
use crate::state::DocState;

enum Stage {
    Start,
    Body,
    Done,
}

/// Pull reader over FASTA input.
pub struct FastaReader {
    cursor: Cursor,
    doc: DocState,
    stage: Stage,
    manager: MatchTokenManager,
    /// Open sequence: id plus the name the match-token manager keys on.
    current: Option<(Id, String)>,
}

impl FastaReader {
    pub fn new(reader: impl Read, params: ParameterMap) -> Result<Self> {
        Ok(Self::with_cursor(Cursor::from_reader(reader)?, &params))
    }

    pub fn from_text(text: impl Into<String>, params: ParameterMap) -> Self {
        Self::with_cursor(Cursor::new(text), &params)
    }

    fn with_cursor(cursor: Cursor, params: &ParameterMap) -> Self {
        FastaReader {
            cursor,
            doc: DocState::new(),
            stage: Stage::Start,
            manager: MatchTokenManager::new(
                params.match_token().map(str::to_string),
                params.replace_match_tokens(),
            ),
            current: None,
        }
    }

    fn fill(&mut self) -> Result<()> {
        while !self.doc.has_pending() {
            match self.stage {
                Stage::Start => {
                    self.doc.emit(Event::DocumentStart);
                    let id = self.doc.fresh_id();
                    self.doc.emit(Event::AlignmentStart {
                        id,
                        label: None,
                        otu_list: None,
                    });
                    self.stage = Stage::Body;
                }
                Stage::Body => self.step()?,
                Stage::Done => break,
            }
        }
        Ok(())
    }

    fn step(&mut self) -> Result<()> {
        if self.cursor.is_eof() {
            self.close_current();
            self.doc.emit(Event::End(ContentType::Alignment));
            self.doc.emit(Event::End(ContentType::Document));
            self.stage = Stage::Done;
            return Ok(());
        }
        match self.cursor.peek() {
            Some(b'>') => {
                self.close_current();
                self.cursor.bump();
                let label = self.cursor.take_line().trim().to_string();
                let id = self.doc.fresh_id();
                let name = if label.is_empty() {
                    id.as_str().to_string()
                } else {
                    label.clone()
                };
                self.doc.emit(Event::SequenceStart {
                    id: id.clone(),
                    label: (!label.is_empty()).then_some(label),
                    otu: None,
                });
                self.current = Some((id, name));
                Ok(())
            }
            Some(b';') => {
                self.cursor.bump();
                let text = self.cursor.take_line().trim().to_string();
                self.doc.emit(Event::Comment { text, continued: false });
                Ok(())
            }
            _ => {
                let location = self.cursor.location();
                let line = self.cursor.take_line();
                if line.trim().is_empty() {
                    return Ok(());
                }
                let name = match &self.current {
                    Some((_, name)) => name.clone(),
                    None => {
                        return Err(Error::parse_at(
                            "sequence data before the first '>' header",
                            location,
                        ))
                    }
                };
                let tokens: Vec<String> = line
                    .chars()
                    .filter(|c| !c.is_whitespace())
                    .map(|c| c.to_string())
                    .collect();
                let tokens = self
                    .manager
                    .process(&name, tokens)
                    .map_err(|err| err.with_location(location))?;
                self.doc.emit(Event::SequenceTokens { tokens });
                Ok(())
            }
        }
    }

    fn close_current(&mut self) {
        if self.current.take().is_some() {
            self.doc.emit(Event::End(ContentType::Sequence));
        }
    }
}

impl EventReader for FastaReader {
    fn next_event(&mut self) -> Result<Option<Event>> {
        self.fill()?;
        Ok(self.doc.take_next())
    }

    fn peek_event(&mut self) -> Result<Option<&Event>> {
        self.fill()?;
        Ok(self.doc.peek_front())
    }
}
