//! Event receivers and dialect writers.
//!
//! The write path inverts the readers. An application-side
//! [`DocumentSource`] produces events, a [`Receiver`] checks their nesting
//! against the shared grammar, and an [`EventSink`] renders the accepted
//! stream into one dialect. Sinks therefore never see an event sequence a
//! reader could not have produced.
//!
//! Dialects differ in what they can express. A sink reports annotations it
//! has no place for through the boolean returns of its metadata and
//! comment hooks; the receiver tallies those and logs a single summary
//! warning per write.

pub mod adapter;
pub mod fasta;
pub mod newick;
pub mod nexml;
pub mod nexus;
pub mod phylip;
pub mod receiver;
mod tree;

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::event::{ContentType, Event, Id};

pub use adapter::{DocumentSource, EventTarget, ObjectSource};
pub use fasta::FastaWriter;
pub use newick::NewickWriter;
pub use nexml::NexmlWriter;
pub use nexus::NexusWriter;
pub use phylip::PhylipWriter;
pub use receiver::Receiver;

/// A dialect-specific event consumer fed by a [`Receiver`].
///
/// `handle_event` receives every structural event; metadata and comments
/// arrive through their own hooks so a sink that cannot express them only
/// has to return `false`.
pub trait EventSink {
    /// Handle one structural event. `parent` is the construct that was
    /// open when the event arrived.
    fn handle_event(&mut self, event: &Event, parent: Option<ContentType>) -> Result<()>;

    /// Handle a metadata event. Returning `false` reports that the dialect
    /// has no place for the annotation at this position.
    fn handle_metadata(&mut self, event: &Event, parent: Option<ContentType>) -> Result<bool> {
        let _ = (event, parent);
        Ok(false)
    }

    /// Handle a comment chunk. Same ignore contract as metadata.
    fn handle_comment(&mut self, text: &str, continued: bool) -> Result<bool> {
        let _ = (text, continued);
        Ok(false)
    }

    /// Called once after the document end has been accepted.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Drive a complete document from `source` into `sink`.
///
/// Emits the document frame, then every OTU list, matrix, and tree group
/// the source exposes, checking the source's declared counts along the
/// way. Returns the sink so its output can be recovered.
pub fn write_document<S: EventSink>(source: &dyn DocumentSource, sink: S) -> Result<S> {
    let mut receiver = Receiver::new(sink);
    receiver.add(&Event::DocumentStart)?;
    source.write_metadata(&mut receiver)?;
    for object in source.otu_lists() {
        adapter::write_object(object, &mut receiver)?;
    }
    for object in source.matrices() {
        adapter::write_object(object, &mut receiver)?;
    }
    for object in source.tree_groups() {
        adapter::write_object(object, &mut receiver)?;
    }
    receiver.add(&Event::End(ContentType::Document))?;
    receiver.finish()
}

/// Quote a label for Newick and Nexus output when it contains characters
/// those grammars reserve. Embedded quotes are doubled.
pub(crate) fn quote_label(label: &str) -> String {
    let plain = !label.is_empty()
        && label
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '.' | '-' | '+' | '|'));
    if plain {
        return label.to_string();
    }
    let mut quoted = String::with_capacity(label.len() + 2);
    quoted.push('\'');
    for c in label.chars() {
        if c == '\'' {
            quoted.push('\'');
        }
        quoted.push(c);
    }
    quoted.push('\'');
    quoted
}

/// OTU declarations collected from the stream, in document order.
///
/// Text dialects drop the OTU list itself but still need it to resolve
/// sequence and node links into display names.
#[derive(Default)]
pub(crate) struct OtuLabels {
    entries: Vec<(Id, Option<String>)>,
    index: HashMap<Id, usize>,
}

impl OtuLabels {
    pub(crate) fn record(&mut self, id: &Id, label: Option<&str>) {
        if self.index.contains_key(id) {
            return;
        }
        self.index.insert(id.clone(), self.entries.len());
        self.entries.push((id.clone(), label.map(str::to_string)));
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&Id, Option<&str>)> {
        self.entries.iter().map(|(id, label)| (id, label.as_deref()))
    }

    /// The display name of a linked OTU: its label, or its id when it has
    /// none. A link to an OTU that was never declared is an adapter error.
    pub(crate) fn label_for(&self, otu: &Id) -> Result<String> {
        match self.index.get(otu) {
            Some(slot) => {
                let (id, label) = &self.entries[*slot];
                Ok(label.clone().unwrap_or_else(|| id.as_str().to_string()))
            }
            None => Err(Error::Inconsistent(format!("link to undeclared OTU {otu}"))),
        }
    }

    /// The display name for a sequence or node: its own label when set,
    /// otherwise the linked OTU's name, otherwise its id.
    pub(crate) fn display_name(
        &self,
        label: Option<&str>,
        otu: Option<&Id>,
        fallback: &Id,
    ) -> Result<String> {
        if let Some(label) = label {
            return Ok(label.to_string());
        }
        if let Some(otu) = otu {
            return self.label_for(otu);
        }
        Ok(fallback.as_str().to_string())
    }
}
