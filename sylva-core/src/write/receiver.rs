//! Grammar-checked delivery into a dialect sink.

use tracing::warn;

use crate::error::Result;
use crate::event::{ContentType, Event};
use crate::grammar::{Nesting, DOCUMENT_GRAMMAR};
use crate::write::adapter::EventTarget;
use crate::write::EventSink;

/// Validating front end of every writer.
///
/// Each event runs through the shared [`Nesting`] rules before the sink
/// sees it, so a sink only ever observes streams a reader could have
/// produced. Metadata and comment events are routed to the sink's hooks;
/// annotations the dialect reports as inexpressible are tallied and
/// surfaced as one summary warning when the write finishes.
pub struct Receiver<S> {
    sink: S,
    nesting: Nesting,
    delivered: u64,
    ignored_metadata: u64,
    ignored_comments: u64,
}

impl<S: EventSink> Receiver<S> {
    pub fn new(sink: S) -> Self {
        Receiver {
            sink,
            nesting: Nesting::new(&DOCUMENT_GRAMMAR),
            delivered: 0,
            ignored_metadata: 0,
            ignored_comments: 0,
        }
    }

    /// Number of events accepted so far.
    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    /// Annotations and comments the sink reported as inexpressible, in
    /// that order.
    pub fn ignored(&self) -> (u64, u64) {
        (self.ignored_metadata, self.ignored_comments)
    }

    /// Validate one event and hand it to the sink.
    ///
    /// An ignored annotation is counted once, on its start event; the
    /// content and end events of the same annotation still reach the hook
    /// but do not inflate the tally.
    pub fn add(&mut self, event: &Event) -> Result<()> {
        let parent = self.nesting.parent();
        self.nesting.advance(event)?;
        self.delivered += 1;
        match event {
            Event::Comment { text, continued } => {
                if !self.sink.handle_comment(text, *continued)? {
                    self.ignored_comments += 1;
                }
            }
            Event::LiteralMetaStart { .. }
            | Event::ResourceMetaStart { .. }
            | Event::LiteralMetaContent { .. }
            | Event::End(ContentType::LiteralMeta)
            | Event::End(ContentType::ResourceMeta) => {
                let expressed = self.sink.handle_metadata(event, parent)?;
                let opens = matches!(
                    event,
                    Event::LiteralMetaStart { .. } | Event::ResourceMetaStart { .. }
                );
                if opens && !expressed {
                    self.ignored_metadata += 1;
                }
            }
            _ => self.sink.handle_event(event, parent)?,
        }
        Ok(())
    }

    /// Check that the document is complete, report dropped annotations,
    /// and finish the sink. Returns the sink for output recovery.
    pub fn finish(mut self) -> Result<S> {
        self.nesting.expect_complete()?;
        if self.ignored_metadata > 0 || self.ignored_comments > 0 {
            warn!(
                target: "sylva::write",
                metadata = self.ignored_metadata,
                comments = self.ignored_comments,
                "dropped annotations the output dialect cannot express"
            );
        }
        self.sink.finish()?;
        Ok(self.sink)
    }
}

impl<S: EventSink> EventTarget for Receiver<S> {
    fn add(&mut self, event: &Event) -> Result<()> {
        Receiver::add(self, event)
    }
}
