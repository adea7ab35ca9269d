//! Newick writer.
//!
//! Emits every tree and network as one `;`-terminated line. The dialect
//! carries no taxon lists or matrices: OTU declarations are absorbed into
//! a link table so node names resolve, alignments are skipped, and one
//! warning summarizes everything the output left out. Comments between
//! trees are written in brackets; comments inside a tree have no stable
//! position in the rendered text and are dropped.

use std::io::Write;

use tracing::warn;

use crate::error::{Error, Result};
use crate::event::{ContentType, Event, Topology};
use crate::write::tree::TreeBuffer;
use crate::write::{quote_label, EventSink, OtuLabels};

pub struct NewickWriter<W: Write> {
    out: W,
    labels: OtuLabels,
    tree: Option<TreeBuffer>,
    comment_open: bool,
    /// Nesting depth inside a skipped top-level construct.
    skipping: usize,
    skipped_objects: u64,
}

impl<W: Write> NewickWriter<W> {
    pub fn new(out: W) -> Self {
        NewickWriter {
            out,
            labels: OtuLabels::default(),
            tree: None,
            comment_open: false,
            skipping: 0,
            skipped_objects: 0,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn flush_tree(&mut self, buffer: TreeBuffer) -> Result<()> {
        let labels = &self.labels;
        // Nodes with no name stay anonymous; an id would not survive a
        // round trip as anything meaningful.
        let payload = buffer.render(|node, _id| {
            if let Some(label) = node.label.as_deref() {
                return Ok(quote_label(label));
            }
            if let Some(otu) = &node.otu {
                return labels.label_for(otu).map(|name| quote_label(&name));
            }
            Ok(String::new())
        })?;
        writeln!(self.out, "{payload};")?;
        Ok(())
    }
}

impl<W: Write> EventSink for NewickWriter<W> {
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
                let buffer = self.tree.take().unwrap_or_default();
                return self.flush_tree(buffer);
            }
            if let Some(buffer) = self.tree.as_mut() {
                buffer.add(event);
            }
            return Ok(());
        }
        match event {
            Event::DocumentStart | Event::End(ContentType::Document) => {}
            Event::OtuListStart { .. } | Event::End(ContentType::OtuList) => {}
            Event::OtuStart { id, label } => self.labels.record(id, label.as_deref()),
            Event::End(ContentType::Otu) => {}
            Event::TreeGroupStart { .. } | Event::End(ContentType::TreeGroup) => {}
            Event::TreeStart { .. } | Event::NetworkStart { .. } => {
                self.tree = Some(TreeBuffer::new());
            }
            Event::AlignmentStart { .. } => {
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
        if self.tree.is_some() || self.skipping > 0 {
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
                "newick output skipped constructs the dialect cannot express"
            );
        }
        self.out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Id;
    use crate::write::Receiver;

    fn id(s: &str) -> Id {
        Id::new(s).unwrap()
    }

    fn otu(i: &str, label: &str) -> [Event; 2] {
        [
            Event::OtuStart { id: id(i), label: Some(label.to_string()) },
            Event::End(ContentType::Otu),
        ]
    }

    fn node_linked(i: &str, otu: &str) -> Event {
        Event::NodeStart {
            id: id(i),
            label: None,
            otu: Some(id(otu)),
            root: false,
        }
    }

    fn write_all(events: &[Event]) -> String {
        let mut receiver = Receiver::new(NewickWriter::new(Vec::new()));
        for event in events {
            receiver.add(event).unwrap();
        }
        let sink = receiver.finish().unwrap();
        String::from_utf8(sink.into_inner()).unwrap()
    }

    fn example_document() -> Vec<Event> {
        let mut events = vec![
            Event::DocumentStart,
            Event::OtuListStart { id: id("otus1"), label: None },
        ];
        events.extend(otu("t1", "A"));
        events.extend(otu("t2", "B"));
        events.extend(otu("t3", "C"));
        events.push(Event::End(ContentType::OtuList));
        events.push(Event::TreeGroupStart {
            id: id("g1"),
            label: None,
            otu_list: Some(id("otus1")),
        });
        events.push(Event::TreeStart { id: id("tree1"), label: None });
        for event in [
            node_linked("n1", "t1"),
            Event::End(ContentType::Node),
            node_linked("n2", "t2"),
            Event::End(ContentType::Node),
            node_linked("n3", "t3"),
            Event::End(ContentType::Node),
            Event::NodeStart { id: id("n4"), label: None, otu: None, root: false },
            Event::End(ContentType::Node),
            Event::NodeStart { id: id("n5"), label: None, otu: None, root: true },
            Event::End(ContentType::Node),
            Event::EdgeStart {
                id: id("e1"),
                source: Some(id("n5")),
                target: id("n1"),
                length: Some(0.1),
            },
            Event::End(ContentType::Edge),
            Event::EdgeStart {
                id: id("e2"),
                source: Some(id("n5")),
                target: id("n4"),
                length: None,
            },
            Event::End(ContentType::Edge),
            Event::EdgeStart {
                id: id("e3"),
                source: Some(id("n4")),
                target: id("n2"),
                length: Some(0.2),
            },
            Event::End(ContentType::Edge),
            Event::EdgeStart {
                id: id("e4"),
                source: Some(id("n4")),
                target: id("n3"),
                length: Some(0.3),
            },
            Event::End(ContentType::Edge),
        ] {
            events.push(event);
        }
        events.push(Event::End(ContentType::Tree));
        events.push(Event::End(ContentType::TreeGroup));
        events.push(Event::End(ContentType::Document));
        events
    }

    #[test]
    fn test_writes_resolved_labels() {
        let text = write_all(&example_document());
        assert_eq!(text, "(A:0.1,(B:0.2,C:0.3));\n");
    }

    #[test]
    fn test_labels_with_spaces_are_quoted() {
        let events = vec![
            Event::DocumentStart,
            Event::TreeGroupStart { id: id("g1"), label: None, otu_list: None },
            Event::TreeStart { id: id("tree1"), label: None },
            Event::NodeStart {
                id: id("n1"),
                label: Some("Homo sapiens".to_string()),
                otu: None,
                root: true,
            },
            Event::End(ContentType::Node),
            Event::End(ContentType::Tree),
            Event::End(ContentType::TreeGroup),
            Event::End(ContentType::Document),
        ];
        assert_eq!(write_all(&events), "'Homo sapiens';\n");
    }

    #[test]
    fn test_alignment_is_skipped_with_count() {
        let mut events = vec![
            Event::DocumentStart,
            Event::AlignmentStart { id: id("m1"), label: None, otu_list: None },
            Event::SequenceStart { id: id("r1"), label: Some("A".to_string()), otu: None },
            Event::SequenceTokens { tokens: vec!["A".to_string(), "C".to_string()] },
            Event::End(ContentType::Sequence),
            Event::End(ContentType::Alignment),
            Event::TreeGroupStart { id: id("g1"), label: None, otu_list: None },
            Event::TreeStart { id: id("tree1"), label: None },
            Event::NodeStart { id: id("n1"), label: Some("A".to_string()), otu: None, root: true },
        ];
        events.extend([
            Event::End(ContentType::Node),
            Event::End(ContentType::Tree),
            Event::End(ContentType::TreeGroup),
            Event::End(ContentType::Document),
        ]);
        let text = write_all(&events);
        assert_eq!(text, "A;\n");
    }

    #[test]
    fn test_document_comment_written_in_brackets() {
        let events = vec![
            Event::DocumentStart,
            Event::Comment { text: "from ".to_string(), continued: true },
            Event::Comment { text: "analysis 4".to_string(), continued: false },
            Event::TreeGroupStart { id: id("g1"), label: None, otu_list: None },
            Event::TreeStart { id: id("tree1"), label: None },
            Event::NodeStart { id: id("n1"), label: Some("A".to_string()), otu: None, root: true },
            Event::End(ContentType::Node),
            Event::End(ContentType::Tree),
            Event::End(ContentType::TreeGroup),
            Event::End(ContentType::Document),
        ];
        assert_eq!(write_all(&events), "[from analysis 4]\nA;\n");
    }

    #[test]
    fn test_comment_inside_tree_is_dropped() {
        let events = vec![
            Event::DocumentStart,
            Event::TreeGroupStart { id: id("g1"), label: None, otu_list: None },
            Event::TreeStart { id: id("tree1"), label: None },
            Event::Comment { text: "lost".to_string(), continued: false },
            Event::NodeStart { id: id("n1"), label: Some("A".to_string()), otu: None, root: true },
            Event::End(ContentType::Node),
            Event::End(ContentType::Tree),
            Event::End(ContentType::TreeGroup),
            Event::End(ContentType::Document),
        ];
        let mut receiver = Receiver::new(NewickWriter::new(Vec::new()));
        for event in &events {
            receiver.add(event).unwrap();
        }
        assert_eq!(receiver.ignored(), (0, 1));
        let text = String::from_utf8(receiver.finish().unwrap().into_inner()).unwrap();
        assert_eq!(text, "A;\n");
    }

    #[test]
    fn test_dangling_otu_link_fails() {
        let events = vec![
            Event::DocumentStart,
            Event::TreeGroupStart { id: id("g1"), label: None, otu_list: None },
            Event::TreeStart { id: id("tree1"), label: None },
            node_linked("n1", "missing"),
            Event::End(ContentType::Node),
            Event::End(ContentType::Tree),
        ];
        let mut receiver = Receiver::new(NewickWriter::new(Vec::new()));
        let mut outcome = Ok(());
        for event in &events {
            outcome = receiver.add(event);
            if outcome.is_err() {
                break;
            }
        }
        let err = outcome.unwrap_err();
        assert!(matches!(err, Error::Inconsistent(_)));
        assert!(err.to_string().contains("missing"));
    }
}
