//! Shared helpers for the integration suite.
//!
//! Documents are built as event vectors, rendered through the validating
//! [`Receiver`], and compared by extracted facts rather than raw events:
//! every reader synthesizes its own ids, so equality lives at the level
//! of labels, row content, and canonical tree text.
#![allow(dead_code)]

use std::collections::HashMap;

use sylva_core::{
    ContentType, Event, EventReader, EventSink, FastaWriter, Id, LiteralContent, NewickWriter,
    NexusWriter, PhylipWriter, Receiver, TokenMeaning, TokenSetKind,
};

pub fn id(s: &str) -> Id {
    Id::new(s).unwrap()
}

/// One token per character, the granularity molecular readers emit.
pub fn chars(s: &str) -> Vec<String> {
    s.chars().map(|c| c.to_string()).collect()
}

/// Drain a reader into a vector, failing the test on the first error.
pub fn read_all(reader: &mut dyn EventReader) -> Vec<Event> {
    let mut events = Vec::new();
    while let Some(event) = reader.next_event().unwrap() {
        events.push(event);
    }
    events
}

/// Feed a whole document through a validating receiver into `sink`.
pub fn write_all<S: EventSink>(sink: S, events: &[Event]) -> S {
    let mut receiver = Receiver::new(sink);
    for event in events {
        receiver.add(event).unwrap();
    }
    receiver.finish().unwrap()
}

pub fn to_nexus(events: &[Event]) -> String {
    let sink = write_all(NexusWriter::new(Vec::new()), events);
    String::from_utf8(sink.into_inner()).unwrap()
}

pub fn to_fasta(events: &[Event]) -> String {
    let sink = write_all(FastaWriter::new(Vec::new()), events);
    String::from_utf8(sink.into_inner()).unwrap()
}

pub fn to_phylip(events: &[Event]) -> String {
    let sink = write_all(PhylipWriter::new(Vec::new()), events);
    String::from_utf8(sink.into_inner()).unwrap()
}

/// Canonical Newick rendering of every tree in the stream. Doubles as the
/// comparison key for trees, which readers re-id freely.
pub fn to_newick(events: &[Event]) -> String {
    let sink = write_all(NewickWriter::new(Vec::new()), events);
    String::from_utf8(sink.into_inner()).unwrap()
}

/// Display label of every OTU declaration, in document order.
pub fn otu_labels(events: &[Event]) -> Vec<String> {
    events
        .iter()
        .filter_map(|event| match event {
            Event::OtuStart { id, label } => {
                Some(label.clone().unwrap_or_else(|| id.as_str().to_string()))
            }
            _ => None,
        })
        .collect()
}

/// `(name, residues)` per matrix row, interleaved runs merged by id.
///
/// Names resolve the way the writers resolve them: the row label, else the
/// label of the linked OTU, else the row id.
pub fn row_data(events: &[Event]) -> Vec<(String, String)> {
    let mut otus: HashMap<Id, Option<String>> = HashMap::new();
    let mut rows: Vec<(String, String)> = Vec::new();
    let mut index: HashMap<Id, usize> = HashMap::new();
    let mut current = None;
    for event in events {
        match event {
            Event::OtuStart { id, label } => {
                otus.insert(id.clone(), label.clone());
            }
            Event::SequenceStart { id, label, otu } => {
                current = Some(*index.entry(id.clone()).or_insert_with(|| {
                    let name = label
                        .clone()
                        .or_else(|| {
                            otu.as_ref().and_then(|otu| otus.get(otu).cloned().flatten())
                        })
                        .unwrap_or_else(|| id.as_str().to_string());
                    rows.push((name, String::new()));
                    rows.len() - 1
                }));
            }
            Event::SequenceTokens { tokens } => {
                if let Some(slot) = current {
                    rows[slot].1.push_str(&tokens.concat());
                }
            }
            Event::End(ContentType::Sequence) => current = None,
            _ => {}
        }
    }
    rows
}

/// `(predicate, detail)` per annotation in document order: the literal
/// text, or the resource href.
pub fn meta_facts(events: &[Event]) -> Vec<(String, Option<String>)> {
    let mut facts: Vec<(String, Option<String>)> = Vec::new();
    let mut open: Vec<usize> = Vec::new();
    for event in events {
        match event {
            Event::LiteralMetaStart { predicate, .. } => {
                facts.push((predicate.clone(), None));
                open.push(facts.len() - 1);
            }
            Event::ResourceMetaStart { predicate, href, .. } => {
                facts.push((predicate.clone(), href.clone()));
            }
            Event::LiteralMetaContent { content } => {
                if let (Some(slot), Some(text)) = (open.last(), content.text_value()) {
                    facts[*slot].1.get_or_insert_with(String::new).push_str(text);
                }
            }
            Event::End(ContentType::LiteralMeta) => {
                open.pop();
            }
            _ => {}
        }
    }
    facts
}

/// Three taxa, a linked DNA matrix, and one rooted tree over them, with
/// one resource annotation on the document and one literal on a taxon.
pub fn dna_document() -> Vec<Event> {
    vec![
        Event::DocumentStart,
        Event::ResourceMetaStart {
            id: id("meta1"),
            predicate: "cc:license".to_string(),
            href: Some("http://creativecommons.org/licenses/by/4.0/".to_string()),
            about: None,
        },
        Event::End(ContentType::ResourceMeta),
        Event::OtuListStart { id: id("otus1"), label: None },
        Event::OtuStart { id: id("t1"), label: Some("Ant".to_string()) },
        Event::LiteralMetaStart {
            id: id("meta2"),
            predicate: "dc:description".to_string(),
            original_type: None,
            alternatives: Vec::new(),
        },
        Event::LiteralMetaContent { content: LiteralContent::text("type species") },
        Event::End(ContentType::LiteralMeta),
        Event::End(ContentType::Otu),
        Event::OtuStart { id: id("t2"), label: Some("Bee".to_string()) },
        Event::End(ContentType::Otu),
        Event::OtuStart { id: id("t3"), label: Some("Cat".to_string()) },
        Event::End(ContentType::Otu),
        Event::End(ContentType::OtuList),
        Event::AlignmentStart { id: id("m1"), label: None, otu_list: Some(id("otus1")) },
        Event::TokenSetDefinitionStart {
            id: id("ts1"),
            kind: TokenSetKind::Dna,
            label: None,
        },
        Event::TokenDefinition {
            id: id("s1"),
            token: "-".to_string(),
            meaning: TokenMeaning::Gap,
        },
        Event::End(ContentType::TokenSetDefinition),
        Event::SequenceStart { id: id("r1"), label: None, otu: Some(id("t1")) },
        Event::SequenceTokens { tokens: chars("ACGT") },
        Event::End(ContentType::Sequence),
        Event::SequenceStart { id: id("r2"), label: None, otu: Some(id("t2")) },
        Event::SequenceTokens { tokens: chars("AC-T") },
        Event::End(ContentType::Sequence),
        Event::SequenceStart { id: id("r3"), label: None, otu: Some(id("t3")) },
        Event::SequenceTokens { tokens: chars("AAGT") },
        Event::End(ContentType::Sequence),
        Event::End(ContentType::Alignment),
        Event::TreeGroupStart { id: id("g1"), label: None, otu_list: Some(id("otus1")) },
        Event::TreeStart { id: id("tree1"), label: Some("main".to_string()) },
        Event::NodeStart { id: id("n1"), label: None, otu: None, root: true },
        Event::End(ContentType::Node),
        Event::NodeStart { id: id("n2"), label: None, otu: Some(id("t1")), root: false },
        Event::End(ContentType::Node),
        Event::NodeStart { id: id("n3"), label: None, otu: None, root: false },
        Event::End(ContentType::Node),
        Event::NodeStart { id: id("n4"), label: None, otu: Some(id("t2")), root: false },
        Event::End(ContentType::Node),
        Event::NodeStart { id: id("n5"), label: None, otu: Some(id("t3")), root: false },
        Event::End(ContentType::Node),
        Event::EdgeStart {
            id: id("b1"),
            source: Some(id("n1")),
            target: id("n2"),
            length: Some(0.1),
        },
        Event::End(ContentType::Edge),
        Event::EdgeStart {
            id: id("b2"),
            source: Some(id("n1")),
            target: id("n3"),
            length: Some(0.4),
        },
        Event::End(ContentType::Edge),
        Event::EdgeStart {
            id: id("b3"),
            source: Some(id("n3")),
            target: id("n4"),
            length: Some(0.2),
        },
        Event::End(ContentType::Edge),
        Event::EdgeStart {
            id: id("b4"),
            source: Some(id("n3")),
            target: id("n5"),
            length: Some(0.3),
        },
        Event::End(ContentType::Edge),
        Event::End(ContentType::Tree),
        Event::End(ContentType::TreeGroup),
        Event::End(ContentType::Document),
    ]
}
