//! Sylva Core
//!
//! Streaming, event-based codecs for phylogenetic documents. Readers turn
//! Nexus, NeXML, Newick, Phylip, and FASTA input into one shared event
//! grammar without building a document tree; writers render the same
//! events back out, each dialect keeping what it can express.
//!
//! # Architecture
//!
//! - **event.rs** - Content types, topology, the [`Event`] enum
//! - **grammar.rs** - Nesting validator over the document grammar
//! - **state.rs** - Id allocation, translation tables, the outbound queue
//! - **translate.rs** - Typed metadata values and their translators
//! - **read/** - Pull readers, one per dialect
//! - **write/** - The receiving validator and dialect writers
//! - **push.rs** - Push-style forwarding on top of any reader

pub mod datatype;
pub mod error;
pub mod event;
pub mod grammar;
pub mod params;
pub mod push;
pub mod read;
pub mod sequence;
pub mod span;
pub mod state;
pub mod translate;
pub mod value;
pub mod write;

pub use error::{Error, Result};
pub use event::{ContentType, Event, Id, TokenMeaning, TokenSetKind, Topology};
pub use params::{ParamKey, ParamValue, ParameterMap};
pub use read::{EventReader, FastaReader, NewickReader, NexmlReader, NexusReader, PhylipReader};
pub use span::Location;
pub use value::{LiteralContent, MetaValue};
pub use write::{
    write_document, DocumentSource, EventSink, FastaWriter, NewickWriter, NexmlWriter,
    NexusWriter, PhylipWriter, Receiver,
};
