//! Cross-dialect pipelines: read one format, write another.
//!
//! Conversions lose what the target cannot express and keep everything
//! else. Ids are reader-synthesized on the way in, so text-level
//! expectations only pin down names the source itself carried, plus the
//! deterministic ids of the allocator where the output needs one.

mod common;

use common::{otu_labels, read_all, row_data, to_fasta, to_newick, to_nexus, to_phylip};
use sylva_core::write::{EventTarget, ObjectSource};
use sylva_core::{
    write_document, ContentType, DocumentSource, Event, FastaReader, Id, NewickReader,
    NexmlReader, NexmlWriter, NexusReader, NexusWriter, ParameterMap, PhylipReader, Result,
};

const NEXUS: &str = "#NEXUS\n\
                     BEGIN TAXA;\n  DIMENSIONS NTAX=2;\n  TAXLABELS Ant Bee;\nEND;\n\
                     BEGIN CHARACTERS;\n  DIMENSIONS NTAX=2 NCHAR=4;\n\
                     \x20 FORMAT DATATYPE=DNA GAP=-;\n\
                     \x20 MATRIX\n    Ant ACGT\n    Bee AC-T;\nEND;\n\
                     BEGIN TREES;\n  TRANSLATE\n    1 Ant,\n    2 Bee;\n\
                     \x20 TREE t1 = [&R] (1:0.1,2:0.2);\nEND;\n";

#[test]
fn test_nexus_to_nexml_keeps_taxa_rows_and_trees() {
    let mut reader = NexusReader::from_text(NEXUS, ParameterMap::new());
    let events = read_all(&mut reader);

    let sink = common::write_all(NexmlWriter::new(Vec::new()), &events);
    let xml = String::from_utf8(sink.into_inner()).unwrap();
    assert!(xml.contains("<nexml"));

    let mut reader = NexmlReader::from_text(&xml, ParameterMap::new());
    let back = read_all(&mut reader);
    assert_eq!(otu_labels(&back), vec!["Ant", "Bee"]);
    assert_eq!(row_data(&back), row_data(&events));
    assert_eq!(to_newick(&back), "(Ant:0.1,Bee:0.2);\n");
}

#[test]
fn test_nexus_to_newick_extracts_the_tree() {
    let mut reader = NexusReader::from_text(NEXUS, ParameterMap::new());
    let events = read_all(&mut reader);
    assert_eq!(to_newick(&events), "(Ant:0.1,Bee:0.2);\n");
}

#[test]
fn test_fasta_to_phylip_text() {
    let fasta = ">Taxon\nACGT\n>Other\nAC-T\n";
    let mut reader = FastaReader::from_text(fasta, ParameterMap::new());
    let events = read_all(&mut reader);

    let text = to_phylip(&events);
    assert_eq!(text, "2 4\nTaxon     ACGT\nOther     AC-T\n");
}

#[test]
fn test_phylip_to_fasta_text() {
    let phylip = "2 4\nTaxon     ACGT\nOther     AC-T\n";
    let mut reader = PhylipReader::from_text(phylip, ParameterMap::new());
    let events = read_all(&mut reader);

    let text = to_fasta(&events);
    assert_eq!(text, ">Taxon\nACGT\n>Other\nAC-T\n");
}

#[test]
fn test_newick_to_nexus_wraps_the_tree_in_a_trees_block() {
    let mut reader = NewickReader::from_text("(A:0.1,(B:0.2,C:0.3):0.4);\n", ParameterMap::new());
    let events = read_all(&mut reader);

    let text = to_nexus(&events);
    assert_eq!(
        text,
        "#NEXUS\n\
         BEGIN TREES;\n\
         \x20 TREE e11 = [&R] (A:0.1,(B:0.2,C:0.3):0.4);\n\
         END;\n"
    );
}

// ============================================================================
// Adapter-driven writing
// ============================================================================

struct TaxaSource {
    taxa: Vec<(Id, String)>,
}

impl ObjectSource for TaxaSource {
    fn start_event(&self) -> Event {
        Event::OtuListStart { id: common::id("otus1"), label: None }
    }

    fn count(&self) -> u64 {
        self.taxa.len() as u64
    }

    fn ids(&self) -> Box<dyn Iterator<Item = Id> + '_> {
        Box::new(self.taxa.iter().map(|(id, _)| id.clone()))
    }

    fn emit_content(&self, id: &Id, out: &mut dyn EventTarget) -> Result<()> {
        let label = self
            .taxa
            .iter()
            .find(|(candidate, _)| candidate == id)
            .map(|(_, label)| label.clone());
        out.add(&Event::OtuStart { id: id.clone(), label })?;
        out.add(&Event::End(ContentType::Otu))
    }
}

struct TaxaDocument {
    taxa: TaxaSource,
}

impl DocumentSource for TaxaDocument {
    fn otu_lists(&self) -> Vec<&dyn ObjectSource> {
        vec![&self.taxa]
    }

    fn matrices(&self) -> Vec<&dyn ObjectSource> {
        Vec::new()
    }

    fn tree_groups(&self) -> Vec<&dyn ObjectSource> {
        Vec::new()
    }
}

#[test]
fn test_document_source_writes_through_the_driver() {
    let document = TaxaDocument {
        taxa: TaxaSource {
            taxa: vec![
                (common::id("t1"), "Ant".to_string()),
                (common::id("t2"), "Bee".to_string()),
            ],
        },
    };

    let sink = write_document(&document, NexusWriter::new(Vec::new())).unwrap();
    let text = String::from_utf8(sink.into_inner()).unwrap();
    assert_eq!(
        text,
        "#NEXUS\nBEGIN TAXA;\n  DIMENSIONS NTAX=2;\n  TAXLABELS Ant Bee;\nEND;\n"
    );
}
