//! In-memory assembly of node and edge events into renderable topology.
//!
//! Text dialects serialize a tree as one parenthesized term, so their
//! writers cannot stream node events through. A [`TreeBuffer`] collects
//! the events of one tree or network and renders the Newick payload once
//! the end event arrives. Naming is delegated to the caller, because the
//! Newick writer resolves OTU links to labels while the Nexus writer
//! substitutes TRANSLATE keys.

use std::collections::{HashMap, HashSet};

use crate::error::{Error, Result};
use crate::event::{Event, Id};

/// A node collected from the stream.
pub(crate) struct BufferedNode {
    pub(crate) label: Option<String>,
    pub(crate) otu: Option<Id>,
    pub(crate) root: bool,
}

struct BufferedEdge {
    source: Option<Id>,
    target: Id,
    length: Option<f64>,
}

/// One tree or network, assembled from events.
///
/// Rendering writes children in edge order, attaches branch lengths with
/// `:`, and gives nodes that have several parents an `#H` tag so networks
/// stay expressible: the first incoming edge carries the full subtree,
/// later ones a tagged stub.
#[derive(Default)]
pub(crate) struct TreeBuffer {
    nodes: HashMap<Id, BufferedNode>,
    order: Vec<Id>,
    edges: Vec<BufferedEdge>,
    root_edge_length: Option<f64>,
}

impl TreeBuffer {
    pub(crate) fn new() -> Self {
        TreeBuffer::default()
    }

    /// Track one event inside an open tree or network. Events that are not
    /// nodes or edges carry no topology and are skipped.
    pub(crate) fn add(&mut self, event: &Event) {
        match event {
            Event::NodeStart { id, label, otu, root } => {
                self.order.push(id.clone());
                self.nodes.insert(
                    id.clone(),
                    BufferedNode { label: label.clone(), otu: otu.clone(), root: *root },
                );
            }
            Event::EdgeStart { source, target, length, .. } => {
                if source.is_none() {
                    self.root_edge_length = *length;
                }
                self.edges.push(BufferedEdge {
                    source: source.clone(),
                    target: target.clone(),
                    length: *length,
                });
            }
            _ => {}
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Whether the stream flagged a root, by node attribute or root edge.
    pub(crate) fn has_root_flag(&self) -> bool {
        self.nodes.values().any(|node| node.root)
            || self.edges.iter().any(|edge| edge.source.is_none())
    }

    /// Render the assembled topology as a Newick payload without the
    /// trailing semicolon. `name_of` supplies the written name of each
    /// node; an empty string leaves the node unnamed.
    pub(crate) fn render<F>(&self, name_of: F) -> Result<String>
    where
        F: Fn(&BufferedNode, &Id) -> Result<String>,
    {
        if self.order.is_empty() {
            return Ok(String::new());
        }

        let mut children: HashMap<Id, Vec<usize>> = HashMap::new();
        let mut parent_count: HashMap<Id, usize> = HashMap::new();
        for (index, edge) in self.edges.iter().enumerate() {
            if let Some(source) = &edge.source {
                children.entry(source.clone()).or_default().push(index);
                *parent_count.entry(edge.target.clone()).or_default() += 1;
            }
        }

        let mut hybrid_tags: HashMap<Id, usize> = HashMap::new();
        for edge in &self.edges {
            if parent_count.get(&edge.target).copied().unwrap_or(0) > 1 {
                let next = hybrid_tags.len() + 1;
                hybrid_tags.entry(edge.target.clone()).or_insert(next);
            }
        }

        let root = self.find_root(&parent_count)?;
        let mut out = String::new();
        let mut expanded = HashSet::new();
        self.render_node(
            &root,
            None,
            &children,
            &hybrid_tags,
            &mut expanded,
            &name_of,
            &mut out,
            0,
        )?;
        if let Some(length) = self.root_edge_length {
            out.push_str(&format!(":{length}"));
        }
        Ok(out)
    }

    #[allow(clippy::too_many_arguments)]
    fn render_node<F>(
        &self,
        id: &Id,
        incoming: Option<usize>,
        children: &HashMap<Id, Vec<usize>>,
        hybrid_tags: &HashMap<Id, usize>,
        expanded: &mut HashSet<Id>,
        name_of: &F,
        out: &mut String,
        depth: usize,
    ) -> Result<()>
    where
        F: Fn(&BufferedNode, &Id) -> Result<String>,
    {
        if depth > self.nodes.len() {
            return Err(Error::Inconsistent("edges form a cycle".to_string()));
        }
        let node = self
            .nodes
            .get(id)
            .ok_or_else(|| Error::Inconsistent(format!("edge references undeclared node {id}")))?;

        let tag = hybrid_tags.get(id).copied();
        let expand = tag.is_none() || expanded.insert(id.clone());
        if expand {
            if let Some(kids) = children.get(id).filter(|k| !k.is_empty()) {
                out.push('(');
                for (i, edge_index) in kids.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    let edge = &self.edges[*edge_index];
                    self.render_node(
                        &edge.target,
                        Some(*edge_index),
                        children,
                        hybrid_tags,
                        expanded,
                        name_of,
                        out,
                        depth + 1,
                    )?;
                }
                out.push(')');
            }
            out.push_str(&name_of(node, id)?);
        }
        if let Some(tag) = tag {
            out.push_str(&format!("#H{tag}"));
        }
        if let Some(edge_index) = incoming {
            if let Some(length) = self.edges[edge_index].length {
                out.push_str(&format!(":{length}"));
            }
        }
        Ok(())
    }

    /// The render root: the flagged root node, else the target of a root
    /// edge, else the first node no edge points to.
    fn find_root(&self, parent_count: &HashMap<Id, usize>) -> Result<Id> {
        let flagged = self
            .order
            .iter()
            .find(|id| self.nodes.get(*id).is_some_and(|node| node.root));
        if let Some(id) = flagged {
            return Ok(id.clone());
        }
        if let Some(edge) = self.edges.iter().find(|edge| edge.source.is_none()) {
            return Ok(edge.target.clone());
        }
        self.order
            .iter()
            .find(|id| parent_count.get(*id).copied().unwrap_or(0) == 0)
            .cloned()
            .ok_or_else(|| Error::Inconsistent("tree has no root node".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::write::quote_label;

    fn id(s: &str) -> Id {
        Id::new(s).unwrap()
    }

    fn node(i: &str, label: Option<&str>, root: bool) -> Event {
        Event::NodeStart {
            id: id(i),
            label: label.map(str::to_string),
            otu: None,
            root,
        }
    }

    fn edge(source: &str, target: &str, length: Option<f64>) -> Event {
        Event::EdgeStart {
            id: id(&format!("{source}-{target}")),
            source: Some(id(source)),
            target: id(target),
            length,
        }
    }

    fn label_names(node: &BufferedNode, _id: &Id) -> Result<String> {
        Ok(node.label.as_deref().map(quote_label).unwrap_or_default())
    }

    fn buffer(events: &[Event]) -> TreeBuffer {
        let mut tree = TreeBuffer::new();
        for event in events {
            tree.add(event);
        }
        tree
    }

    #[test]
    fn test_renders_nested_clades_with_lengths() {
        let tree = buffer(&[
            node("r", None, true),
            node("a", Some("A"), false),
            node("x", None, false),
            node("b", Some("B"), false),
            node("c", Some("C"), false),
            edge("r", "a", Some(1.0)),
            edge("r", "x", Some(0.5)),
            edge("x", "b", Some(2.0)),
            edge("x", "c", Some(3.0)),
        ]);
        let payload = tree.render(label_names).unwrap();
        assert_eq!(payload, "(A:1,(B:2,C:3):0.5)");
    }

    #[test]
    fn test_root_found_without_flag() {
        let tree = buffer(&[
            node("a", Some("A"), false),
            node("b", Some("B"), false),
            node("r", None, false),
            edge("r", "a", None),
            edge("r", "b", None),
        ]);
        assert_eq!(tree.render(label_names).unwrap(), "(A,B)");
    }

    #[test]
    fn test_root_edge_length_attaches_to_root() {
        let mut tree = buffer(&[
            node("r", None, true),
            node("a", Some("A"), false),
            edge("r", "a", Some(1.5)),
        ]);
        tree.add(&Event::EdgeStart {
            id: id("re"),
            source: None,
            target: id("r"),
            length: Some(0.25),
        });
        assert_eq!(tree.render(label_names).unwrap(), "(A:1.5):0.25");
    }

    #[test]
    fn test_multi_parent_node_gets_hybrid_tag() {
        let tree = buffer(&[
            node("r", None, true),
            node("x", None, false),
            node("y", None, false),
            node("h", Some("H"), false),
            node("a", Some("A"), false),
            edge("r", "x", None),
            edge("r", "y", None),
            edge("x", "h", None),
            edge("x", "a", None),
            edge("y", "h", None),
        ]);
        let payload = tree.render(label_names).unwrap();
        assert_eq!(payload, "((H#H1,A),(#H1))");
    }

    #[test]
    fn test_dangling_edge_target_is_inconsistent() {
        let tree = buffer(&[node("r", None, true), edge("r", "ghost", None)]);
        let err = tree.render(label_names).unwrap_err();
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn test_empty_buffer_renders_nothing() {
        let tree = TreeBuffer::new();
        assert!(tree.is_empty());
        assert_eq!(tree.render(label_names).unwrap(), "");
    }
}
