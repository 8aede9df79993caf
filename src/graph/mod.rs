//! Incremental knowledge graph: entity store, expansion merging, selection
//! and triple extraction, plus stateless presentation mapping.
//!
//! Nodes and edges enter through [`merge_batch`], which enforces
//! first-discovery-wins depth assignment and composite-key edge identity.

mod merge;
mod selection;
mod store;
pub mod style;

pub use merge::{merge_batch, MergeStats};
pub use selection::{extract_triples, Selection};
pub use store::EntityStore;

use serde::{Deserialize, Serialize};

/// A knowledge-base entity held in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Stable entity identifier (QID), e.g. `Q42`.
    pub id: String,
    pub label: String,
    pub description: String,
    /// Hops from the session root at first discovery. Root is 0.
    pub depth: u32,
    /// Number of sitelinks reported upstream; drives hub emphasis.
    pub sitelink_count: u64,
}

impl Node {
    /// Label used when rendering triples: the label, or the id when blank.
    pub fn display_label(&self) -> &str {
        if self.label.trim().is_empty() {
            &self.id
        } else {
            &self.label
        }
    }
}

/// A directed relation between two stored nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    /// Composite key, see [`edge_id`].
    pub id: String,
    pub source: String,
    pub target: String,
    /// Relation identifier, e.g. `P31`.
    pub relation_id: String,
    pub label: String,
}

impl Edge {
    /// Build an edge whose id is the composite of its endpoints and relation.
    pub fn new(
        source: impl Into<String>,
        relation_id: impl Into<String>,
        target: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        let source = source.into();
        let relation_id = relation_id.into();
        let target = target.into();
        Self {
            id: edge_id(&source, &relation_id, &target),
            source,
            target,
            relation_id,
            label: label.into(),
        }
    }

    pub fn touches(&self, node_id: &str) -> bool {
        self.source == node_id || self.target == node_id
    }
}

/// Deterministic edge identity: `source-relation-target`.
pub fn edge_id(source: &str, relation_id: &str, target: &str) -> String {
    format!("{}-{}-{}", source, relation_id, target)
}

/// A node as reported by a backend batch, before the store assigns its depth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRecord {
    pub id: String,
    pub label: String,
    pub description: String,
    pub sitelink_count: u64,
}

impl NodeRecord {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            description: String::new(),
            sitelink_count: 0,
        }
    }

    pub fn with_sitelinks(mut self, sitelink_count: u64) -> Self {
        self.sitelink_count = sitelink_count;
        self
    }

    pub(crate) fn into_node(self, depth: u32) -> Node {
        Node {
            id: self.id,
            label: self.label,
            description: self.description,
            depth,
            sitelink_count: self.sitelink_count,
        }
    }
}

/// One validated response from the traversal or expansion service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphBatch {
    pub nodes: Vec<NodeRecord>,
    pub edges: Vec<Edge>,
}

impl GraphBatch {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }
}

/// A subject-predicate-object fact rendered from one edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Triple {
    pub subject: String,
    pub predicate: String,
    pub object: String,
}

impl std::fmt::Display for Triple {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -- {} -- {}", self.subject, self.predicate, self.object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_id_is_composite() {
        assert_eq!(edge_id("Q1", "P31", "Q5"), "Q1-P31-Q5");
        let edge = Edge::new("Q1", "P31", "Q5", "instance of");
        assert_eq!(edge.id, "Q1-P31-Q5");
        assert!(edge.touches("Q1"));
        assert!(edge.touches("Q5"));
        assert!(!edge.touches("Q2"));
    }

    #[test]
    fn test_display_label_falls_back_to_id() {
        let node = NodeRecord::new("Q42", "  ").into_node(0);
        assert_eq!(node.display_label(), "Q42");
        let node = NodeRecord::new("Q42", "Douglas Adams").into_node(0);
        assert_eq!(node.display_label(), "Douglas Adams");
    }

    #[test]
    fn test_triple_display() {
        let triple = Triple {
            subject: "Marie Curie".to_string(),
            predicate: "place of birth".to_string(),
            object: "Warsaw".to_string(),
        };
        assert_eq!(triple.to_string(), "Marie Curie -- place of birth -- Warsaw");
    }
}
