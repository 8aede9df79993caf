//! Normalized node/edge storage with the expansion frontier.

use std::collections::{HashMap, HashSet};

use super::{Edge, Node};

/// All nodes and edges discovered in one session.
///
/// Insertion is idempotent: re-inserting a known node or edge is a silent
/// no-op, since overlapping expansions legitimately report the same entities.
/// Edges and nodes iterate in insertion order.
#[derive(Debug, Default, Clone)]
pub struct EntityStore {
    nodes: HashMap<String, Node>,
    node_order: Vec<String>,
    edges: Vec<Edge>,
    edge_index: HashMap<String, usize>,
    /// node id -> positions in `edges`
    adjacency: HashMap<String, Vec<usize>>,
    expanded: HashSet<String>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node unless its id is already present. Returns whether it was inserted.
    pub fn insert_node(&mut self, node: Node) -> bool {
        if self.nodes.contains_key(&node.id) {
            return false;
        }
        self.node_order.push(node.id.clone());
        self.nodes.insert(node.id.clone(), node);
        true
    }

    /// Insert an edge unless its id is already present or an endpoint is unknown.
    pub fn insert_edge(&mut self, edge: Edge) -> bool {
        if self.edge_index.contains_key(&edge.id) {
            return false;
        }
        if !self.nodes.contains_key(&edge.source) || !self.nodes.contains_key(&edge.target) {
            return false;
        }

        let position = self.edges.len();
        self.adjacency
            .entry(edge.source.clone())
            .or_default()
            .push(position);
        if edge.target != edge.source {
            self.adjacency
                .entry(edge.target.clone())
                .or_default()
                .push(position);
        }
        self.edge_index.insert(edge.id.clone(), position);
        self.edges.push(edge);
        true
    }

    pub fn get_node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn contains_edge(&self, edge_id: &str) -> bool {
        self.edge_index.contains_key(edge_id)
    }

    /// Edges with `id` as source or target, in insertion order.
    pub fn edges_touching(&self, id: &str) -> Vec<&Edge> {
        self.adjacency
            .get(id)
            .map(|positions| positions.iter().map(|&p| &self.edges[p]).collect())
            .unwrap_or_default()
    }

    /// All edges in insertion order.
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter()
    }

    /// All nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.node_order.iter().filter_map(|id| self.nodes.get(id))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Flag a node as expanded. Returns false if it already was.
    pub fn mark_expanded(&mut self, id: &str) -> bool {
        self.expanded.insert(id.to_string())
    }

    /// Clear a node's expanded flag so the expansion can be retried.
    pub fn unmark_expanded(&mut self, id: &str) -> bool {
        self.expanded.remove(id)
    }

    pub fn is_expanded(&self, id: &str) -> bool {
        self.expanded.contains(id)
    }

    /// Nodes present in the store but not yet expanded.
    pub fn frontier(&self) -> Vec<&Node> {
        self.nodes()
            .filter(|node| !self.expanded.contains(&node.id))
            .collect()
    }

    /// Drop every node, edge and expansion flag.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.node_order.clear();
        self.edges.clear();
        self.edge_index.clear();
        self.adjacency.clear();
        self.expanded.clear();
    }
}
