//! User node selection and the triples it implies.

use std::collections::{BTreeSet, HashSet};

use super::{EntityStore, Triple};

/// Set of selected node ids. Transient; cleared on session reset.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Selection {
    ids: BTreeSet<String>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip membership of `node_id`. Returns true if it is now selected.
    pub fn toggle(&mut self, node_id: &str) -> bool {
        if self.ids.remove(node_id) {
            false
        } else {
            self.ids.insert(node_id.to_string());
            true
        }
    }

    pub fn contains(&self, node_id: &str) -> bool {
        self.ids.contains(node_id)
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }
}

/// Triples for every stored edge touching the selection, in edge insertion
/// order, deduplicated by rendered (subject, predicate, object).
///
/// Pure over (selection, store): always recomputed, never patched.
pub fn extract_triples(store: &EntityStore, selection: &Selection) -> Vec<Triple> {
    if selection.is_empty() {
        return Vec::new();
    }

    let mut seen = HashSet::new();
    let mut triples = Vec::new();

    for edge in store.edges() {
        if !selection.contains(&edge.source) && !selection.contains(&edge.target) {
            continue;
        }
        let subject = store
            .get_node(&edge.source)
            .map(|n| n.display_label().to_string())
            .unwrap_or_else(|| edge.source.clone());
        let object = store
            .get_node(&edge.target)
            .map(|n| n.display_label().to_string())
            .unwrap_or_else(|| edge.target.clone());
        let predicate = if edge.label.trim().is_empty() {
            edge.relation_id.clone()
        } else {
            edge.label.clone()
        };

        let triple = Triple { subject, predicate, object };
        if seen.insert(triple.clone()) {
            triples.push(triple);
        }
    }

    triples
}
