//! Merging a fetched batch into the entity store.

use std::collections::{HashMap, VecDeque};

use super::{edge_id, EntityStore, GraphBatch};

/// Counts reported after a merge, for status display only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub nodes_added: usize,
    pub edges_added: usize,
}

/// Hops from `parent_id` to every node the batch's edges reach, following
/// edges in either direction.
fn batch_depths<'a>(parent_id: &'a str, parent_depth: u32, batch: &'a GraphBatch) -> HashMap<&'a str, u32> {
    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
    for edge in &batch.edges {
        adjacency.entry(edge.source.as_str()).or_default().push(edge.target.as_str());
        adjacency.entry(edge.target.as_str()).or_default().push(edge.source.as_str());
    }

    let mut depths = HashMap::from([(parent_id, parent_depth)]);
    let mut queue = VecDeque::from([(parent_id, parent_depth)]);
    while let Some((id, depth)) = queue.pop_front() {
        for &next in adjacency.get(id).into_iter().flatten() {
            if !depths.contains_key(next) {
                depths.insert(next, depth.saturating_add(1));
                queue.push_back((next, depth.saturating_add(1)));
            }
        }
    }
    depths
}

/// Merge the nodes and edges fetched for `parent_id` into `store`.
///
/// A new node's depth is `parent_depth` plus its hop distance from the
/// parent over the batch's edges, so a multi-level batch keeps its levels.
/// Nodes the edges do not reach get `parent_depth + 1`. Nodes already in the
/// store keep the depth they were first inserted with. Edges that are already known or
/// whose endpoints are not both stored are skipped. Entries without an id
/// are dropped. Never fails.
pub fn merge_batch(
    store: &mut EntityStore,
    parent_id: &str,
    parent_depth: u32,
    batch: GraphBatch,
) -> MergeStats {
    let mut stats = MergeStats::default();
    let child_depth = parent_depth.saturating_add(1);
    let depths: HashMap<String, u32> = batch_depths(parent_id, parent_depth, &batch)
        .into_iter()
        .map(|(id, depth)| (id.to_string(), depth))
        .collect();

    for record in batch.nodes {
        if record.id.trim().is_empty() {
            log::debug!("Dropping node without id from batch for {}", parent_id);
            continue;
        }
        if record.id == parent_id || store.contains_node(&record.id) {
            continue;
        }
        let depth = depths.get(&record.id).copied().unwrap_or(child_depth);
        if store.insert_node(record.into_node(depth)) {
            stats.nodes_added += 1;
        }
    }

    for mut edge in batch.edges {
        if edge.source.is_empty() || edge.target.is_empty() || edge.relation_id.is_empty() {
            log::debug!("Dropping malformed edge from batch for {}", parent_id);
            continue;
        }
        if edge.id.is_empty() {
            edge.id = edge_id(&edge.source, &edge.relation_id, &edge.target);
        }
        let id = edge.id.clone();
        if store.insert_edge(edge) {
            stats.edges_added += 1;
        } else if !store.contains_edge(&id) {
            log::debug!("Skipping dangling edge {}", id);
        }
    }

    log::debug!(
        "Merged batch for {}: {} nodes, {} edges added",
        parent_id,
        stats.nodes_added,
        stats.edges_added
    );
    stats
}
