//! Explorer session state and its transitions.
//!
//! [`SessionState`] is a plain value: every transition is a synchronous
//! method, and backend calls happen between a `begin_*` and the matching
//! `complete_*`. Each request carries the session epoch it was issued in so
//! that results arriving after a reset are discarded.

mod controller;

pub use controller::{ExpandOutcome, SessionController};

use serde::Serialize;
use std::collections::BTreeSet;

use crate::error::{KgquizError, Result};
use crate::graph::{extract_triples, merge_batch, EntityStore, GraphBatch, MergeStats, Node, NodeRecord, Selection, Triple};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    /// No root loaded.
    Idle,
    /// Waiting for the root traversal.
    RootLoading { qid: String },
    /// Store seeded; expansions may be in flight.
    Ready,
}

/// Handle for an outstanding root traversal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootTicket {
    pub qid: String,
    pub label: String,
    pub epoch: u64,
}

/// Handle for an outstanding expansion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpandTicket {
    pub qid: String,
    pub epoch: u64,
}

/// Result of asking to expand a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpandDecision {
    /// The node was flagged; the caller must issue the request.
    Issue(ExpandTicket),
    /// Already expanded or an expansion is in flight. Not an error.
    AlreadyExpanded,
    /// No root has been loaded yet.
    NotReady,
    /// The node is not part of this session's graph.
    UnknownNode,
}

/// What happened to a completed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Applied(MergeStats),
    /// Issued in an earlier epoch; the result was dropped.
    Stale,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub nodes: usize,
    pub edges: usize,
    pub expanded: usize,
    pub selected: usize,
    pub in_flight: usize,
}

#[derive(Debug)]
pub struct SessionState {
    store: EntityStore,
    selection: Selection,
    phase: Phase,
    epoch: u64,
    in_flight: BTreeSet<String>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            store: EntityStore::new(),
            selection: Selection::new(),
            phase: Phase::Idle,
            epoch: 0,
            in_flight: BTreeSet::new(),
        }
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn is_in_flight(&self, qid: &str) -> bool {
        self.in_flight.contains(qid)
    }

    /// Drop all graph, selection and expansion state and start a new epoch.
    pub fn reset(&mut self) {
        self.store.clear();
        self.selection.clear();
        self.in_flight.clear();
        self.phase = Phase::Idle;
        self.epoch += 1;
    }

    /// Start loading a new root. Always resets the session first.
    pub fn begin_root(&mut self, qid: &str, label: &str) -> RootTicket {
        self.reset();
        self.phase = Phase::RootLoading {
            qid: qid.to_string(),
        };
        RootTicket {
            qid: qid.to_string(),
            label: label.to_string(),
            epoch: self.epoch,
        }
    }

    /// Apply the root traversal result.
    ///
    /// On success the root is stored at depth 0, flagged expanded, and the
    /// batch is merged beneath it. On failure the session returns to
    /// [`Phase::Idle`] and the error is handed back.
    pub fn complete_root(&mut self, ticket: RootTicket, result: Result<GraphBatch>) -> Result<Completion> {
        if ticket.epoch != self.epoch {
            log::warn!(
                "Discarding root result for {} from epoch {} (now {})",
                ticket.qid,
                ticket.epoch,
                self.epoch
            );
            return Ok(Completion::Stale);
        }

        let batch = match result {
            Ok(batch) => batch,
            Err(e) => {
                self.phase = Phase::Idle;
                return Err(e);
            }
        };

        let root = batch
            .nodes
            .iter()
            .find(|record| record.id == ticket.qid)
            .cloned()
            .unwrap_or_else(|| NodeRecord::new(ticket.qid.clone(), ticket.label.clone()));

        let root_added = self.store.insert_node(root.into_node(0));
        self.store.mark_expanded(&ticket.qid);

        let mut stats = merge_batch(&mut self.store, &ticket.qid, 0, batch);
        if root_added {
            stats.nodes_added += 1;
        }

        self.phase = Phase::Ready;
        log::info!(
            "Root {} loaded: {} nodes, {} edges",
            ticket.qid,
            stats.nodes_added,
            stats.edges_added
        );
        Ok(Completion::Applied(stats))
    }

    /// Flag `qid` as expanded and hand out a ticket, or say why not.
    pub fn begin_expand(&mut self, qid: &str) -> ExpandDecision {
        if self.phase != Phase::Ready {
            return ExpandDecision::NotReady;
        }
        if !self.store.contains_node(qid) {
            return ExpandDecision::UnknownNode;
        }
        if !self.store.mark_expanded(qid) {
            return ExpandDecision::AlreadyExpanded;
        }

        self.in_flight.insert(qid.to_string());
        ExpandDecision::Issue(ExpandTicket {
            qid: qid.to_string(),
            epoch: self.epoch,
        })
    }

    /// Apply an expansion result. A failure clears the expanded flag so the
    /// node can be retried; the store is otherwise left untouched.
    pub fn complete_expand(&mut self, ticket: ExpandTicket, result: Result<GraphBatch>) -> Result<Completion> {
        if ticket.epoch != self.epoch {
            log::warn!(
                "Discarding expansion of {} from epoch {} (now {})",
                ticket.qid,
                ticket.epoch,
                self.epoch
            );
            return Ok(Completion::Stale);
        }

        self.in_flight.remove(&ticket.qid);

        let batch = match result {
            Ok(batch) => batch,
            Err(e) => {
                self.store.unmark_expanded(&ticket.qid);
                log::info!("Expansion of {} failed, flag rolled back: {}", ticket.qid, e);
                return Err(e);
            }
        };

        let parent_depth = self
            .store
            .get_node(&ticket.qid)
            .map(|node| node.depth)
            .unwrap_or(0);

        let stats = merge_batch(&mut self.store, &ticket.qid, parent_depth, batch);
        Ok(Completion::Applied(stats))
    }

    /// Toggle a node in the selection. Returns whether it is now selected.
    pub fn toggle_selection(&mut self, qid: &str) -> Result<bool> {
        if !self.store.contains_node(qid) {
            return Err(KgquizError::InvalidInput(format!(
                "Node {} is not in the graph",
                qid
            )));
        }
        Ok(self.selection.toggle(qid))
    }

    pub fn triples(&self) -> Vec<Triple> {
        extract_triples(&self.store, &self.selection)
    }

    pub fn frontier(&self) -> Vec<&Node> {
        self.store.frontier()
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            nodes: self.store.node_count(),
            edges: self.store.edge_count(),
            expanded: self.store.nodes().filter(|n| self.store.is_expanded(&n.id)).count(),
            selected: self.selection.len(),
            in_flight: self.in_flight.len(),
        }
    }
}
