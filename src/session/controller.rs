use std::path::Path;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

use super::{Completion, ExpandDecision, SessionState, SessionStats};
use crate::backend::wire::{GenerateRequest, SearchHit};
use crate::backend::ExplorerBackend;
use crate::error::{KgquizError, Result};
use crate::generation::render_triples;
use crate::graph::style::{render_elements, RenderedGraph};
use crate::graph::{MergeStats, Node, Triple};
use crate::quiz::{parse_questions, Question, QuizFormat};

fn entity_labels(state: &SessionState) -> Vec<String> {
    state
        .store()
        .nodes()
        .map(|node| node.display_label().to_string())
        .collect()
}

/// Outcome of an expand request that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpandOutcome {
    Merged(MergeStats),
    /// Already expanded or in flight; no request was made.
    AlreadyExpanded,
    /// The session was reset while the request was outstanding.
    Stale,
}

/// Drives one explorer session against a backend.
///
/// The state lock is never held across a backend call, so the graph stays
/// readable while requests are outstanding.
pub struct SessionController<B: ExplorerBackend> {
    backend: Arc<B>,
    state: Mutex<SessionState>,
}

impl<B: ExplorerBackend> SessionController<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            backend,
            state: Mutex::new(SessionState::new()),
        }
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Direct access to the session state.
    pub async fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().await
    }

    pub async fn search(&self, term: &str) -> Result<Vec<SearchHit>> {
        let term = term.trim();
        if term.is_empty() {
            return Err(KgquizError::InvalidInput("No search term provided".to_string()));
        }
        self.backend.search(term).await
    }

    /// Reset the session and load `qid` as the new root.
    pub async fn select_root(&self, qid: &str, label: &str) -> Result<Option<MergeStats>> {
        self.load_root(qid, label, None).await
    }

    /// Like [`select_root`](Self::select_root), fetching `depth` levels below
    /// the root instead of the backend's default. `None` when a later reset
    /// superseded the load.
    pub async fn load_root(&self, qid: &str, label: &str, depth: Option<usize>) -> Result<Option<MergeStats>> {
        let qid = qid.trim();
        if qid.is_empty() {
            return Err(KgquizError::InvalidInput("No QID provided".to_string()));
        }

        let ticket = self.state.lock().await.begin_root(qid, label);
        let result = self.backend.traverse(&ticket.qid, &ticket.label, depth).await;

        match self.state.lock().await.complete_root(ticket, result)? {
            Completion::Applied(stats) => Ok(Some(stats)),
            Completion::Stale => Ok(None),
        }
    }

    pub async fn expand(&self, qid: &str) -> Result<ExpandOutcome> {
        let decision = self.state.lock().await.begin_expand(qid.trim());
        let ticket = match decision {
            ExpandDecision::Issue(ticket) => ticket,
            ExpandDecision::AlreadyExpanded => {
                log::info!("{} is already expanded", qid);
                return Ok(ExpandOutcome::AlreadyExpanded);
            }
            ExpandDecision::NotReady => {
                return Err(KgquizError::Conflict(
                    "No graph loaded yet. Pick a root entity first.".to_string(),
                ))
            }
            ExpandDecision::UnknownNode => {
                return Err(KgquizError::InvalidInput(format!(
                    "Node {} is not in the graph",
                    qid
                )))
            }
        };

        let result = self.backend.expand(&ticket.qid).await;

        match self.state.lock().await.complete_expand(ticket, result)? {
            Completion::Applied(stats) => Ok(ExpandOutcome::Merged(stats)),
            Completion::Stale => Ok(ExpandOutcome::Stale),
        }
    }

    pub async fn toggle(&self, qid: &str) -> Result<bool> {
        self.state.lock().await.toggle_selection(qid.trim())
    }

    pub async fn triples(&self) -> Vec<Triple> {
        self.state.lock().await.triples()
    }

    /// Write the selection's triples to `path`, one per line.
    pub async fn export_triples(&self, path: &Path) -> Result<usize> {
        let triples = self.triples().await;
        if triples.is_empty() {
            return Err(KgquizError::InvalidInput("Nothing selected to export".to_string()));
        }

        tokio::fs::write(path, format!("{}\n", render_triples(&triples))).await?;
        log::info!("Exported {} triples to {}", triples.len(), path.display());
        Ok(triples.len())
    }

    pub async fn frontier(&self) -> Vec<Node> {
        self.state.lock().await.frontier().into_iter().cloned().collect()
    }

    pub async fn stats(&self) -> SessionStats {
        self.state.lock().await.stats()
    }

    pub async fn render(&self, hub_threshold: u64) -> RenderedGraph {
        let state = self.state.lock().await;
        render_elements(state.store(), state.selection(), hub_threshold)
    }

    pub async fn reset(&self) {
        self.state.lock().await.reset();
    }

    /// Generate questions from the triples of the current selection.
    ///
    /// Refused while nothing is selected; an empty request is never sent.
    pub async fn generate_questions(&self, format: QuizFormat, model: Option<String>) -> Result<Vec<Question>> {
        let (triples, graph_entities) = {
            let state = self.state.lock().await;
            (state.triples(), entity_labels(&state))
        };

        if triples.is_empty() {
            return Err(KgquizError::InvalidInput(
                "Select at least one node with relations before generating questions".to_string(),
            ));
        }

        let request = GenerateRequest {
            triples,
            format,
            graph_entities,
            model,
        };
        let text = self.backend.generate(&request).await?;
        Ok(parse_questions(&text))
    }
}
