//! The explorer's view of the knowledge source and question generator.
//!
//! [`ExplorerBackend`] is the seam between the session controller and the
//! outside world. [`LocalBackend`] talks to Wikidata and the generator
//! directly; [`HttpBackend`] goes through a running `kgquiz` server.

pub mod http;
pub mod local;
pub mod wire;

use async_trait::async_trait;

use crate::error::Result;
use crate::graph::GraphBatch;
use wire::{GenerateRequest, SearchHit};

pub use http::HttpBackend;
pub use local::LocalBackend;

#[async_trait]
pub trait ExplorerBackend: Send + Sync {
    /// Candidate entities for a free-text term.
    async fn search(&self, term: &str) -> Result<Vec<SearchHit>>;

    /// Root entity and the relations around it, `depth` levels deep.
    /// `None` leaves the depth to the upstream's configuration.
    async fn traverse(&self, qid: &str, label: &str, depth: Option<usize>) -> Result<GraphBatch>;

    /// Relations of one already-discovered node.
    async fn expand(&self, qid: &str) -> Result<GraphBatch>;

    /// Raw question text for the given triples.
    async fn generate(&self, request: &GenerateRequest) -> Result<String>;

    /// Models the generator can use.
    async fn models(&self) -> Result<Vec<String>>;
}
