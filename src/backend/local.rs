use async_trait::async_trait;
use std::sync::Arc;

use super::wire::{GenerateRequest, SearchHit};
use super::ExplorerBackend;
use crate::error::Result;
use crate::generation::GenerationClient;
use crate::graph::GraphBatch;
use crate::wikidata::WikidataClient;

/// In-process backend calling Wikidata and the generator directly.
#[derive(Clone)]
pub struct LocalBackend {
    wikidata: Arc<WikidataClient>,
    generator: Arc<GenerationClient>,
}

impl LocalBackend {
    pub fn new(wikidata: Arc<WikidataClient>, generator: Arc<GenerationClient>) -> Self {
        Self {
            wikidata,
            generator,
        }
    }
}

#[async_trait]
impl ExplorerBackend for LocalBackend {
    async fn search(&self, term: &str) -> Result<Vec<SearchHit>> {
        self.wikidata.search_entities(term).await
    }

    async fn traverse(&self, qid: &str, label: &str, depth: Option<usize>) -> Result<GraphBatch> {
        let depth = depth.unwrap_or_else(|| self.wikidata.max_depth());
        Ok(self.wikidata.traverse_payload(qid, label, depth).await?.into_batch())
    }

    async fn expand(&self, qid: &str) -> Result<GraphBatch> {
        Ok(self.wikidata.expand_payload(qid).await?.into_batch())
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<String> {
        self.generator
            .generate(
                &request.triples,
                request.format,
                &request.graph_entities,
                request.model.as_deref(),
            )
            .await
    }

    async fn models(&self) -> Result<Vec<String>> {
        self.generator.list_models().await
    }
}
