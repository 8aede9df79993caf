use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

use super::wire::{
    ErrorBody, ExpandRequest, GenerateRequest, GenerateResponse, GraphResponse, ModelsResponse, SearchHit,
    SearchHitData, SearchRequest, SearchResponse, TraverseRequest,
};
use super::ExplorerBackend;
use crate::error::{KgquizError, Result};
use crate::graph::GraphBatch;

/// Backend that talks to a running `kgquiz` server.
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let parsed = url::Url::parse(base_url)
            .map_err(|e| KgquizError::Config(format!("Invalid server URL '{}': {}", base_url, e)))?;

        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: parsed.as_str().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POST a JSON body and decode the reply.
    ///
    /// Error payloads arrive with a non-2xx status and usually an `{error}`
    /// body; both the status and the message end up in the returned error.
    async fn post<B, R>(&self, path: &str, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .json(body)
            .send()
            .await?;
        self.decode(path, response).await
    }

    async fn decode<R: DeserializeOwned>(&self, path: &str, response: reqwest::Response) -> Result<R> {
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&text)
                .map(|body| body.error)
                .unwrap_or(text);
            return Err(KgquizError::Upstream(format!(
                "{} returned {}: {}",
                path, status, message
            )));
        }

        serde_json::from_str(&text).map_err(|e| {
            KgquizError::Upstream(format!("Malformed response from {}: {}", path, e))
        })
    }
}

fn graph_batch(response: GraphResponse) -> Result<GraphBatch> {
    match response {
        GraphResponse::Error { error } => Err(KgquizError::Upstream(error)),
        GraphResponse::Graph(payload) => Ok(payload.into_batch()),
    }
}

#[async_trait]
impl ExplorerBackend for HttpBackend {
    async fn search(&self, term: &str) -> Result<Vec<SearchHit>> {
        let request = SearchRequest {
            term: term.to_string(),
        };
        match self.post::<_, SearchResponse>("/api/search", &request).await? {
            SearchResponse::Error { error } => Err(KgquizError::Upstream(error)),
            SearchResponse::Results { results } => Ok(results
                .into_iter()
                .filter_map(SearchHitData::into_hit)
                .collect()),
        }
    }

    async fn traverse(&self, qid: &str, label: &str, depth: Option<usize>) -> Result<GraphBatch> {
        let request = TraverseRequest {
            qid: qid.to_string(),
            label: label.to_string(),
            depth,
        };
        graph_batch(self.post("/api/traverse", &request).await?)
    }

    async fn expand(&self, qid: &str) -> Result<GraphBatch> {
        let request = ExpandRequest {
            qid: qid.to_string(),
        };
        graph_batch(self.post("/api/expand", &request).await?)
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<String> {
        match self.post::<_, GenerateResponse>("/api/generate", request).await? {
            GenerateResponse::Error { error } => Err(KgquizError::Upstream(error)),
            GenerateResponse::Text { response } => Ok(response),
        }
    }

    async fn models(&self) -> Result<Vec<String>> {
        let response = self
            .client
            .get(format!("{}/api/models", self.base_url))
            .send()
            .await?;
        let models: ModelsResponse = self.decode("/api/models", response).await?;

        match models.error {
            Some(error) if models.models.is_empty() => Err(KgquizError::Upstream(error)),
            _ => Ok(models.models),
        }
    }
}
