//! Request/response schemas of the explorer HTTP API and boundary validation.
//!
//! Payload records are loosely typed on the wire (every field optional) and
//! are converted into [`GraphBatch`]/[`SearchHit`] here. Records missing a
//! required identifier, or with a field of the wrong type, are dropped and
//! never surfaced as errors.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::graph::{edge_id, Edge, GraphBatch, NodeRecord, Triple};
use crate::quiz::QuizFormat;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub term: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraverseRequest {
    #[serde(default)]
    pub qid: String,
    #[serde(default)]
    pub label: String,
    /// Levels to fetch below the root; the server's configured depth when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpandRequest {
    #[serde(default)]
    pub qid: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub triples: Vec<Triple>,
    #[serde(default)]
    pub format: QuizFormat,
    /// Labels of entities in the graph, offered as distractors in MCQ mode.
    #[serde(default, rename = "graphEntities")]
    pub graph_entities: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// One entity search candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub label: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchHitData {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SearchResponse {
    Error { error: String },
    Results {
        #[serde(deserialize_with = "lenient_records")]
        results: Vec<SearchHitData>,
    },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeData {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub qid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Depth as the service saw it; the store assigns its own.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth: Option<i64>,
    #[serde(default)]
    pub sitelinks: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeDataWrapper {
    pub data: NodeData,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EdgeData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default, rename = "property", alias = "relationId")]
    pub relation_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EdgeDataWrapper {
    pub data: EdgeData,
}

/// Node/edge payload of the traverse and expand endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphPayload {
    #[serde(default, deserialize_with = "lenient_records")]
    pub nodes: Vec<NodeDataWrapper>,
    #[serde(default, deserialize_with = "lenient_records")]
    pub edges: Vec<EdgeDataWrapper>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GraphResponse {
    Error { error: String },
    Graph(GraphPayload),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GenerateResponse {
    Error { error: String },
    Text { response: String },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelsResponse {
    #[serde(default)]
    pub models: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Decode a record list one element at a time, skipping elements that do
/// not fit `T`. A `null` list reads as empty.
fn lenient_records<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let values = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
    let total = values.len();
    let records: Vec<T> = values
        .into_iter()
        .filter_map(|value| serde_json::from_value(value).ok())
        .collect();

    if records.len() < total {
        log::debug!("Skipped {} records of the wrong shape", total - records.len());
    }
    Ok(records)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl SearchHitData {
    /// Validate into a [`SearchHit`]; `None` when the id is missing.
    pub fn into_hit(self) -> Option<SearchHit> {
        let id = non_empty(self.id)?;
        Some(SearchHit {
            label: non_empty(self.label).unwrap_or_else(|| "No Label".to_string()),
            description: self.description.unwrap_or_default(),
            id,
        })
    }
}

impl NodeData {
    pub fn into_record(self) -> Option<NodeRecord> {
        let id = non_empty(self.id).or_else(|| non_empty(self.qid))?;
        Some(NodeRecord {
            label: non_empty(self.label).unwrap_or_else(|| id.clone()),
            description: self.description.unwrap_or_default(),
            sitelink_count: self.sitelinks.unwrap_or(0),
            id,
        })
    }
}

impl EdgeData {
    pub fn into_edge(self) -> Option<Edge> {
        let source = non_empty(self.source)?;
        let target = non_empty(self.target)?;
        let relation_id = non_empty(self.relation_id)?;
        let id = non_empty(self.id).unwrap_or_else(|| edge_id(&source, &relation_id, &target));
        Some(Edge {
            id,
            label: non_empty(self.label).unwrap_or_else(|| relation_id.clone()),
            source,
            target,
            relation_id,
        })
    }
}

impl GraphPayload {
    /// Append a node unless one with the same id is already in the payload.
    pub fn push_node(&mut self, id: &str, label: &str, depth: Option<i64>, sitelinks: u64) {
        if self
            .nodes
            .iter()
            .any(|n| n.data.id.as_deref() == Some(id))
        {
            return;
        }
        self.nodes.push(NodeDataWrapper {
            data: NodeData {
                id: Some(id.to_string()),
                label: Some(label.to_string()),
                qid: Some(id.to_string()),
                description: None,
                depth,
                sitelinks: Some(sitelinks),
            },
        });
    }

    /// Fill in sitelink counts for nodes that arrived without one.
    pub fn update_sitelinks(&mut self, sitelinks: &HashMap<String, u64>) {
        for node in &mut self.nodes {
            let known = node.data.sitelinks.unwrap_or(0);
            if known > 0 {
                continue;
            }
            if let Some(count) = node.data.id.as_ref().and_then(|id| sitelinks.get(id)) {
                node.data.sitelinks = Some(*count);
            }
        }
    }

    pub fn push_edge(&mut self, source: &str, relation_id: &str, target: &str, label: &str) {
        self.edges.push(EdgeDataWrapper {
            data: EdgeData {
                id: None,
                source: Some(source.to_string()),
                target: Some(target.to_string()),
                label: Some(label.to_string()),
                relation_id: Some(relation_id.to_string()),
            },
        });
    }

    /// Validate every record, dropping the malformed ones.
    pub fn into_batch(self) -> GraphBatch {
        let node_total = self.nodes.len();
        let edge_total = self.edges.len();

        let nodes: Vec<NodeRecord> = self
            .nodes
            .into_iter()
            .filter_map(|w| w.data.into_record())
            .collect();
        let edges: Vec<Edge> = self
            .edges
            .into_iter()
            .filter_map(|w| w.data.into_edge())
            .collect();

        let dropped = (node_total - nodes.len()) + (edge_total - edges.len());
        if dropped > 0 {
            log::debug!("Dropped {} malformed graph records", dropped);
        }

        GraphBatch { nodes, edges }
    }
}
