//! Wikidata client: entity search, REST entity documents, batched label
//! resolution and SPARQL level fetches, assembled into graph payloads for
//! the traverse and expand endpoints.

mod entity;
mod sparql;

pub use entity::{entity_label, parse_entity_relations, sitelink_count, EntityRelations};
pub use sparql::{collect_level, level_query, local_id, Binding, Direction, LevelFetch, SparqlTerm};

use regex::Regex;
use reqwest::Client;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use crate::backend::wire::{GraphPayload, SearchHit, SearchHitData};
use crate::cache::LabelCache;
use crate::config::{TraversalMode, WikidataConfig, MAX_TRAVERSAL_DEPTH};
use crate::error::{KgquizError, Result};
use crate::graph::style::is_hub;

/// wbgetentities accepts at most 50 ids per call
const LABEL_BATCH_SIZE: usize = 50;

fn entity_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[QP][1-9][0-9]*$").expect("Invalid regex pattern"))
}

/// True for item or property ids such as `Q42` or `P31`.
pub fn is_entity_id(id: &str) -> bool {
    entity_id_regex().is_match(id)
}

fn require_entity_id(id: &str) -> Result<&str> {
    let id = id.trim();
    if is_entity_id(id) {
        Ok(id)
    } else {
        Err(KgquizError::InvalidInput(format!("Not a Wikidata entity id: '{}'", id)))
    }
}

/// Wikidata API client
///
/// Traversal limits and the mode are upstream policy: they only shape the
/// size and content of the payloads this client returns.
pub struct WikidataClient {
    client: Client,
    config: WikidataConfig,
    labels: Arc<LabelCache>,
}

impl WikidataClient {
    pub fn new(config: WikidataConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.sparql_timeout_secs.max(30)))
            .build()?;
        let labels = Arc::new(LabelCache::new(config.label_cache_capacity));

        Ok(Self {
            client,
            config,
            labels,
        })
    }

    pub fn mode(&self) -> TraversalMode {
        self.config.mode
    }

    /// Configured root traversal depth.
    pub fn max_depth(&self) -> usize {
        self.config.max_depth
    }

    fn is_hub(&self, sitelinks: u64) -> bool {
        is_hub(sitelinks, self.config.max_entity_sitelinks)
    }

    /// GET a JSON document, mapping non-success statuses to upstream errors.
    async fn get_json(&self, request: reqwest::RequestBuilder, what: &str) -> Result<Value> {
        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(KgquizError::Upstream(format!("{} failed ({}): {}", what, status, body)));
        }

        Ok(response.json().await?)
    }

    /// Find entities whose label or alias matches `term`.
    pub async fn search_entities(&self, term: &str) -> Result<Vec<SearchHit>> {
        let term = term.trim();
        if term.is_empty() {
            return Err(KgquizError::InvalidInput("No search term provided".to_string()));
        }

        let request = self.client.get(&self.config.api_endpoint).query(&[
            ("action", "wbsearchentities"),
            ("search", term),
            ("language", self.config.language.as_str()),
            ("format", "json"),
        ]);
        let data = self.get_json(request, "Entity search").await?;

        if let Some(error) = data.get("error") {
            let info = error
                .get("info")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            return Err(KgquizError::Upstream(format!("Entity search failed: {}", info)));
        }

        let hits = data
            .get("search")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| serde_json::from_value::<SearchHitData>(item.clone()).ok())
                    .filter_map(SearchHitData::into_hit)
                    .collect()
            })
            .unwrap_or_default();

        Ok(hits)
    }

    /// Fetch the REST entity document for an item.
    pub async fn get_entity(&self, qid: &str) -> Result<Value> {
        let qid = require_entity_id(qid)?;
        let url = format!(
            "{}/entities/items/{}",
            self.config.rest_endpoint.trim_end_matches('/'),
            qid
        );
        self.get_json(self.client.get(url), &format!("Entity {}", qid))
            .await
            .map_err(|e| match e {
                KgquizError::Upstream(_) | KgquizError::Http(_) => {
                    KgquizError::Upstream(format!("Could not retrieve entity {}: {}", qid, e))
                }
                other => other,
            })
    }

    /// Resolve labels for ids, 50 per request, consulting the label cache.
    ///
    /// Failed batches are logged and skipped; ids without a label are absent
    /// from the returned map.
    pub async fn resolve_labels<I>(&self, ids: I) -> HashMap<String, String>
    where
        I: IntoIterator<Item = String>,
    {
        let mut mapping = HashMap::new();
        let mut missing = Vec::new();

        for id in ids.into_iter().collect::<BTreeSet<_>>() {
            match self.labels.get(&id) {
                Some(label) => {
                    mapping.insert(id, label);
                }
                None if is_entity_id(&id) => missing.push(id),
                None => {}
            }
        }

        for batch in missing.chunks(LABEL_BATCH_SIZE) {
            let ids = batch.join("|");
            let request = self.client.get(&self.config.api_endpoint).query(&[
                ("action", "wbgetentities"),
                ("ids", ids.as_str()),
                ("props", "labels"),
                ("languages", self.config.language.as_str()),
                ("format", "json"),
            ]);

            let data = match self.get_json(request, "Label lookup").await {
                Ok(data) => data,
                Err(e) => {
                    log::warn!("Could not resolve labels for batch of {}: {}", batch.len(), e);
                    continue;
                }
            };

            let Some(entities) = data.get("entities").and_then(Value::as_object) else {
                continue;
            };
            for (id, info) in entities {
                let label = info
                    .get("labels")
                    .and_then(|labels| labels.get(&self.config.language))
                    .and_then(|l| l.get("value"))
                    .and_then(Value::as_str);
                if let Some(label) = label {
                    self.labels.put(id.clone(), label.to_string());
                    mapping.insert(id.clone(), label.to_string());
                }
            }
        }

        mapping
    }

    /// Run a SPARQL query and return its result rows.
    pub async fn sparql_query(&self, query: &str) -> Result<Vec<Binding>> {
        let request = self
            .client
            .get(&self.config.sparql_endpoint)
            .query(&[("query", query), ("format", "json")])
            .header("Accept", "application/sparql-results+json")
            .timeout(Duration::from_secs(self.config.sparql_timeout_secs));

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                KgquizError::Upstream(format!(
                    "SPARQL query timed out after {}s. Try reducing limits.",
                    self.config.sparql_timeout_secs
                ))
            } else {
                KgquizError::Http(e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(KgquizError::Upstream(format!("SPARQL query failed ({})", status)));
        }

        let parsed: sparql::SparqlResponse = response.json().await?;
        Ok(parsed.results.bindings)
    }

    /// Fetch one level of item-valued claims around `anchors`.
    pub async fn fetch_level(
        &self,
        anchors: &BTreeSet<String>,
        direction: Direction,
        per_anchor_limit: usize,
    ) -> Result<LevelFetch> {
        if anchors.is_empty() {
            return Ok(LevelFetch::default());
        }
        for id in anchors {
            require_entity_id(id)?;
        }

        let query = level_query(anchors, direction, &self.config.language);
        let bindings = self.sparql_query(&query).await?;
        let level = collect_level(&bindings, anchors, direction, per_anchor_limit);

        for (id, label) in &level.labels {
            if label != id {
                self.labels.put(id.clone(), label.clone());
            }
        }

        log::debug!(
            "SPARQL {:?} level for {} anchors: {} edges",
            direction,
            anchors.len(),
            level.edges.len()
        );
        Ok(level)
    }

    /// Root node plus its first ring of relations.
    pub async fn root_payload(&self, qid: &str, label: &str) -> Result<GraphPayload> {
        let qid = require_entity_id(qid)?.to_string();
        let fallback_label = if label.trim().is_empty() { qid.as_str() } else { label };

        match self.config.mode {
            TraversalMode::Rest | TraversalMode::Hybrid => {
                self.root_payload_rest(&qid, fallback_label).await
            }
            TraversalMode::Sparql => self.root_payload_sparql(&qid, fallback_label).await,
        }
    }

    async fn root_payload_rest(&self, qid: &str, label: &str) -> Result<GraphPayload> {
        let entity = self.get_entity(qid).await?;
        let parsed = parse_entity_relations(&entity, self.config.limit_relations);

        let mut ids = parsed.ids_to_resolve.clone();
        ids.insert(qid.to_string());
        let labels = self.resolve_labels(ids).await;
        let label_of = |id: &str| labels.get(id).cloned().unwrap_or_else(|| id.to_string());

        let root_label = labels
            .get(qid)
            .cloned()
            .or_else(|| entity_label(&entity, &self.config.language))
            .unwrap_or_else(|| label.to_string());

        let mut payload = GraphPayload::default();
        payload.push_node(qid, &root_label, Some(0), sitelink_count(&entity));
        for (prop_id, target) in &parsed.relations {
            payload.push_node(target, &label_of(target), Some(1), 0);
            payload.push_edge(qid, prop_id, target, &label_of(prop_id));
        }

        log::info!(
            "Root {} ({}): {} relations via REST",
            qid,
            root_label,
            parsed.relations.len()
        );
        Ok(payload)
    }

    async fn root_payload_sparql(&self, qid: &str, label: &str) -> Result<GraphPayload> {
        let anchors: BTreeSet<String> = [qid.to_string()].into_iter().collect();
        let level = self
            .fetch_level(&anchors, Direction::Forward, self.config.limit_relations)
            .await?;

        let root_label = level
            .labels
            .get(qid)
            .filter(|l| l.as_str() != qid)
            .cloned()
            .unwrap_or_else(|| label.to_string());

        let mut payload = GraphPayload::default();
        payload.push_node(qid, &root_label, Some(0), level.sitelinks.get(qid).copied().unwrap_or(0));
        append_level(&mut payload, &level, Some(1));

        log::info!("Root {} ({}): {} relations via SPARQL", qid, root_label, level.edges.len());
        Ok(payload)
    }

    /// Root entity plus up to `max_depth` levels of outgoing relations.
    ///
    /// The first level is [`root_payload`](Self::root_payload). Deeper levels
    /// take `limit_relations_deep` relations per entity, from REST documents in
    /// `rest` mode and from one SPARQL query per level otherwise. Hubs stay in
    /// the payload but are never traversed past. A failed deeper level ends
    /// the traversal with the levels fetched so far.
    pub async fn traverse_payload(&self, qid: &str, label: &str, max_depth: usize) -> Result<GraphPayload> {
        let max_depth = max_depth.clamp(1, MAX_TRAVERSAL_DEPTH);
        let mut payload = self.root_payload(qid, label).await?;

        let mut visited: HashSet<String> = payload
            .nodes
            .iter()
            .filter_map(|n| n.data.id.clone())
            .collect();
        let mut frontier: BTreeSet<String> = BTreeSet::new();
        for node in payload.nodes.iter().filter(|n| n.data.depth == Some(1)) {
            let (Some(id), sitelinks) = (&node.data.id, node.data.sitelinks.unwrap_or(0)) else {
                continue;
            };
            if self.is_hub(sitelinks) {
                log::info!("Not traversing past hub {} ({} sitelinks)", id, sitelinks);
            } else {
                frontier.insert(id.clone());
            }
        }

        for depth in 2..=max_depth {
            if frontier.is_empty() {
                break;
            }

            let level = match self.config.mode {
                TraversalMode::Rest => self.rest_level(&frontier).await,
                TraversalMode::Sparql | TraversalMode::Hybrid => {
                    self.fetch_level(&frontier, Direction::Forward, self.config.limit_relations_deep)
                        .await
                }
            };
            let level = match level {
                Ok(level) => level,
                Err(e) => {
                    log::warn!("Traversal of {} stopped before depth {}: {}", qid, depth, e);
                    break;
                }
            };

            payload.update_sitelinks(&level.sitelinks);
            append_level(&mut payload, &level, Some(depth as i64));

            let mut next = BTreeSet::new();
            for id in &level.discovered {
                if !visited.insert(id.clone()) {
                    continue;
                }
                let sitelinks = level.sitelinks.get(id).copied().unwrap_or(0);
                if self.is_hub(sitelinks) {
                    log::info!("Not traversing past hub {} ({} sitelinks)", id, sitelinks);
                } else {
                    next.insert(id.clone());
                }
            }
            frontier = next;
        }

        log::info!(
            "Traversed {} to depth {}: {} nodes, {} edges",
            qid,
            max_depth,
            payload.nodes.len(),
            payload.edges.len()
        );
        Ok(payload)
    }

    /// One level of outgoing relations read from each anchor's REST document.
    ///
    /// Anchors that turn out to be hubs contribute their sitelink count only.
    /// Anchors that cannot be fetched are skipped; the level fails only when
    /// none could be.
    async fn rest_level(&self, anchors: &BTreeSet<String>) -> Result<LevelFetch> {
        let mut level = LevelFetch::default();
        let mut fetched = 0;

        for anchor in anchors {
            let entity = match self.get_entity(anchor).await {
                Ok(entity) => entity,
                Err(e) => {
                    log::warn!("Skipping {}: {}", anchor, e);
                    continue;
                }
            };
            fetched += 1;

            let sitelinks = sitelink_count(&entity);
            level.sitelinks.insert(anchor.clone(), sitelinks);
            if self.is_hub(sitelinks) {
                log::info!("Not traversing past hub {} ({} sitelinks)", anchor, sitelinks);
                continue;
            }

            let parsed = parse_entity_relations(&entity, self.config.limit_relations_deep);
            for (prop_id, target) in parsed.relations {
                level.discovered.insert(target.clone());
                level.edges.push((anchor.clone(), prop_id, target));
            }
        }

        if fetched == 0 {
            return Err(KgquizError::Upstream(format!(
                "Could not retrieve any of {} entities",
                anchors.len()
            )));
        }

        let ids: Vec<String> = level
            .edges
            .iter()
            .flat_map(|(_, prop_id, target)| [prop_id.clone(), target.clone()])
            .collect();
        level.labels = self.resolve_labels(ids).await;
        Ok(level)
    }

    /// Outgoing and incoming relations of one node, fetched concurrently.
    ///
    /// One failed direction is logged and the other is still returned; the
    /// call fails only when both do.
    pub async fn expand_payload(&self, qid: &str) -> Result<GraphPayload> {
        let qid = require_entity_id(qid)?.to_string();
        let anchors: BTreeSet<String> = [qid.clone()].into_iter().collect();
        let limit = self.config.expand_limit;

        let (forward, reverse) = tokio::join!(
            self.fetch_level(&anchors, Direction::Forward, limit),
            self.fetch_level(&anchors, Direction::Reverse, limit),
        );

        let levels = match (forward, reverse) {
            (Err(e), Err(_)) => return Err(e),
            (Ok(f), Err(e)) => {
                log::warn!("Reverse expansion of {} failed: {}", qid, e);
                vec![f]
            }
            (Err(e), Ok(r)) => {
                log::warn!("Forward expansion of {} failed: {}", qid, e);
                vec![r]
            }
            (Ok(f), Ok(r)) => vec![f, r],
        };

        let mut payload = GraphPayload::default();
        for level in &levels {
            append_level(&mut payload, level, None);
        }

        log::info!(
            "Expanded {}: {} nodes, {} edges",
            qid,
            payload.nodes.len(),
            payload.edges.len()
        );
        Ok(payload)
    }
}

/// Add the discovered side of a level fetch to a payload.
fn append_level(payload: &mut GraphPayload, level: &LevelFetch, depth: Option<i64>) {
    let label_of = |id: &str| level.labels.get(id).cloned().unwrap_or_else(|| id.to_string());

    for (source, prop, target) in &level.edges {
        for id in [source, target] {
            if level.discovered.contains(id) {
                payload.push_node(id, &label_of(id), depth, level.sitelinks.get(id).copied().unwrap_or(0));
            }
        }
        payload.push_edge(source, prop, target, &label_of(prop));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Match, Mock, MockServer, Request, ResponseTemplate};

    /// Matches SPARQL requests whose query text contains a fragment.
    struct QueryContains(&'static str);

    impl Match for QueryContains {
        fn matches(&self, request: &Request) -> bool {
            request
                .url
                .query_pairs()
                .any(|(key, value)| key == "query" && value.contains(self.0))
        }
    }

    async fn setup_test_client(mode: TraversalMode) -> (MockServer, WikidataClient) {
        setup_hub_client(mode, 0).await
    }

    async fn setup_hub_client(mode: TraversalMode, hub_threshold: u64) -> (MockServer, WikidataClient) {
        let mock_server = MockServer::start().await;
        let config = WikidataConfig {
            mode,
            max_entity_sitelinks: hub_threshold,
            api_endpoint: format!("{}/w/api.php", mock_server.uri()),
            rest_endpoint: format!("{}/w/rest.php/wikibase/v1", mock_server.uri()),
            sparql_endpoint: format!("{}/sparql", mock_server.uri()),
            sparql_timeout_secs: 5,
            ..WikidataConfig::default()
        };
        let client = WikidataClient::new(config).unwrap();
        (mock_server, client)
    }

    fn uri(id: &str) -> String {
        format!("http://www.wikidata.org/entity/{}", id)
    }

    #[test]
    fn test_entity_id_validation() {
        assert!(is_entity_id("Q42"));
        assert!(is_entity_id("P31"));
        assert!(!is_entity_id("Q0"));
        assert!(!is_entity_id("L1"));
        assert!(!is_entity_id("Q42 } ?x"));
        assert!(!is_entity_id(""));
    }

    #[tokio::test]
    async fn test_search_entities() {
        let (mock_server, client) = setup_test_client(TraversalMode::Rest).await;

        Mock::given(method("GET"))
            .and(path("/w/api.php"))
            .and(query_param("action", "wbsearchentities"))
            .and(query_param("search", "Marie Curie"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "search": [
                    {"id": "Q7186", "label": "Marie Curie", "description": "physicist", "url": "//x"},
                    {"label": "no id"}
                ]
            })))
            .mount(&mock_server)
            .await;

        let hits = client.search_entities("Marie Curie").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "Q7186");
        assert_eq!(hits[0].description, "physicist");
    }

    #[tokio::test]
    async fn test_search_rejects_empty_term() {
        let (_mock_server, client) = setup_test_client(TraversalMode::Rest).await;
        let err = client.search_entities("   ").await.unwrap_err();
        assert!(matches!(err, KgquizError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_search_api_error_is_upstream() {
        let (mock_server, client) = setup_test_client(TraversalMode::Rest).await;
        Mock::given(method("GET"))
            .and(path("/w/api.php"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "error": {"code": "badvalue", "info": "Unrecognized value"}
            })))
            .mount(&mock_server)
            .await;

        let err = client.search_entities("x").await.unwrap_err();
        assert!(err.is_upstream());
        assert!(err.to_string().contains("Unrecognized value"));
    }

    #[tokio::test]
    async fn test_root_payload_rest() {
        let (mock_server, client) = setup_test_client(TraversalMode::Rest).await;

        Mock::given(method("GET"))
            .and(path("/w/rest.php/wikibase/v1/entities/items/Q7186"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "Q7186",
                "statements": {
                    "P19": [{"value": {"content": "Q270"}}],
                    "P31": [{"value": {"content": "Q5"}}]
                },
                "sitelinks": {"enwiki": {}, "plwiki": {}}
            })))
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/w/api.php"))
            .and(query_param("action", "wbgetentities"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "entities": {
                    "Q7186": {"labels": {"en": {"value": "Marie Curie"}}},
                    "Q270": {"labels": {"en": {"value": "Warsaw"}}},
                    "P19": {"labels": {"en": {"value": "place of birth"}}},
                    "P31": {"labels": {}}
                }
            })))
            .mount(&mock_server)
            .await;

        let payload = client.root_payload("Q7186", "Curie").await.unwrap();
        assert_eq!(payload.nodes.len(), 3);
        assert_eq!(payload.nodes[0].data.depth, Some(0));
        assert_eq!(payload.nodes[0].data.sitelinks, Some(2));
        assert_eq!(payload.nodes[0].data.label.as_deref(), Some("Marie Curie"));

        let batch = payload.into_batch();
        let warsaw = batch.nodes.iter().find(|n| n.id == "Q270").unwrap();
        assert_eq!(warsaw.label, "Warsaw");
        let unlabelled = batch.edges.iter().find(|e| e.relation_id == "P31").unwrap();
        assert_eq!(unlabelled.label, "P31");
        assert_eq!(batch.edges.len(), 2);

        // Labels are cached after the first resolution
        assert!(client.labels.get("Q270").is_some());
    }

    #[tokio::test]
    async fn test_root_payload_missing_entity() {
        let (mock_server, client) = setup_test_client(TraversalMode::Hybrid).await;
        Mock::given(method("GET"))
            .and(path("/w/rest.php/wikibase/v1/entities/items/Q404"))
            .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
            .mount(&mock_server)
            .await;

        let err = client.root_payload("Q404", "").await.unwrap_err();
        assert!(err.is_upstream());
        assert!(err.to_string().contains("Could not retrieve entity Q404"));
    }

    #[tokio::test]
    async fn test_root_payload_sparql_mode() {
        let (mock_server, client) = setup_test_client(TraversalMode::Sparql).await;
        Mock::given(method("GET"))
            .and(path("/sparql"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": {"bindings": [{
                    "source": {"value": uri("Q1")},
                    "prop": {"value": uri("P31")},
                    "target": {"value": uri("Q5")},
                    "sourceLabel": {"value": "One"},
                    "propLabel": {"value": "instance of"},
                    "targetLabel": {"value": "human"},
                    "sourceSitelinks": {"value": "40"},
                    "targetSitelinks": {"value": "300"}
                }]}
            })))
            .mount(&mock_server)
            .await;

        let payload = client.root_payload("Q1", "ignored").await.unwrap();
        assert_eq!(payload.nodes[0].data.label.as_deref(), Some("One"));
        assert_eq!(payload.nodes[0].data.sitelinks, Some(40));
        assert_eq!(payload.nodes[1].data.depth, Some(1));
        assert_eq!(payload.nodes[1].data.sitelinks, Some(300));
    }

    fn sparql_row(source: &str, prop: &str, target: &str, target_sitelinks: u64) -> Value {
        json!({
            "source": {"value": uri(source)},
            "prop": {"value": uri(prop)},
            "target": {"value": uri(target)},
            "targetSitelinks": {"value": target_sitelinks.to_string()}
        })
    }

    fn depth_of(payload: &GraphPayload, id: &str) -> Option<i64> {
        payload
            .nodes
            .iter()
            .find(|n| n.data.id.as_deref() == Some(id))
            .and_then(|n| n.data.depth)
    }

    #[tokio::test]
    async fn test_sparql_traversal_skips_hubs() {
        let (mock_server, client) = setup_hub_client(TraversalMode::Sparql, 100).await;

        Mock::given(method("GET"))
            .and(path("/sparql"))
            .and(QueryContains("VALUES ?source { wd:Q1 }"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": {"bindings": [
                    sparql_row("Q1", "P1", "Q2", 10),
                    sparql_row("Q1", "P2", "Q3", 500)
                ]}
            })))
            .mount(&mock_server)
            .await;

        // Only Q2 is traversed further; a query naming Q3 would find no mock
        Mock::given(method("GET"))
            .and(path("/sparql"))
            .and(QueryContains("VALUES ?source { wd:Q2 }"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": {"bindings": [
                    sparql_row("Q2", "P3", "Q4", 1),
                    sparql_row("Q2", "P4", "Q1", 0)
                ]}
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let payload = client.traverse_payload("Q1", "One", 2).await.unwrap();
        assert_eq!(depth_of(&payload, "Q1"), Some(0));
        assert_eq!(depth_of(&payload, "Q3"), Some(1));
        assert_eq!(depth_of(&payload, "Q4"), Some(2));
        assert_eq!(payload.nodes.len(), 4);

        let batch = payload.into_batch();
        assert!(batch.edges.iter().any(|e| e.id == "Q2-P4-Q1"));
        assert!(batch.edges.iter().all(|e| e.source != "Q3"));
    }

    #[tokio::test]
    async fn test_rest_traversal_skips_hubs() {
        let (mock_server, client) = setup_hub_client(TraversalMode::Rest, 2).await;

        let entities = [
            ("Q1", json!({"P1": [{"value": {"content": "Q2"}}], "P2": [{"value": {"content": "Q3"}}]}), json!({})),
            ("Q2", json!({"P3": [{"value": {"content": "Q4"}}]}), json!({"enwiki": {}})),
            ("Q3", json!({"P4": [{"value": {"content": "Q5"}}]}), json!({"enwiki": {}, "dewiki": {}})),
        ];
        for (id, statements, sitelinks) in entities {
            Mock::given(method("GET"))
                .and(path(format!("/w/rest.php/wikibase/v1/entities/items/{}", id)))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "id": id,
                    "statements": statements,
                    "sitelinks": sitelinks
                })))
                .mount(&mock_server)
                .await;
        }
        Mock::given(method("GET"))
            .and(path("/w/api.php"))
            .and(query_param("action", "wbgetentities"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"entities": {}})))
            .mount(&mock_server)
            .await;

        let payload = client.traverse_payload("Q1", "One", 3).await.unwrap();
        assert_eq!(depth_of(&payload, "Q4"), Some(2));
        assert_eq!(depth_of(&payload, "Q5"), None);

        let hub = payload
            .nodes
            .iter()
            .find(|n| n.data.id.as_deref() == Some("Q3"))
            .unwrap();
        assert_eq!(hub.data.sitelinks, Some(2));
    }

    #[tokio::test]
    async fn test_traversal_keeps_levels_before_a_failure() {
        let (mock_server, client) = setup_test_client(TraversalMode::Hybrid).await;
        Mock::given(method("GET"))
            .and(path("/w/rest.php/wikibase/v1/entities/items/Q1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "Q1",
                "statements": {"P1": [{"value": {"content": "Q2"}}]}
            })))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/w/api.php"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"entities": {}})))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/sparql"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let payload = client.traverse_payload("Q1", "One", 3).await.unwrap();
        assert_eq!(payload.nodes.len(), 2);
        assert_eq!(payload.edges.len(), 1);
    }

    #[tokio::test]
    async fn test_expand_payload_both_directions() {
        let (mock_server, client) = setup_test_client(TraversalMode::Hybrid).await;
        Mock::given(method("GET"))
            .and(path("/sparql"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": {"bindings": [
                    {
                        "source": {"value": uri("Q1")},
                        "prop": {"value": uri("P31")},
                        "target": {"value": uri("Q5")},
                        "propLabel": {"value": "instance of"},
                        "targetLabel": {"value": "human"}
                    },
                    {
                        "source": {"value": uri("Q9")},
                        "prop": {"value": uri("P50")},
                        "target": {"value": uri("Q1")},
                        "sourceLabel": {"value": "Book"},
                        "propLabel": {"value": "author"}
                    }
                ]}
            })))
            .mount(&mock_server)
            .await;

        let batch = client.expand_payload("Q1").await.unwrap().into_batch();
        let ids: Vec<_> = batch.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["Q5", "Q9"]);
        assert_eq!(batch.edges.len(), 2);
        assert!(batch.edges.iter().any(|e| e.id == "Q9-P50-Q1" && e.label == "author"));
    }

    #[tokio::test]
    async fn test_expand_payload_upstream_failure() {
        let (mock_server, client) = setup_test_client(TraversalMode::Sparql).await;
        Mock::given(method("GET"))
            .and(path("/sparql"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let err = client.expand_payload("Q1").await.unwrap_err();
        assert!(err.is_upstream());
    }

    #[tokio::test]
    async fn test_expand_rejects_bad_id() {
        let (_mock_server, client) = setup_test_client(TraversalMode::Sparql).await;
        let err = client.expand_payload("wd:Q1 }").await.unwrap_err();
        assert!(matches!(err, KgquizError::InvalidInput(_)));
    }
}
