use crate::backend::wire::{
    ErrorBody, ExpandRequest, GenerateRequest, GenerateResponse, GraphPayload, ModelsResponse, SearchHit,
    SearchRequest, TraverseRequest,
};
use crate::config::Config;
use crate::error::{KgquizError, Result};
use crate::generation::GenerationClient;
use crate::wikidata::WikidataClient;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Check if a port is available by attempting to bind to it
async fn check_port_available(port: u16) -> bool {
    tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port))
        .await
        .is_ok()
}

/// HTTP API server for the explorer
pub struct HttpServer {
    state: AppState,
    allowed_origins: Vec<String>,
}

impl HttpServer {
    pub fn new(config: &Config) -> Result<Self> {
        let wikidata = Arc::new(WikidataClient::new(config.wikidata.clone())?);
        let generator = Arc::new(GenerationClient::new(&config.generation)?);

        Ok(Self {
            state: AppState { wikidata, generator },
            allowed_origins: config.http_server.allowed_origins.clone(),
        })
    }

    /// Run the HTTP server
    pub async fn run(&self, port: u16) -> Result<()> {
        let app = create_router(self.state.clone(), &self.allowed_origins);

        let addr = format!("127.0.0.1:{}", port);
        log::info!("Starting kgquiz server on http://{}", addr);
        log::info!("Generator endpoint: {}", self.state.generator.endpoint());

        if !check_port_available(port).await {
            return Err(KgquizError::Config(format!(
                "Port {} is already in use. Stop the other process or set http_server.port in config.toml",
                port
            )));
        }

        let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|e| {
            KgquizError::Io(std::io::Error::new(
                std::io::ErrorKind::AddrInUse,
                format!("Failed to bind to {}: {}", addr, e),
            ))
        })?;

        axum::serve(listener, app).await.map_err(|e| {
            KgquizError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("HTTP server error: {}", e),
            ))
        })?;

        Ok(())
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub wikidata: Arc<WikidataClient>,
    pub generator: Arc<GenerationClient>,
}

/// Build the axum router.
///
/// With no configured origins every origin is allowed.
pub fn create_router(state: AppState, allowed_origins: &[String]) -> Router {
    let cors = if allowed_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<axum::http::HeaderValue> = allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    Router::new()
        .route("/api/search", post(handle_search))
        .route("/api/traverse", post(handle_traverse))
        .route("/api/expand", post(handle_expand))
        .route("/api/generate", post(handle_generate))
        .route("/api/models", get(handle_models))
        .route("/health", get(handle_health))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// An `{error}` body with its status code.
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.to_string(),
        }
    }

    /// Transport failures to the generator get their own statuses.
    fn from_generator(e: KgquizError, endpoint: &str) -> Self {
        match &e {
            KgquizError::Http(err) if err.is_timeout() => Self {
                status: StatusCode::GATEWAY_TIMEOUT,
                message: "Generator request timed out.".to_string(),
            },
            KgquizError::Http(err) if err.is_connect() => Self {
                status: StatusCode::SERVICE_UNAVAILABLE,
                message: format!(
                    "Could not connect to the generator. Is it running? (Expected at {})",
                    endpoint
                ),
            },
            _ => e.into(),
        }
    }
}

impl From<KgquizError> for ApiError {
    fn from(e: KgquizError) -> Self {
        let status = match &e {
            KgquizError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            KgquizError::Conflict(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let message = match e {
            KgquizError::Upstream(message) => message,
            other => other.to_string(),
        };
        Self { status, message }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            log::error!("Request failed ({}): {}", self.status, self.message);
        } else {
            log::info!("Rejected request ({}): {}", self.status, self.message);
        }
        (self.status, Json(ErrorBody { error: self.message })).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

#[derive(Serialize)]
struct SearchResults {
    results: Vec<SearchHit>,
}

async fn handle_search(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> ApiResult<SearchResults> {
    if request.term.trim().is_empty() {
        return Err(ApiError::bad_request("No search term provided"));
    }
    let results = state.wikidata.search_entities(&request.term).await?;
    Ok(Json(SearchResults { results }))
}

async fn handle_traverse(
    State(state): State<AppState>,
    Json(request): Json<TraverseRequest>,
) -> ApiResult<GraphPayload> {
    if request.qid.trim().is_empty() {
        return Err(ApiError::bad_request("No QID provided"));
    }
    let depth = request.depth.unwrap_or_else(|| state.wikidata.max_depth());
    let payload = state
        .wikidata
        .traverse_payload(&request.qid, &request.label, depth)
        .await?;
    Ok(Json(payload))
}

async fn handle_expand(
    State(state): State<AppState>,
    Json(request): Json<ExpandRequest>,
) -> ApiResult<GraphPayload> {
    if request.qid.trim().is_empty() {
        return Err(ApiError::bad_request("No QID provided"));
    }
    let payload = state.wikidata.expand_payload(&request.qid).await?;
    Ok(Json(payload))
}

async fn handle_generate(
    State(state): State<AppState>,
    Json(request): Json<GenerateRequest>,
) -> ApiResult<GenerateResponse> {
    if request.triples.is_empty() {
        return Err(ApiError::bad_request("No triples provided"));
    }

    let response = state
        .generator
        .generate(
            &request.triples,
            request.format,
            &request.graph_entities,
            request.model.as_deref(),
        )
        .await
        .map_err(|e| ApiError::from_generator(e, state.generator.endpoint()))?;

    Ok(Json(GenerateResponse::Text { response }))
}

/// Models are listed best-effort: a generator that cannot be reached
/// yields an empty list plus the error, with status 200.
async fn handle_models(State(state): State<AppState>) -> Json<ModelsResponse> {
    match state.generator.list_models().await {
        Ok(models) => Json(ModelsResponse { models, error: None }),
        Err(e) => {
            log::warn!("Could not list generator models: {}", e);
            Json(ModelsResponse {
                models: Vec::new(),
                error: Some(ApiError::from_generator(e, state.generator.endpoint()).message),
            })
        }
    }
}

async fn handle_health() -> Response {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "ok",
            "service": "kgquiz",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GenerationConfig, TraversalMode, WikidataConfig};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_state(upstream: &MockServer) -> AppState {
        let wikidata = WikidataConfig {
            mode: TraversalMode::Rest,
            api_endpoint: format!("{}/w/api.php", upstream.uri()),
            rest_endpoint: format!("{}/w/rest.php/wikibase/v1", upstream.uri()),
            sparql_endpoint: format!("{}/sparql", upstream.uri()),
            ..WikidataConfig::default()
        };
        let generation = GenerationConfig {
            endpoint: upstream.uri(),
            model: "test-model".to_string(),
            timeout_secs: 5,
        };
        AppState {
            wikidata: Arc::new(WikidataClient::new(wikidata).unwrap()),
            generator: Arc::new(GenerationClient::new(&generation).unwrap()),
        }
    }

    async fn call(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let upstream = MockServer::start().await;
        let app = create_router(test_state(&upstream), &[]);
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let (status, body) = call(app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "kgquiz");
    }

    #[tokio::test]
    async fn test_empty_inputs_are_bad_requests() {
        let upstream = MockServer::start().await;
        let app = create_router(test_state(&upstream), &[]);

        for (uri, body) in [
            ("/api/search", json!({"term": "  "})),
            ("/api/traverse", json!({"label": "x"})),
            ("/api/expand", json!({"qid": ""})),
            ("/api/generate", json!({"triples": []})),
        ] {
            let (status, body) = call(app.clone(), post_json(uri, body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
            assert!(body["error"].is_string(), "{}", uri);
        }
    }

    #[tokio::test]
    async fn test_search_route() {
        let upstream = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/w/api.php"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "search": [{"id": "Q90", "label": "Paris", "description": "capital of France"}]
            })))
            .mount(&upstream)
            .await;

        let app = create_router(test_state(&upstream), &[]);
        let (status, body) = call(app, post_json("/api/search", json!({"term": "paris"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["results"][0]["id"], "Q90");
    }

    #[tokio::test]
    async fn test_traverse_upstream_failure() {
        let upstream = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/w/rest.php/wikibase/v1/entities/items/Q404"))
            .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
            .mount(&upstream)
            .await;

        let app = create_router(test_state(&upstream), &[]);
        let (status, body) =
            call(app, post_json("/api/traverse", json!({"qid": "Q404", "label": "x"}))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().unwrap().contains("Q404"));
    }

    #[tokio::test]
    async fn test_generate_route() {
        let upstream = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "response": "<think>x</think>[INFER] 1. Why?"
            })))
            .mount(&upstream)
            .await;

        let app = create_router(test_state(&upstream), &[]);
        let request = json!({
            "triples": [{"subject": "A", "predicate": "p", "object": "B"}],
            "format": "mcq",
            "graphEntities": ["A", "B"]
        });
        let (status, body) = call(app, post_json("/api/generate", request)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["response"], "[INFER] 1. Why?");
    }

    #[tokio::test]
    async fn test_generator_unreachable() {
        let upstream = MockServer::start().await;
        let mut state = test_state(&upstream);
        state.generator = Arc::new(
            GenerationClient::new(&GenerationConfig {
                endpoint: "http://127.0.0.1:9".to_string(),
                model: "test-model".to_string(),
                timeout_secs: 2,
            })
            .unwrap(),
        );

        let app = create_router(state, &[]);
        let request = json!({"triples": [{"subject": "A", "predicate": "p", "object": "B"}]});
        let (status, body) = call(app.clone(), post_json("/api/generate", request)).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body["error"].as_str().unwrap().contains("Is it running?"));

        let request = Request::builder().uri("/api/models").body(Body::empty()).unwrap();
        let (status, body) = call(app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["models"], json!([]));
        assert!(body["error"].is_string());
    }
}
