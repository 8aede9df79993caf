use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use url::Url;

/// Deepest root traversal accepted from configuration or requests
pub const MAX_TRAVERSAL_DEPTH: usize = 3;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub explorer: ExplorerConfig,
    #[serde(default)]
    pub wikidata: WikidataConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub http_server: HttpServerConfig,
}

/// Process-wide settings
#[derive(Debug, Clone, Deserialize)]
pub struct ExplorerConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

/// How the root entity's first ring of relations is fetched
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraversalMode {
    /// Root from the Wikibase REST entity document
    #[default]
    Rest,
    /// Root from one SPARQL level query
    Sparql,
    /// REST for the root, SPARQL levels below it
    Hybrid,
}

/// Knowledge-base (Wikidata) client settings
#[derive(Debug, Clone, Deserialize)]
pub struct WikidataConfig {
    #[serde(default)]
    pub mode: TraversalMode,
    /// Relations taken from the root entity
    #[serde(default = "default_limit_relations")]
    pub limit_relations: usize,
    /// Relations taken per entity below the first level
    #[serde(default = "default_limit_relations_deep")]
    pub limit_relations_deep: usize,
    /// Levels fetched by a root traversal, 1 to [`MAX_TRAVERSAL_DEPTH`]
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_api_endpoint")]
    pub api_endpoint: String,
    #[serde(default = "default_rest_endpoint")]
    pub rest_endpoint: String,
    #[serde(default = "default_sparql_endpoint")]
    pub sparql_endpoint: String,
    #[serde(default = "default_sparql_timeout_secs")]
    pub sparql_timeout_secs: u64,
    /// Sitelink count at which an entity counts as a hub: rendered with
    /// emphasis and not traversed past. 0 disables.
    #[serde(default)]
    pub max_entity_sitelinks: u64,
    /// Relations fetched per direction when expanding a node
    #[serde(default = "default_expand_limit")]
    pub expand_limit: usize,
    #[serde(default = "default_label_cache_capacity")]
    pub label_cache_capacity: usize,
    #[serde(default = "default_language")]
    pub language: String,
}

impl Default for WikidataConfig {
    fn default() -> Self {
        Self {
            mode: TraversalMode::default(),
            limit_relations: default_limit_relations(),
            limit_relations_deep: default_limit_relations_deep(),
            max_depth: default_max_depth(),
            user_agent: default_user_agent(),
            api_endpoint: default_api_endpoint(),
            rest_endpoint: default_rest_endpoint(),
            sparql_endpoint: default_sparql_endpoint(),
            sparql_timeout_secs: default_sparql_timeout_secs(),
            max_entity_sitelinks: 0,
            expand_limit: default_expand_limit(),
            label_cache_capacity: default_label_cache_capacity(),
            language: default_language(),
        }
    }
}

/// Text-generation backend settings
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_generation_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_generation_model")]
    pub model: String,
    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            endpoint: default_generation_endpoint(),
            model: default_generation_model(),
            timeout_secs: default_generation_timeout_secs(),
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpServerConfig {
    #[serde(default = "default_http_port")]
    pub port: u16,
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            port: default_http_port(),
            allowed_origins: Vec::new(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_limit_relations() -> usize {
    20
}

fn default_limit_relations_deep() -> usize {
    5
}

fn default_max_depth() -> usize {
    1
}

fn default_user_agent() -> String {
    format!("kgquiz/{} (https://github.com/kgquiz/kgquiz)", env!("CARGO_PKG_VERSION"))
}

fn default_api_endpoint() -> String {
    "https://www.wikidata.org/w/api.php".to_string()
}

fn default_rest_endpoint() -> String {
    "https://www.wikidata.org/w/rest.php/wikibase/v1".to_string()
}

fn default_sparql_endpoint() -> String {
    "https://query.wikidata.org/sparql".to_string()
}

fn default_sparql_timeout_secs() -> u64 {
    55
}

fn default_expand_limit() -> usize {
    50
}

fn default_label_cache_capacity() -> usize {
    2048
}

fn default_language() -> String {
    "en".to_string()
}

fn default_generation_endpoint() -> String {
    "http://localhost:11434".to_string()
}

fn default_generation_model() -> String {
    "qwen3:8b".to_string()
}

fn default_generation_timeout_secs() -> u64 {
    120
}

fn default_http_port() -> u16 {
    5001
}

impl Config {
    /// Load configuration from file
    ///
    /// Loads environment variables from .env file (if present) before loading config.
    /// The file is `$KGQUIZ_CONFIG` if set, otherwise `./config.toml`. A missing
    /// file yields the built-in defaults; a file that fails to parse is an error.
    pub fn load() -> Result<Self> {
        let _ = dotenv::dotenv();

        let config_path = std::env::var("KGQUIZ_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.toml"));

        if !config_path.exists() {
            log::info!(
                "No config file at {} - using defaults",
                config_path.display()
            );
            let config = Config::default();
            config.validate()?;
            return Ok(config);
        }

        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config = Self::from_toml(&config_str)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;

        log::info!(
            "Loaded {} (mode={:?})",
            config_path.display(),
            config.wikidata.mode
        );
        Ok(config)
    }

    /// Parse and validate configuration text
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.wikidata.limit_relations == 0 {
            anyhow::bail!("wikidata.limit_relations must be greater than 0");
        }

        if self.wikidata.limit_relations_deep == 0 {
            anyhow::bail!("wikidata.limit_relations_deep must be greater than 0");
        }

        if !(1..=MAX_TRAVERSAL_DEPTH).contains(&self.wikidata.max_depth) {
            anyhow::bail!(
                "wikidata.max_depth must be between 1 and {}",
                MAX_TRAVERSAL_DEPTH
            );
        }

        if self.wikidata.expand_limit == 0 {
            anyhow::bail!("wikidata.expand_limit must be greater than 0");
        }

        if self.wikidata.sparql_timeout_secs == 0 {
            anyhow::bail!("wikidata.sparql_timeout_secs must be greater than 0");
        }

        if self.generation.timeout_secs == 0 {
            anyhow::bail!("generation.timeout_secs must be greater than 0");
        }

        if self.wikidata.user_agent.trim().is_empty() {
            anyhow::bail!("wikidata.user_agent must not be empty (Wikimedia rejects anonymous clients)");
        }

        for (name, value) in [
            ("wikidata.api_endpoint", &self.wikidata.api_endpoint),
            ("wikidata.rest_endpoint", &self.wikidata.rest_endpoint),
            ("wikidata.sparql_endpoint", &self.wikidata.sparql_endpoint),
            ("generation.endpoint", &self.generation.endpoint),
        ] {
            Url::parse(value).with_context(|| format!("{} is not a valid URL: {}", name, value))?;
        }

        Ok(())
    }

    /// Hub threshold handed to the style mapping
    pub fn hub_threshold(&self) -> u64 {
        self.wikidata.max_entity_sitelinks
    }
}
