//! Text-generation backend client (Ollama-compatible HTTP API).

use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::time::Duration;

use crate::config::GenerationConfig;
use crate::error::{KgquizError, Result};
use crate::graph::Triple;
use crate::quiz::QuizFormat;

const OPEN_INSTRUCTIONS: &str = "You write quiz questions from knowledge graph triples. \
Each triple is: Subject -- Predicate -- Object.\n\
Output exactly 5 questions, one per line, each starting with a tag and a number:\n\
[RECALL] 1. (a fact stated directly in the triples)\n\
[RECALL] 2. ...\n\
[CONNECT] 3. (how two entities relate)\n\
[CONNECT] 4. ...\n\
[INFER] 5. (reasoning beyond what is stated)\n\
Output only the questions. No answers, no preamble.";

const MCQ_INSTRUCTIONS: &str = "You write multiple choice quiz questions from knowledge graph triples. \
Each triple is: Subject -- Predicate -- Object.\n\
Output exactly 5 questions, each starting with a tag and a number \
([RECALL] 1., [RECALL] 2., [CONNECT] 3., [CONNECT] 4., [INFER] 5.), \
followed by four option lines A) B) C) D). Mark the correct option with * at the end of its line \
and vary which letter is correct. Output only the questions and options.";

/// Request structure for the generate API
#[derive(Serialize)]
struct GenerateBody<'a> {
    model: &'a str,
    system: String,
    prompt: String,
    stream: bool,
}

/// Response structure from the generate API
#[derive(Deserialize)]
struct GenerateReply {
    #[serde(default)]
    response: String,
}

#[derive(Deserialize)]
struct TagsReply {
    #[serde(default)]
    models: Vec<TagModel>,
}

#[derive(Deserialize)]
struct TagModel {
    name: String,
}

fn think_block_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<think>.*?</think>\s*").expect("Invalid regex pattern"))
}

/// Remove `<think>...</think>` reasoning blocks emitted by some models, then trim.
pub fn strip_think_blocks(text: &str) -> String {
    think_block_regex().replace_all(text, "").trim().to_string()
}

/// One triple per line, `subject -- predicate -- object`.
pub fn render_triples(triples: &[Triple]) -> String {
    triples
        .iter()
        .map(Triple::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

fn system_prompt(format: QuizFormat, graph_entities: &[String]) -> String {
    match format {
        QuizFormat::Open => OPEN_INSTRUCTIONS.to_string(),
        QuizFormat::Mcq if graph_entities.is_empty() => MCQ_INSTRUCTIONS.to_string(),
        QuizFormat::Mcq => format!(
            "{}\nUse these entities as plausible wrong answers where possible: {}",
            MCQ_INSTRUCTIONS,
            graph_entities.join(", ")
        ),
    }
}

/// Client for the question generator
pub struct GenerationClient {
    client: Client,
    endpoint: String,
    model: String,
}

impl GenerationClient {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn default_model(&self) -> &str {
        &self.model
    }

    /// Generate quiz text for the given triples.
    ///
    /// An empty triple list is rejected before any request is made. Transport
    /// failures come back as [`KgquizError::Http`] so callers can tell a
    /// refused connection from a timeout.
    pub async fn generate(
        &self,
        triples: &[Triple],
        format: QuizFormat,
        graph_entities: &[String],
        model: Option<&str>,
    ) -> Result<String> {
        if triples.is_empty() {
            return Err(KgquizError::InvalidInput("No triples provided".to_string()));
        }

        let model = model.filter(|m| !m.trim().is_empty()).unwrap_or(&self.model);
        let body = GenerateBody {
            model,
            system: system_prompt(format, graph_entities),
            prompt: format!("Triples:\n{}", render_triples(triples)),
            stream: false,
        };

        let start = std::time::Instant::now();
        let response = self
            .client
            .post(format!("{}/api/generate", self.endpoint))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(KgquizError::Upstream(format!("Generator error {}: {}", status, body)));
        }

        let reply: GenerateReply = response
            .json()
            .await
            .map_err(|e| KgquizError::Upstream(format!("Failed to parse generator response: {}", e)))?;

        log::debug!(
            "Generated {} chars with {} in {:?}",
            reply.response.len(),
            model,
            start.elapsed()
        );
        Ok(strip_think_blocks(&reply.response))
    }

    /// Names of the models available on the generator host.
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.endpoint))
            .timeout(Duration::from_secs(5))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(KgquizError::Upstream(format!(
                "Generator error {}",
                response.status()
            )));
        }

        let tags: TagsReply = response.json().await?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

}
