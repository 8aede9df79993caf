//! Quiz question records and the tagged-response parser.

mod parser;

pub use parser::parse_questions;

use serde::{Deserialize, Serialize};

/// Cognitive level a generated question targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QuestionTag {
    Recall,
    Connect,
    Infer,
}

impl QuestionTag {
    pub const ALL: [QuestionTag; 3] = [QuestionTag::Recall, QuestionTag::Connect, QuestionTag::Infer];

    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionTag::Recall => "RECALL",
            QuestionTag::Connect => "CONNECT",
            QuestionTag::Infer => "INFER",
        }
    }

    /// The bracketed marker that opens a tagged line, e.g. `[RECALL]`.
    pub fn marker(&self) -> &'static str {
        match self {
            QuestionTag::Recall => "[RECALL]",
            QuestionTag::Connect => "[CONNECT]",
            QuestionTag::Infer => "[INFER]",
        }
    }
}

impl std::fmt::Display for QuestionTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One multiple-choice option attached to a question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerOption {
    pub letter: char,
    pub text: String,
    pub correct: bool,
}

/// A parsed question, in source order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    /// `None` marks the unstructured fallback record.
    pub tag: Option<QuestionTag>,
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<AnswerOption>,
}

impl Question {
    pub fn tagged(tag: QuestionTag, text: impl Into<String>) -> Self {
        Self {
            tag: Some(tag),
            text: text.into(),
            options: Vec::new(),
        }
    }

    pub fn fallback(text: impl Into<String>) -> Self {
        Self {
            tag: None,
            text: text.into(),
            options: Vec::new(),
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.tag.is_none()
    }

    pub fn correct_option(&self) -> Option<&AnswerOption> {
        self.options.iter().find(|o| o.correct)
    }
}

/// Requested question style.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuizFormat {
    #[default]
    Open,
    Mcq,
}

impl std::str::FromStr for QuizFormat {
    type Err = crate::KgquizError;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(QuizFormat::Open),
            "mcq" => Ok(QuizFormat::Mcq),
            other => Err(crate::KgquizError::InvalidInput(format!(
                "Unknown quiz format '{}'. Use 'open' or 'mcq'.",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_serialization() {
        assert_eq!(serde_json::to_string(&QuestionTag::Connect).unwrap(), "\"CONNECT\"");
        assert_eq!(QuestionTag::Infer.marker(), "[INFER]");
    }

    #[test]
    fn test_quiz_format_parse() {
        assert_eq!("MCQ".parse::<QuizFormat>().unwrap(), QuizFormat::Mcq);
        assert_eq!("open".parse::<QuizFormat>().unwrap(), QuizFormat::Open);
        assert!("essay".parse::<QuizFormat>().is_err());
        assert_eq!(QuizFormat::default(), QuizFormat::Open);
    }

    #[test]
    fn test_question_json_skips_empty_options() {
        let json = serde_json::to_value(Question::tagged(QuestionTag::Recall, "Why?")).unwrap();
        assert_eq!(json["tag"], "RECALL");
        assert!(json.get("options").is_none());
        let json = serde_json::to_value(Question::fallback("raw")).unwrap();
        assert!(json["tag"].is_null());
    }
}
