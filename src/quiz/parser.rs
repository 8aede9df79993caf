//! Line-oriented parser for tagged generator output.
//!
//! A question line starts with one of the [`QuestionTag`] markers, optionally
//! followed by a numbering token (`1.`, `2 `), then the text. Option lines
//! (`A) ...` through `D) ...`, a trailing `*` marks the answer) attach to the
//! preceding question. Everything else is ignored, unless no question line
//! is found at all, in which case the whole response becomes one fallback
//! record.

use super::{AnswerOption, Question, QuestionTag};

const OPTION_LETTERS: [char; 4] = ['A', 'B', 'C', 'D'];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// No question seen yet, or the last one was closed by an unrelated line.
    Scanning,
    /// Collecting options for the most recent question.
    InQuestion,
}

/// Parse a generator response into questions. Never fails.
pub fn parse_questions(text: &str) -> Vec<Question> {
    let mut questions: Vec<Question> = Vec::new();
    let mut state = State::Scanning;

    for raw_line in text.lines() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some((tag, body)) = match_tag(line) {
            questions.push(Question::tagged(tag, strip_numbering(body)));
            state = State::InQuestion;
            continue;
        }

        match (state, match_option(line)) {
            (State::InQuestion, Some(option)) => {
                if let Some(question) = questions.last_mut() {
                    question.options.push(option);
                }
            }
            _ => state = State::Scanning,
        }
    }

    if questions.is_empty() {
        let raw = text.trim();
        if raw.is_empty() {
            return Vec::new();
        }
        return vec![Question::fallback(raw)];
    }

    questions
}

fn match_tag(line: &str) -> Option<(QuestionTag, &str)> {
    QuestionTag::ALL
        .iter()
        .find_map(|tag| line.strip_prefix(tag.marker()).map(|rest| (*tag, rest)))
}

/// Drop a leading `digits[.]` token and surrounding whitespace.
fn strip_numbering(body: &str) -> String {
    let body = body.trim_start();
    let digits = body.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return body.trim_end().to_string();
    }
    let rest = &body[digits..];
    let rest = rest.strip_prefix('.').unwrap_or(rest);
    rest.trim().to_string()
}

fn match_option(line: &str) -> Option<AnswerOption> {
    let mut chars = line.chars();
    let letter = chars.next()?.to_ascii_uppercase();
    if !OPTION_LETTERS.contains(&letter) || chars.next()? != ')' {
        return None;
    }
    let rest = chars.as_str().trim();
    let (text, correct) = match rest.strip_suffix('*') {
        Some(stripped) => (stripped.trim_end(), true),
        None => (rest, false),
    };
    Some(AnswerOption {
        letter,
        text: text.to_string(),
        correct,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tagged_lines_with_numbering() {
        let questions = parse_questions("[RECALL] 1. What is the capital?\n[INFER] Why is that?");
        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0].tag, Some(QuestionTag::Recall));
        assert_eq!(questions[0].text, "What is the capital?");
        assert_eq!(questions[1].tag, Some(QuestionTag::Infer));
        assert_eq!(questions[1].text, "Why is that?");
    }

    #[test]
    fn test_plain_text_fallback() {
        let questions = parse_questions("Just plain text with no tags");
        assert_eq!(questions.len(), 1);
        assert!(questions[0].is_fallback());
        assert_eq!(questions[0].text, "Just plain text with no tags");
    }

    #[test]
    fn test_fallback_preserves_line_breaks() {
        let questions = parse_questions("Here are some questions:\n1. Who?\n2. What?\n");
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].text, "Here are some questions:\n1. Who?\n2. What?");
    }

    #[test]
    fn test_mixed_lines_drop_untagged() {
        let text = "Sure! Here you go:\n[CONNECT] 3. How are A and B related?\nHope this helps\n[RECALL] 1 Where was she born?";
        let questions = parse_questions(text);
        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0].tag, Some(QuestionTag::Connect));
        assert_eq!(questions[0].text, "How are A and B related?");
        assert_eq!(questions[1].text, "Where was she born?");
        assert!(questions.iter().all(|q| !q.is_fallback()));
    }

    #[test]
    fn test_numbering_without_period() {
        assert_eq!(strip_numbering(" 12   Text"), "Text");
        assert_eq!(strip_numbering("4.Text"), "Text");
        assert_eq!(strip_numbering(" no number "), "no number");
    }

    #[test]
    fn test_multiple_choice_options() {
        let text = "[RECALL] 1. Where was Marie Curie born?\nA) Paris\nB) Warsaw *\nC) Vienna\nD) Berlin\n\n[INFER] 2. Next?\nA) yes\nB) no*";
        let questions = parse_questions(text);
        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0].options.len(), 4);
        let correct = questions[0].correct_option().unwrap();
        assert_eq!(correct.letter, 'B');
        assert_eq!(correct.text, "Warsaw");
        assert_eq!(questions[1].correct_option().unwrap().text, "no");
    }

    #[test]
    fn test_options_without_question_are_ignored() {
        let text = "A) stray\n[RECALL] Q?\nsome chatter\nB) orphan";
        let questions = parse_questions(text);
        assert_eq!(questions.len(), 1);
        assert!(questions[0].options.is_empty());
    }

    #[test]
    fn test_option_lines_alone_fall_back() {
        let questions = parse_questions("A) one\nB) two");
        assert_eq!(questions.len(), 1);
        assert!(questions[0].is_fallback());
    }

    #[test]
    fn test_blank_response() {
        assert!(parse_questions("  \n ").is_empty());
    }

    #[test]
    fn test_tag_must_open_line() {
        let questions = parse_questions("Question [RECALL] hidden");
        assert_eq!(questions.len(), 1);
        assert!(questions[0].is_fallback());
    }
}
