//! Parses raw generator output into structured question candidates.
//!
//! The generator is free-form: responses arrive wrapped in markdown fences,
//! prefixed with prose, or truncated mid-array. Extraction never fails; it
//! keeps every complete, well-formed object and drops the rest.

use std::sync::OnceLock;

use regex::{Regex, RegexBuilder};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct QuestionCandidate {
    pub(crate) question: String,
    pub(crate) options: Vec<String>,
    pub(crate) answer_index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RejectReason {
    InvalidJson,
    MissingFields,
    TooFewOptions,
    AnswerNotAmongOptions,
}

#[derive(Debug, Deserialize)]
struct RawQuestion {
    #[serde(rename = "Question")]
    question: Option<Value>,
    #[serde(rename = "Options")]
    options: Option<Vec<Value>>,
    #[serde(rename = "Answer")]
    answer: Option<Value>,
}

fn fence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        RegexBuilder::new(r"```json|```").case_insensitive(true).build().expect("fence regex")
    })
}

fn object_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Flat object spans only: a truncated trailing object never matches, so
    // losing it costs one question instead of the whole response.
    RE.get_or_init(|| Regex::new(r"\{[^{}]*\}").expect("object regex"))
}

/// Full pipeline: every candidate object span with its accept/reject outcome,
/// in discovery order.
pub(crate) fn scan(raw_text: &str) -> Vec<Result<QuestionCandidate, RejectReason>> {
    if raw_text.is_empty() {
        return Vec::new();
    }

    let text = fence_re().replace_all(raw_text, "");
    let text = text.trim();

    let Some(start) = text.find('[') else {
        return Vec::new();
    };
    // Deliberately no matching `]` required: the array may be cut off.
    let text = &text[start..];

    object_re().find_iter(text).map(|span| decode_candidate(span.as_str())).collect()
}

/// Accepted candidates only.
pub(crate) fn extract(raw_text: &str) -> Vec<QuestionCandidate> {
    scan(raw_text).into_iter().flatten().collect()
}

fn decode_candidate(block: &str) -> Result<QuestionCandidate, RejectReason> {
    let raw: RawQuestion = serde_json::from_str(block).map_err(|_| RejectReason::InvalidJson)?;

    let question = raw.question.as_ref().map(value_text).unwrap_or_default();
    let answer = raw.answer.as_ref().map(value_text).unwrap_or_default();
    let options = raw.options.unwrap_or_default();

    if question.trim().is_empty() || answer.trim().is_empty() || options.is_empty() {
        return Err(RejectReason::MissingFields);
    }

    if options.len() < 2 {
        return Err(RejectReason::TooFewOptions);
    }

    let options: Vec<String> = options.iter().map(value_text).collect();

    let answer_index = options
        .iter()
        .position(|option| option.trim() == answer.trim())
        .ok_or(RejectReason::AnswerNotAmongOptions)?;

    Ok(QuestionCandidate { question, options, answer_index })
}

fn value_text(value: &Value) -> String {
    match value.as_str() {
        Some(text) => text.to_string(),
        None => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(question: &str, options: &[&str], answer_index: usize) -> QuestionCandidate {
        QuestionCandidate {
            question: question.to_string(),
            options: options.iter().map(|option| option.to_string()).collect(),
            answer_index,
        }
    }

    #[test]
    fn empty_input_yields_nothing() {
        assert!(extract("").is_empty());
        assert!(extract("no array here").is_empty());
    }

    #[test]
    fn parses_complete_array() {
        let raw = r#"[
            {"Question": "Capital of France?", "Options": ["Paris", "Rome"], "Answer": "Paris"},
            {"Question": "2+2?", "Options": ["3", "4"], "Answer": "4"}
        ]"#;

        let parsed = extract(raw);
        assert_eq!(
            parsed,
            vec![
                candidate("Capital of France?", &["Paris", "Rome"], 0),
                candidate("2+2?", &["3", "4"], 1),
            ]
        );
    }

    #[test]
    fn strips_markdown_fences_case_insensitively() {
        let raw = "```JSON\n[{\"Question\": \"Q\", \"Options\": [\"a\", \"b\"], \"Answer\": \"b\"}]\n```";
        let parsed = extract(raw);
        assert_eq!(parsed, vec![candidate("Q", &["a", "b"], 1)]);
    }

    #[test]
    fn ignores_prose_before_array_start() {
        let raw = "Here are your questions: [{\"Question\": \"Q\", \"Options\": [\"x\", \"y\"], \"Answer\": \"x\"}]";
        assert_eq!(extract(raw).len(), 1);
    }

    #[test]
    fn truncated_trailing_object_drops_only_the_tail() {
        let raw = r#"[
            {"Question": "Q1", "Options": ["a", "b"], "Answer": "a"},
            {"Question": "Q2", "Options": ["c", "d"], "Answer": "d"},
            {"Question": "Q3", "Options": ["e""#;

        let parsed = extract(raw);
        assert_eq!(parsed, vec![candidate("Q1", &["a", "b"], 0), candidate("Q2", &["c", "d"], 1)]);
    }

    #[test]
    fn malformed_object_is_skipped_silently() {
        let raw = r#"[{"Question": broken}, {"Question": "Q", "Options": ["a", "b"], "Answer": "a"}]"#;
        let outcomes = scan(raw);
        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0], Err(RejectReason::InvalidJson));
        assert!(outcomes[1].is_ok());
    }

    #[test]
    fn missing_fields_are_rejected() {
        let raw = r#"[
            {"Question": "Q1", "Options": ["a", "b"]},
            {"Question": "", "Options": ["a", "b"], "Answer": "a"},
            {"Question": "Q3", "Options": [], "Answer": "a"}
        ]"#;

        let outcomes = scan(raw);
        assert_eq!(outcomes.len(), 3);
        assert!(outcomes.iter().all(|outcome| *outcome == Err(RejectReason::MissingFields)));
    }

    #[test]
    fn answer_not_among_options_is_rejected() {
        let raw = r#"[{"Question": "Q", "Options": ["a", "b"], "Answer": "c"}]"#;
        let outcomes = scan(raw);
        assert_eq!(outcomes, vec![Err(RejectReason::AnswerNotAmongOptions)]);
    }

    #[test]
    fn answer_matching_trims_whitespace() {
        let raw = r#"[{"Question": "Q", "Options": ["  alpha  ", "beta"], "Answer": "alpha "}]"#;
        let parsed = extract(raw);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].answer_index, 0);
    }

    #[test]
    fn non_string_answer_values_compare_textually() {
        let raw = r#"[{"Question": "Q", "Options": [2, 4], "Answer": 4}]"#;
        let parsed = extract(raw);
        assert_eq!(parsed, vec![candidate("Q", &["2", "4"], 1)]);
    }

    #[test]
    fn single_option_question_is_rejected() {
        let raw = r#"[{"Question": "Q", "Options": ["only"], "Answer": "only"}]"#;
        assert_eq!(scan(raw), vec![Err(RejectReason::TooFewOptions)]);
    }

    #[test]
    fn discovery_order_is_preserved() {
        let raw = r#"[
            {"Question": "first", "Options": ["a", "b"], "Answer": "a"},
            {"Question": "second", "Options": ["a", "b"], "Answer": "b"},
            {"Question": "third", "Options": ["a", "b"], "Answer": "a"}
        ]"#;

        let questions: Vec<String> =
            extract(raw).into_iter().map(|candidate| candidate.question).collect();
        assert_eq!(questions, vec!["first", "second", "third"]);
    }
}
