use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use validator::Validate;

pub(crate) use crate::core::time::format_primitive;
use crate::db::models::{Attempt, Question};
use crate::db::types::AttemptStatus;

/// A question as candidates see it while the attempt is live. The correct
/// index never leaves the server before submission.
#[derive(Debug, Serialize)]
pub(crate) struct QuestionPublic {
    pub(crate) id: String,
    pub(crate) text: String,
    pub(crate) choices: Vec<String>,
}

impl From<Question> for QuestionPublic {
    fn from(question: Question) -> Self {
        Self { id: question.id, text: question.text, choices: question.choices.0 }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct AttemptResponse {
    pub(crate) attempt_id: String,
    pub(crate) exam_id: String,
    pub(crate) exam_title: String,
    pub(crate) status: AttemptStatus,
    pub(crate) questions: Vec<QuestionPublic>,
    pub(crate) answers: HashMap<String, i32>,
    pub(crate) time_allowed_secs: i32,
    pub(crate) time_elapsed: i32,
    pub(crate) started_at: String,
}

impl AttemptResponse {
    pub(crate) fn new(attempt: Attempt, exam_title: String, questions: Vec<QuestionPublic>) -> Self {
        Self {
            attempt_id: attempt.id,
            exam_id: attempt.exam_id,
            exam_title,
            status: attempt.status,
            questions,
            answers: attempt.answers.0,
            time_allowed_secs: attempt.time_allowed_secs,
            time_elapsed: attempt.time_elapsed,
            started_at: format_primitive(attempt.started_at),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct SaveAnswerRequest {
    #[serde(alias = "questionId")]
    #[validate(length(min = 1, message = "question_id must not be empty"))]
    pub(crate) question_id: String,
    #[serde(alias = "selectedIndex")]
    #[validate(range(min = 0, message = "selected_index must be non-negative"))]
    pub(crate) selected_index: i32,
    #[serde(default)]
    #[serde(alias = "timeElapsed")]
    #[validate(range(min = 0, message = "time_elapsed must be non-negative"))]
    pub(crate) time_elapsed: i32,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub(crate) struct AnswerEntry {
    #[serde(alias = "questionId")]
    #[validate(length(min = 1, message = "question_id must not be empty"))]
    pub(crate) question_id: String,
    #[serde(alias = "selectedIndex")]
    #[validate(range(min = 0, message = "selected_index must be non-negative"))]
    pub(crate) selected_index: i32,
    #[serde(default)]
    #[serde(alias = "timeElapsed")]
    #[validate(range(min = 0, message = "time_elapsed must be non-negative"))]
    pub(crate) time_elapsed: i32,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct BulkSaveRequest {
    #[validate(length(min = 1, message = "answers must not be empty"), nested)]
    pub(crate) answers: Vec<AnswerEntry>,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct SubmitRequest {
    #[serde(default)]
    #[serde(alias = "finalTimeElapsed")]
    #[validate(range(min = 0, message = "final_time_elapsed must be non-negative"))]
    pub(crate) final_time_elapsed: i32,
}

#[derive(Debug, Serialize)]
pub(crate) struct SubmitResponse {
    pub(crate) attempt_id: String,
    pub(crate) status: AttemptStatus,
    pub(crate) score: i32,
    pub(crate) total_questions: i32,
}

#[derive(Debug, Serialize)]
pub(crate) struct ResultDetail {
    pub(crate) question_id: String,
    pub(crate) text: String,
    pub(crate) choices: Vec<String>,
    pub(crate) selected_index: Option<i32>,
    pub(crate) correct_index: i32,
    pub(crate) is_correct: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct ResultResponse {
    pub(crate) attempt_id: String,
    pub(crate) exam_title: String,
    pub(crate) status: AttemptStatus,
    pub(crate) score: i32,
    pub(crate) total_questions: i32,
    pub(crate) time_elapsed: i32,
    pub(crate) ended_at: Option<String>,
    pub(crate) details: Vec<ResultDetail>,
}
