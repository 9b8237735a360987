use serde::{Deserialize, Serialize};
use validator::Validate;

pub(crate) use crate::core::time::format_primitive;
use crate::db::models::{Assignment, Exam};
use crate::db::types::AssignmentStatus;

fn default_language() -> String {
    "english".to_string()
}

fn default_time_allowed_secs() -> i32 {
    1800
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ExamCreate {
    #[validate(length(min = 1, message = "title must not be empty"))]
    pub(crate) title: String,
    #[serde(default = "default_language")]
    #[validate(length(min = 1, message = "language must not be empty"))]
    pub(crate) language: String,
    #[serde(alias = "questionCount")]
    #[validate(range(min = 1, max = 200, message = "question_count must be between 1 and 200"))]
    pub(crate) question_count: i32,
    #[serde(default = "default_time_allowed_secs")]
    #[serde(alias = "timeAllowedSecs")]
    #[validate(range(min = 60, message = "time_allowed_secs must be at least 60"))]
    pub(crate) time_allowed_secs: i32,
}

#[derive(Debug, Serialize)]
pub(crate) struct ExamResponse {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) language: String,
    pub(crate) question_count: i32,
    pub(crate) time_allowed_secs: i32,
    pub(crate) is_active: bool,
    pub(crate) created_at: String,
}

impl From<Exam> for ExamResponse {
    fn from(exam: Exam) -> Self {
        Self {
            id: exam.id,
            title: exam.title,
            language: exam.language,
            question_count: exam.question_count,
            time_allowed_secs: exam.time_allowed_secs,
            is_active: exam.is_active,
            created_at: format_primitive(exam.created_at),
        }
    }
}

/// Candidate-facing listing entry; no authorship or activation details.
#[derive(Debug, Serialize)]
pub(crate) struct ExamSummary {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) language: String,
    pub(crate) question_count: i32,
    pub(crate) time_allowed_secs: i32,
}

impl From<Exam> for ExamSummary {
    fn from(exam: Exam) -> Self {
        Self {
            id: exam.id,
            title: exam.title,
            language: exam.language,
            question_count: exam.question_count,
            time_allowed_secs: exam.time_allowed_secs,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct AssignRequest {
    #[validate(length(min = 1, message = "emails must not be empty"))]
    pub(crate) emails: Vec<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct AssignResponse {
    pub(crate) assigned_count: usize,
    pub(crate) skipped_count: usize,
    pub(crate) created_users: usize,
    pub(crate) emailed_count: usize,
}

#[derive(Debug, Serialize)]
pub(crate) struct AssignmentRow {
    pub(crate) candidate_email: String,
    pub(crate) status: AssignmentStatus,
    pub(crate) assigned_at: String,
}

impl From<Assignment> for AssignmentRow {
    fn from(assignment: Assignment) -> Self {
        Self {
            candidate_email: assignment.candidate_email,
            status: assignment.status,
            assigned_at: format_primitive(assignment.assigned_at),
        }
    }
}
