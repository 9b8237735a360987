use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use time::PrimitiveDateTime;

use crate::db::types::{AssignmentStatus, AttemptStatus, Difficulty};

/// Profile mirror of an identity-provider user. `id` is the provider
/// subject; admin status is derived once from the email domain at creation.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct User {
    pub(crate) id: String,
    pub(crate) email: String,
    pub(crate) name: Option<String>,
    pub(crate) is_admin: bool,
    pub(crate) created_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Exam {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) language: String,
    pub(crate) question_count: i32,
    pub(crate) time_allowed_secs: i32,
    pub(crate) created_by: String,
    pub(crate) is_active: bool,
    pub(crate) created_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Question {
    pub(crate) id: String,
    pub(crate) exam_id: Option<String>,
    pub(crate) text: String,
    pub(crate) choices: Json<Vec<String>>,
    pub(crate) answer_index: i32,
    pub(crate) difficulty: Difficulty,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Assignment {
    pub(crate) id: String,
    pub(crate) exam_id: String,
    pub(crate) candidate_email: String,
    pub(crate) assigned_by: String,
    pub(crate) assigned_at: PrimitiveDateTime,
    pub(crate) status: AssignmentStatus,
}

/// One candidate's run through an exam. `question_ids` is frozen at start;
/// `answers` is a sparse map of question id to selected choice index.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Attempt {
    pub(crate) id: String,
    pub(crate) user_id: String,
    pub(crate) exam_id: String,
    pub(crate) question_ids: Json<Vec<String>>,
    pub(crate) answers: Json<HashMap<String, i32>>,
    pub(crate) started_at: PrimitiveDateTime,
    pub(crate) ended_at: Option<PrimitiveDateTime>,
    pub(crate) status: AttemptStatus,
    pub(crate) time_allowed_secs: i32,
    pub(crate) time_elapsed: i32,
    pub(crate) score: i32,
}
