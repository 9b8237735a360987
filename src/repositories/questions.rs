use std::collections::HashMap;

use sqlx::types::Json;
use sqlx::PgPool;

use crate::db::models::Question;
use crate::db::types::Difficulty;

const COLUMNS: &str = "id, exam_id, text, choices, answer_index, difficulty";

pub(crate) async fn list_by_exam(
    pool: &PgPool,
    exam_id: &str,
) -> Result<Vec<Question>, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!(
        "SELECT {COLUMNS} FROM questions WHERE exam_id = $1 ORDER BY id",
    ))
    .bind(exam_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn list_by_ids(
    pool: &PgPool,
    ids: &[String],
) -> Result<Vec<Question>, sqlx::Error> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    sqlx::query_as::<_, Question>(&format!(
        "SELECT {COLUMNS} FROM questions WHERE id = ANY($1)",
    ))
    .bind(ids)
    .fetch_all(pool)
    .await
}

/// question id -> correct choice index, for scoring.
pub(crate) async fn answer_keys(
    pool: &PgPool,
    ids: &[String],
) -> Result<HashMap<String, i32>, sqlx::Error> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows = sqlx::query_as::<_, (String, i32)>(
        "SELECT id, answer_index FROM questions WHERE id = ANY($1)",
    )
    .bind(ids)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().collect())
}

pub(crate) struct CreateQuestion<'a> {
    pub id: &'a str,
    pub exam_id: &'a str,
    pub text: &'a str,
    pub choices: Json<&'a Vec<String>>,
    pub answer_index: i32,
    pub difficulty: Difficulty,
}

pub(crate) async fn create(
    executor: impl sqlx::PgExecutor<'_>,
    params: CreateQuestion<'_>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO questions (id, exam_id, text, choices, answer_index, difficulty)
         VALUES ($1,$2,$3,$4,$5,$6)",
    )
    .bind(params.id)
    .bind(params.exam_id)
    .bind(params.text)
    .bind(params.choices)
    .bind(params.answer_index)
    .bind(params.difficulty)
    .execute(executor)
    .await?;
    Ok(())
}
