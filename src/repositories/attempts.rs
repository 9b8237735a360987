use std::collections::HashMap;

use sqlx::types::Json;
use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::Attempt;
use crate::db::types::AttemptStatus;

pub(crate) const COLUMNS: &str = "\
    id, user_id, exam_id, question_ids, answers, started_at, ended_at, \
    status, time_allowed_secs, time_elapsed, score";

/// Flattened row for the admin results report.
#[derive(Debug, sqlx::FromRow, serde::Serialize)]
pub(crate) struct CandidateResultRow {
    pub(crate) attempt_id: String,
    pub(crate) candidate_email: String,
    pub(crate) candidate_name: Option<String>,
    pub(crate) exam_id: String,
    pub(crate) exam_title: String,
    pub(crate) status: AttemptStatus,
    pub(crate) score: i32,
    pub(crate) total_questions: i32,
    pub(crate) started_at: PrimitiveDateTime,
    pub(crate) ended_at: Option<PrimitiveDateTime>,
    pub(crate) time_elapsed: i32,
}

pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Attempt>, sqlx::Error> {
    sqlx::query_as::<_, Attempt>(&format!("SELECT {COLUMNS} FROM attempts WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn find_in_progress_by_user(
    pool: &PgPool,
    user_id: &str,
) -> Result<Option<Attempt>, sqlx::Error> {
    sqlx::query_as::<_, Attempt>(&format!(
        "SELECT {COLUMNS} FROM attempts WHERE user_id = $1 AND status = $2",
    ))
    .bind(user_id)
    .bind(AttemptStatus::InProgress)
    .fetch_optional(pool)
    .await
}

pub(crate) struct CreateAttempt<'a> {
    pub id: &'a str,
    pub user_id: &'a str,
    pub exam_id: &'a str,
    pub question_ids: Json<&'a Vec<String>>,
    pub started_at: PrimitiveDateTime,
    pub time_allowed_secs: i32,
}

pub(crate) async fn create(
    executor: impl sqlx::PgExecutor<'_>,
    params: CreateAttempt<'_>,
) -> Result<Attempt, sqlx::Error> {
    sqlx::query_as::<_, Attempt>(&format!(
        "INSERT INTO attempts (
            id, user_id, exam_id, question_ids, answers, started_at,
            status, time_allowed_secs, time_elapsed, score
        ) VALUES ($1,$2,$3,$4,'{{}}',$5,$6,$7,0,0)
        RETURNING {COLUMNS}",
    ))
    .bind(params.id)
    .bind(params.user_id)
    .bind(params.exam_id)
    .bind(params.question_ids)
    .bind(params.started_at)
    .bind(AttemptStatus::InProgress)
    .bind(params.time_allowed_secs)
    .fetch_one(executor)
    .await
}

/// Replace the whole answers map and the elapsed clock in one statement.
pub(crate) async fn save_answers(
    pool: &PgPool,
    id: &str,
    answers: Json<&HashMap<String, i32>>,
    time_elapsed: i32,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE attempts SET answers = $1, time_elapsed = $2 WHERE id = $3")
        .bind(answers)
        .bind(time_elapsed)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub(crate) struct FinishAttempt {
    pub status: AttemptStatus,
    pub ended_at: PrimitiveDateTime,
    pub score: i32,
    pub time_elapsed: i32,
}

pub(crate) async fn finish(
    pool: &PgPool,
    id: &str,
    params: FinishAttempt,
) -> Result<Attempt, sqlx::Error> {
    sqlx::query_as::<_, Attempt>(&format!(
        "UPDATE attempts
         SET status = $1, ended_at = $2, score = $3, time_elapsed = $4
         WHERE id = $5
         RETURNING {COLUMNS}",
    ))
    .bind(params.status)
    .bind(params.ended_at)
    .bind(params.score)
    .bind(params.time_elapsed)
    .bind(id)
    .fetch_one(pool)
    .await
}

pub(crate) async fn list_candidate_results(
    pool: &PgPool,
) -> Result<Vec<CandidateResultRow>, sqlx::Error> {
    sqlx::query_as::<_, CandidateResultRow>(
        "SELECT a.id AS attempt_id,
                u.email AS candidate_email,
                u.name AS candidate_name,
                e.id AS exam_id,
                e.title AS exam_title,
                a.status,
                a.score,
                e.question_count AS total_questions,
                a.started_at,
                a.ended_at,
                a.time_elapsed
         FROM attempts a
         JOIN users u ON u.id = a.user_id
         JOIN exams e ON e.id = a.exam_id
         WHERE a.status IN ($1, $2)
         ORDER BY a.started_at DESC",
    )
    .bind(AttemptStatus::Completed)
    .bind(AttemptStatus::TimedOut)
    .fetch_all(pool)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::time::primitive_now_utc;
    use crate::test_support;

    #[tokio::test]
    async fn second_live_attempt_for_a_user_is_rejected() {
        let _guard = test_support::env_lock().await;
        let Some(pool) = test_support::test_db().await else { return };

        let admin = test_support::insert_user(&pool, "boss@nmkglobalinc.com", true).await;
        let exam = test_support::insert_exam(&pool, &admin.id).await;
        let user = test_support::insert_user(&pool, "cand@example.com", false).await;
        let question_ids = vec!["q1".to_string()];

        let first = create(
            &pool,
            CreateAttempt {
                id: "attempt-1",
                user_id: &user.id,
                exam_id: &exam.id,
                question_ids: Json(&question_ids),
                started_at: primitive_now_utc(),
                time_allowed_secs: 1800,
            },
        )
        .await
        .expect("first attempt");

        let err = create(
            &pool,
            CreateAttempt {
                id: "attempt-2",
                user_id: &user.id,
                exam_id: &exam.id,
                question_ids: Json(&question_ids),
                started_at: primitive_now_utc(),
                time_allowed_secs: 1800,
            },
        )
        .await
        .expect_err("second live attempt must hit the one-in-progress index");

        let code = err.as_database_error().and_then(|db_err| db_err.code()).map(String::from);
        assert_eq!(code.as_deref(), Some("23505"));

        let live = find_in_progress_by_user(&pool, &user.id)
            .await
            .expect("query live attempt")
            .expect("live attempt");
        assert_eq!(live.id, first.id);
    }
}
