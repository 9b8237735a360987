use sqlx::PgPool;

use crate::db::models::Exam;

pub(crate) const COLUMNS: &str = "\
    id, title, language, question_count, time_allowed_secs, created_by, \
    is_active, created_at";

pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Exam>, sqlx::Error> {
    sqlx::query_as::<_, Exam>(&format!("SELECT {COLUMNS} FROM exams WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn list_all(pool: &PgPool) -> Result<Vec<Exam>, sqlx::Error> {
    sqlx::query_as::<_, Exam>(&format!("SELECT {COLUMNS} FROM exams ORDER BY created_at DESC"))
        .fetch_all(pool)
        .await
}

/// Active exams assigned to a candidate, newest first.
pub(crate) async fn list_assigned_active(
    pool: &PgPool,
    candidate_email: &str,
) -> Result<Vec<Exam>, sqlx::Error> {
    sqlx::query_as::<_, Exam>(&format!(
        "SELECT {COLUMNS} FROM exams e
         WHERE e.is_active
           AND EXISTS (
               SELECT 1 FROM assignments a
               WHERE a.exam_id = e.id AND a.candidate_email = $1
           )
         ORDER BY e.created_at DESC",
    ))
    .bind(candidate_email)
    .fetch_all(pool)
    .await
}

pub(crate) async fn set_active(
    pool: &PgPool,
    id: &str,
    is_active: bool,
) -> Result<Option<Exam>, sqlx::Error> {
    sqlx::query_as::<_, Exam>(&format!(
        "UPDATE exams SET is_active = $1 WHERE id = $2 RETURNING {COLUMNS}",
    ))
    .bind(is_active)
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub(crate) struct CreateExam<'a> {
    pub id: &'a str,
    pub title: &'a str,
    pub language: &'a str,
    pub question_count: i32,
    pub time_allowed_secs: i32,
    pub created_by: &'a str,
    pub created_at: time::PrimitiveDateTime,
}

pub(crate) async fn create(
    executor: impl sqlx::PgExecutor<'_>,
    params: CreateExam<'_>,
) -> Result<Exam, sqlx::Error> {
    sqlx::query_as::<_, Exam>(&format!(
        "INSERT INTO exams (
            id, title, language, question_count, time_allowed_secs,
            created_by, is_active, created_at
        ) VALUES ($1,$2,$3,$4,$5,$6,TRUE,$7)
        RETURNING {COLUMNS}",
    ))
    .bind(params.id)
    .bind(params.title)
    .bind(params.language)
    .bind(params.question_count)
    .bind(params.time_allowed_secs)
    .bind(params.created_by)
    .bind(params.created_at)
    .fetch_one(executor)
    .await
}
