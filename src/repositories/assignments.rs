use sqlx::PgPool;

use crate::db::models::Assignment;
use crate::db::types::AssignmentStatus;

const COLUMNS: &str = "id, exam_id, candidate_email, assigned_by, assigned_at, status";

pub(crate) async fn find_by_exam_and_email(
    pool: &PgPool,
    exam_id: &str,
    candidate_email: &str,
) -> Result<Option<Assignment>, sqlx::Error> {
    sqlx::query_as::<_, Assignment>(&format!(
        "SELECT {COLUMNS} FROM assignments WHERE exam_id = $1 AND candidate_email = $2",
    ))
    .bind(exam_id)
    .bind(candidate_email)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn exists(
    executor: impl sqlx::PgExecutor<'_>,
    exam_id: &str,
    candidate_email: &str,
) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM assignments WHERE exam_id = $1 AND candidate_email = $2)",
    )
    .bind(exam_id)
    .bind(candidate_email)
    .fetch_one(executor)
    .await
}

pub(crate) async fn list_by_exam(
    pool: &PgPool,
    exam_id: &str,
) -> Result<Vec<Assignment>, sqlx::Error> {
    sqlx::query_as::<_, Assignment>(&format!(
        "SELECT {COLUMNS} FROM assignments WHERE exam_id = $1 ORDER BY assigned_at DESC",
    ))
    .bind(exam_id)
    .fetch_all(pool)
    .await
}

pub(crate) struct CreateAssignment<'a> {
    pub id: &'a str,
    pub exam_id: &'a str,
    pub candidate_email: &'a str,
    pub assigned_by: &'a str,
    pub assigned_at: time::PrimitiveDateTime,
}

pub(crate) async fn create(
    executor: impl sqlx::PgExecutor<'_>,
    params: CreateAssignment<'_>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO assignments (id, exam_id, candidate_email, assigned_by, assigned_at, status)
         VALUES ($1,$2,$3,$4,$5,$6)",
    )
    .bind(params.id)
    .bind(params.exam_id)
    .bind(params.candidate_email)
    .bind(params.assigned_by)
    .bind(params.assigned_at)
    .bind(AssignmentStatus::Assigned)
    .execute(executor)
    .await?;
    Ok(())
}

pub(crate) async fn mark_started(
    executor: impl sqlx::PgExecutor<'_>,
    exam_id: &str,
    candidate_email: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE assignments SET status = $1 WHERE exam_id = $2 AND candidate_email = $3",
    )
    .bind(AssignmentStatus::Started)
    .bind(exam_id)
    .bind(candidate_email)
    .execute(executor)
    .await?;
    Ok(())
}
