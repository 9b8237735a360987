use std::collections::HashSet;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use sqlx::types::Json as SqlJson;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentAdmin;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::types::Difficulty;
use crate::repositories;
use crate::repositories::attempts::CandidateResultRow;
use crate::schemas::exam::{
    AssignRequest, AssignResponse, AssignmentRow, ExamCreate, ExamResponse,
};
use crate::services::identity::ProvisionOutcome;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/exams", post(create_exam).get(list_exams))
        .route("/exams/:exam_id/toggle", patch(toggle_exam))
        .route("/exams/:exam_id/assign", post(assign_exam))
        .route("/exams/:exam_id/assignments", get(list_assignments))
        .route("/candidates/results", get(candidate_results))
}

/// Generate the question set for a new exam and persist exam plus questions
/// in one transaction. Generation failure leaves nothing behind.
async fn create_exam(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    Json(payload): Json<ExamCreate>,
) -> Result<(StatusCode, Json<ExamResponse>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let candidates = state
        .generator()
        .generate(state.question_source(), payload.question_count as usize, &payload.language)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Exam question generation failed");
            ApiError::Internal(e.to_string())
        })?;

    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to start exam transaction"))?;

    let exam_id = uuid::Uuid::new_v4().to_string();
    let now = primitive_now_utc();

    let exam = repositories::exams::create(
        &mut *tx,
        repositories::exams::CreateExam {
            id: &exam_id,
            title: &payload.title,
            language: &payload.language,
            question_count: payload.question_count,
            time_allowed_secs: payload.time_allowed_secs,
            created_by: &admin.id,
            created_at: now,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create exam"))?;

    for candidate in &candidates {
        let question_id = uuid::Uuid::new_v4().to_string();
        repositories::questions::create(
            &mut *tx,
            repositories::questions::CreateQuestion {
                id: &question_id,
                exam_id: &exam_id,
                text: &candidate.question,
                choices: SqlJson(&candidate.options),
                answer_index: candidate.answer_index as i32,
                difficulty: Difficulty::Easy,
            },
        )
        .await
        .map_err(|e| ApiError::internal(e, "Failed to store exam question"))?;
    }

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit exam"))?;

    tracing::info!(exam_id = %exam_id, questions = candidates.len(), "Created exam");
    metrics::counter!("exams_created_total").increment(1);

    Ok((StatusCode::CREATED, Json(exam.into())))
}

async fn list_exams(
    State(state): State<AppState>,
    CurrentAdmin(_admin): CurrentAdmin,
) -> Result<Json<Vec<ExamResponse>>, ApiError> {
    let exams = repositories::exams::list_all(state.db())
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list exams"))?;

    Ok(Json(exams.into_iter().map(ExamResponse::from).collect()))
}

async fn toggle_exam(
    State(state): State<AppState>,
    CurrentAdmin(_admin): CurrentAdmin,
    Path(exam_id): Path<String>,
) -> Result<Json<ExamResponse>, ApiError> {
    let exam = repositories::exams::find_by_id(state.db(), &exam_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load exam"))?
        .ok_or_else(|| ApiError::NotFound("Exam not found".to_string()))?;

    let updated = repositories::exams::set_active(state.db(), &exam_id, !exam.is_active)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to toggle exam"))?
        .ok_or_else(|| ApiError::NotFound("Exam not found".to_string()))?;

    Ok(Json(updated.into()))
}

/// Assign an exam to a list of candidate emails. Unknown candidates are
/// provisioned in the external directory first; the assignment rows
/// themselves commit in one transaction. Notification emails go out after
/// commit and never fail the request.
async fn assign_exam(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    Path(exam_id): Path<String>,
    Json(payload): Json<AssignRequest>,
) -> Result<Json<AssignResponse>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let exam = repositories::exams::find_by_id(state.db(), &exam_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load exam"))?
        .ok_or_else(|| ApiError::NotFound("Exam not found".to_string()))?;

    let mut emails = Vec::new();
    let mut seen = HashSet::new();
    for raw in &payload.emails {
        let email = raw.trim().to_lowercase();
        if email.is_empty() || !email.contains('@') {
            return Err(ApiError::BadRequest(format!("Invalid email: {raw}")));
        }
        if seen.insert(email.clone()) {
            emails.push(email);
        }
    }

    let mut created_users = 0usize;
    let mut send_password = HashSet::new();

    for email in &emails {
        // Candidates with a local profile were provisioned on an earlier
        // assignment or signed in themselves; the directory is not consulted
        // again for them.
        let known = repositories::users::find_by_email(state.db(), email)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to look up candidate"))?;
        if known.is_some() {
            continue;
        }

        let outcome = state
            .identity()
            .create_identity(email)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to provision candidate identity"))?;

        if outcome == ProvisionOutcome::Created {
            state
                .identity()
                .set_default_password(email)
                .await
                .map_err(|e| ApiError::internal(e, "Failed to set candidate password"))?;
            created_users += 1;
            send_password.insert(email.clone());
        }
    }

    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to start assignment transaction"))?;

    let now = primitive_now_utc();
    let mut assigned = Vec::new();
    let mut skipped_count = 0usize;

    for email in &emails {
        // Local profile mirror so results can join on the user row even
        // before the candidate first logs in.
        repositories::users::upsert(
            &mut *tx,
            repositories::users::UpsertUser {
                id: email,
                email,
                name: None,
                is_admin: false,
                created_at: now,
            },
        )
        .await
        .map_err(|e| ApiError::internal(e, "Failed to mirror candidate user"))?;

        let exists = repositories::assignments::exists(&mut *tx, &exam_id, email)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to check assignment"))?;

        if exists {
            skipped_count += 1;
            continue;
        }

        let assignment_id = uuid::Uuid::new_v4().to_string();
        repositories::assignments::create(
            &mut *tx,
            repositories::assignments::CreateAssignment {
                id: &assignment_id,
                exam_id: &exam_id,
                candidate_email: email,
                assigned_by: &admin.id,
                assigned_at: now,
            },
        )
        .await
        .map_err(|e| ApiError::internal(e, "Failed to create assignment"))?;

        assigned.push(email.clone());
    }

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit assignments"))?;

    let mut emailed_count = 0usize;
    for email in &assigned {
        let with_password = send_password.contains(email);
        match state.mailer().send_assignment_email(email, &exam.title, with_password).await {
            Ok(()) => emailed_count += 1,
            Err(err) => {
                tracing::warn!(candidate = %email, error = %err, "Assignment email failed");
            }
        }
    }

    tracing::info!(
        exam_id = %exam_id,
        assigned = assigned.len(),
        skipped = skipped_count,
        created_users,
        "Assigned exam"
    );

    Ok(Json(AssignResponse {
        assigned_count: assigned.len(),
        skipped_count,
        created_users,
        emailed_count,
    }))
}

async fn list_assignments(
    State(state): State<AppState>,
    CurrentAdmin(_admin): CurrentAdmin,
    Path(exam_id): Path<String>,
) -> Result<Json<Vec<AssignmentRow>>, ApiError> {
    let exam = repositories::exams::find_by_id(state.db(), &exam_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load exam"))?;

    if exam.is_none() {
        return Err(ApiError::NotFound("Exam not found".to_string()));
    }

    let assignments = repositories::assignments::list_by_exam(state.db(), &exam_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list assignments"))?;

    Ok(Json(assignments.into_iter().map(AssignmentRow::from).collect()))
}

async fn candidate_results(
    State(state): State<AppState>,
    CurrentAdmin(_admin): CurrentAdmin,
) -> Result<Json<Vec<CandidateResultRow>>, ApiError> {
    let rows = repositories::attempts::list_candidate_results(state.db())
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list candidate results"))?;

    Ok(Json(rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Settings;
    use crate::test_support;

    #[tokio::test]
    async fn assigning_the_same_email_twice_skips_the_duplicate() {
        let _guard = test_support::env_lock().await;
        test_support::set_test_env();
        let Some(pool) = test_support::test_db().await else { return };

        let settings = Settings::load().expect("settings");
        let state = test_support::build_state_with(settings, pool.clone());

        let admin = test_support::insert_user(&pool, "boss@nmkglobalinc.com", true).await;
        let exam = test_support::insert_exam(&pool, &admin.id).await;
        test_support::insert_user(&pool, "cand@example.com", false).await;

        let first = assign_exam(
            State(state.clone()),
            CurrentAdmin(admin.clone()),
            Path(exam.id.clone()),
            Json(AssignRequest { emails: vec!["cand@example.com".to_string()] }),
        )
        .await
        .expect("first assign");
        assert_eq!(first.0.assigned_count, 1);
        assert_eq!(first.0.skipped_count, 0);

        let second = assign_exam(
            State(state),
            CurrentAdmin(admin),
            Path(exam.id.clone()),
            Json(AssignRequest { emails: vec!["CAND@example.com ".to_string()] }),
        )
        .await
        .expect("second assign");
        assert_eq!(second.0.assigned_count, 0);
        assert_eq!(second.0.skipped_count, 1);

        let rows =
            repositories::assignments::list_by_exam(&pool, &exam.id).await.expect("assignments");
        assert_eq!(rows.len(), 1);
    }
}
