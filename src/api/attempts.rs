use std::collections::HashMap;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use sqlx::types::Json as SqlJson;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentUser;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::models::{Attempt, Question, User};
use crate::db::types::AttemptStatus;
use crate::repositories;
use crate::schemas::attempt::{
    AttemptResponse, BulkSaveRequest, QuestionPublic, ResultDetail, ResultResponse,
    SaveAnswerRequest, SubmitRequest, SubmitResponse,
};
use crate::schemas::exam::ExamSummary;
use crate::services::scoring;

const PG_UNIQUE_VIOLATION: &str = "23505";

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/resume", get(resume_attempt))
        .route("/:id/start", post(start_attempt))
        .route("/:id", get(get_attempt))
        .route("/:id/save-answer", post(save_answer))
        .route("/:id/bulk-save", post(bulk_save))
        .route("/:id/submit", post(submit_attempt))
        .route("/:id/result", get(attempt_result))
}

pub(crate) async fn list_exams(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<ExamSummary>>, ApiError> {
    let exams = repositories::exams::list_assigned_active(state.db(), &user.email)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list assigned exams"))?;

    Ok(Json(exams.into_iter().map(ExamSummary::from).collect()))
}

/// Start an attempt, or return the live one if the candidate already has it.
/// The one-in-progress rule is enforced twice: a pre-check for the common
/// case and the partial unique index for the concurrent one.
async fn start_attempt(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(exam_id): Path<String>,
) -> Result<Json<AttemptResponse>, ApiError> {
    // Idempotent start: whatever attempt is live for this candidate is the
    // one they get back, whichever exam it belongs to. Checked before the
    // exam itself, so deactivating an exam never strands an attempt already
    // underway.
    if let Some(existing) = repositories::attempts::find_in_progress_by_user(state.db(), &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to check active attempts"))?
    {
        let existing = expire_if_needed(&state, existing).await?;
        if existing.status == AttemptStatus::InProgress {
            return attempt_response(&state, existing).await.map(Json);
        }
    }

    let exam = repositories::exams::find_by_id(state.db(), &exam_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load exam"))?
        .filter(|exam| exam.is_active)
        .ok_or_else(|| ApiError::NotFound("Exam not found".to_string()))?;

    let assignment =
        repositories::assignments::find_by_exam_and_email(state.db(), &exam_id, &user.email)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to load assignment"))?;

    if assignment.is_none() {
        return Err(ApiError::Forbidden("This exam is not assigned to you"));
    }

    let questions = repositories::questions::list_by_exam(state.db(), &exam_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load exam questions"))?;

    if questions.is_empty() {
        return Err(ApiError::BadRequest("Exam has no questions".to_string()));
    }

    let question_ids: Vec<String> = questions.iter().map(|q| q.id.clone()).collect();

    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to start attempt transaction"))?;

    let attempt_id = uuid::Uuid::new_v4().to_string();
    let created = repositories::attempts::create(
        &mut *tx,
        repositories::attempts::CreateAttempt {
            id: &attempt_id,
            user_id: &user.id,
            exam_id: &exam_id,
            question_ids: SqlJson(&question_ids),
            started_at: primitive_now_utc(),
            time_allowed_secs: exam.time_allowed_secs,
        },
    )
    .await;

    let attempt = match created {
        Ok(attempt) => {
            repositories::assignments::mark_started(&mut *tx, &exam_id, &user.email)
                .await
                .map_err(|e| ApiError::internal(e, "Failed to mark assignment started"))?;
            tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit attempt"))?;
            attempt
        }
        // Lost the race against a concurrent start; hand back the winner.
        Err(err) if is_unique_violation(&err) => {
            drop(tx);
            repositories::attempts::find_in_progress_by_user(state.db(), &user.id)
                .await
                .map_err(|e| ApiError::internal(e, "Failed to load concurrent attempt"))?
                .ok_or_else(|| {
                    ApiError::Conflict("An attempt is already in progress".to_string())
                })?
        }
        Err(err) => return Err(ApiError::internal(err, "Failed to create attempt")),
    };

    tracing::info!(attempt_id = %attempt.id, exam_id = %exam_id, "Attempt started");

    attempt_response(&state, attempt).await.map(Json)
}

async fn resume_attempt(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<AttemptResponse>, ApiError> {
    let attempt = repositories::attempts::find_in_progress_by_user(state.db(), &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load active attempt"))?
        .ok_or_else(|| ApiError::NotFound("No active exam".to_string()))?;

    let attempt = expire_if_needed(&state, attempt).await?;
    if attempt.status != AttemptStatus::InProgress {
        return Err(ApiError::NotFound("No active exam".to_string()));
    }

    attempt_response(&state, attempt).await.map(Json)
}

async fn get_attempt(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(attempt_id): Path<String>,
) -> Result<Json<AttemptResponse>, ApiError> {
    let attempt = load_owned_attempt(&state, &user, &attempt_id).await?;
    let attempt = expire_if_needed(&state, attempt).await?;

    attempt_response(&state, attempt).await.map(Json)
}

async fn save_answer(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(attempt_id): Path<String>,
    Json(payload): Json<SaveAnswerRequest>,
) -> Result<Json<AttemptResponse>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let attempt = load_owned_attempt(&state, &user, &attempt_id).await?;
    let mut attempt = expire_if_needed(&state, attempt).await?;
    require_in_progress(&attempt)?;

    let questions = attempt_questions(&state, &attempt).await?;
    validate_answer(&attempt, &questions, &payload.question_id, payload.selected_index)?;

    attempt.answers.0.insert(payload.question_id.clone(), payload.selected_index);
    attempt.time_elapsed = payload.time_elapsed;

    repositories::attempts::save_answers(
        state.db(),
        &attempt.id,
        SqlJson(&attempt.answers.0),
        attempt.time_elapsed,
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to save answer"))?;

    let title = exam_title(&state, &attempt.exam_id).await?;
    Ok(Json(AttemptResponse::new(
        attempt,
        title,
        questions.into_iter().map(QuestionPublic::from).collect(),
    )))
}

/// Validate every entry before writing anything; a bad entry rejects the
/// whole batch.
async fn bulk_save(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(attempt_id): Path<String>,
    Json(payload): Json<BulkSaveRequest>,
) -> Result<Json<AttemptResponse>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let attempt = load_owned_attempt(&state, &user, &attempt_id).await?;
    let mut attempt = expire_if_needed(&state, attempt).await?;
    require_in_progress(&attempt)?;

    let questions = attempt_questions(&state, &attempt).await?;
    for entry in &payload.answers {
        validate_answer(&attempt, &questions, &entry.question_id, entry.selected_index)?;
    }

    for entry in &payload.answers {
        attempt.answers.0.insert(entry.question_id.clone(), entry.selected_index);
        // Last entry's clock wins.
        attempt.time_elapsed = entry.time_elapsed;
    }

    repositories::attempts::save_answers(
        state.db(),
        &attempt.id,
        SqlJson(&attempt.answers.0),
        attempt.time_elapsed,
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to save answers"))?;

    let title = exam_title(&state, &attempt.exam_id).await?;
    Ok(Json(AttemptResponse::new(
        attempt,
        title,
        questions.into_iter().map(QuestionPublic::from).collect(),
    )))
}

async fn submit_attempt(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(attempt_id): Path<String>,
    Json(payload): Json<SubmitRequest>,
) -> Result<Json<SubmitResponse>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let attempt = load_owned_attempt(&state, &user, &attempt_id).await?;
    let attempt = expire_if_needed(&state, attempt).await?;

    if attempt.status != AttemptStatus::InProgress {
        return Err(ApiError::Conflict("Attempt is already finished".to_string()));
    }

    let keys = repositories::questions::answer_keys(state.db(), &attempt.question_ids.0)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load answer keys"))?;

    let score = scoring::score_attempt(&attempt.question_ids.0, &attempt.answers.0, &keys);

    let finished = repositories::attempts::finish(
        state.db(),
        &attempt.id,
        repositories::attempts::FinishAttempt {
            status: AttemptStatus::Completed,
            ended_at: primitive_now_utc(),
            score,
            time_elapsed: payload.final_time_elapsed,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to finish attempt"))?;

    tracing::info!(attempt_id = %finished.id, score, "Attempt submitted");
    metrics::counter!("attempts_submitted_total").increment(1);

    Ok(Json(SubmitResponse {
        attempt_id: finished.id,
        status: finished.status,
        score: finished.score,
        total_questions: finished.question_ids.0.len() as i32,
    }))
}

async fn attempt_result(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(attempt_id): Path<String>,
) -> Result<Json<ResultResponse>, ApiError> {
    let attempt = load_owned_attempt(&state, &user, &attempt_id).await?;
    let attempt = expire_if_needed(&state, attempt).await?;

    if !attempt.status.is_terminal() {
        return Err(ApiError::Conflict("Attempt is not finished yet".to_string()));
    }

    let questions = attempt_questions(&state, &attempt).await?;
    let title = exam_title(&state, &attempt.exam_id).await?;

    let details = questions
        .into_iter()
        .map(|question| {
            let selected = attempt.answers.0.get(&question.id).copied();
            let is_correct = selected == Some(question.answer_index);
            ResultDetail {
                question_id: question.id,
                text: question.text,
                choices: question.choices.0,
                selected_index: selected,
                correct_index: question.answer_index,
                is_correct,
            }
        })
        .collect();

    Ok(Json(ResultResponse {
        attempt_id: attempt.id,
        exam_title: title,
        status: attempt.status,
        score: attempt.score,
        total_questions: attempt.question_ids.0.len() as i32,
        time_elapsed: attempt.time_elapsed,
        ended_at: attempt.ended_at.map(crate::core::time::format_primitive),
        details,
    }))
}

/// Expire a live attempt whose wall-clock allowance has run out. Runs on
/// every read path instead of a background sweep; the stored score reflects
/// whatever answers were saved before the deadline.
async fn expire_if_needed(state: &AppState, attempt: Attempt) -> Result<Attempt, ApiError> {
    if attempt.status != AttemptStatus::InProgress {
        return Ok(attempt);
    }

    let now = primitive_now_utc();
    let deadline = attempt.started_at + time::Duration::seconds(attempt.time_allowed_secs as i64);
    if now < deadline {
        return Ok(attempt);
    }

    let keys = repositories::questions::answer_keys(state.db(), &attempt.question_ids.0)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load answer keys"))?;
    let score = scoring::score_attempt(&attempt.question_ids.0, &attempt.answers.0, &keys);

    let finished = repositories::attempts::finish(
        state.db(),
        &attempt.id,
        repositories::attempts::FinishAttempt {
            status: AttemptStatus::TimedOut,
            ended_at: now,
            score,
            time_elapsed: attempt.time_allowed_secs,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to expire attempt"))?;

    tracing::info!(attempt_id = %finished.id, "Attempt timed out");

    Ok(finished)
}

async fn load_owned_attempt(
    state: &AppState,
    user: &User,
    attempt_id: &str,
) -> Result<Attempt, ApiError> {
    let attempt = repositories::attempts::find_by_id(state.db(), attempt_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load attempt"))?
        .ok_or_else(|| ApiError::NotFound("Attempt not found".to_string()))?;

    // Existence of other users' attempts is not disclosed.
    if attempt.user_id != user.id {
        return Err(ApiError::NotFound("Attempt not found".to_string()));
    }

    Ok(attempt)
}

fn require_in_progress(attempt: &Attempt) -> Result<(), ApiError> {
    if attempt.status == AttemptStatus::InProgress {
        Ok(())
    } else {
        Err(ApiError::Conflict("Attempt is no longer active".to_string()))
    }
}

/// Load the attempt's questions in the order frozen at start time.
async fn attempt_questions(
    state: &AppState,
    attempt: &Attempt,
) -> Result<Vec<Question>, ApiError> {
    let fetched = repositories::questions::list_by_ids(state.db(), &attempt.question_ids.0)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load attempt questions"))?;

    let mut by_id: HashMap<String, Question> =
        fetched.into_iter().map(|question| (question.id.clone(), question)).collect();

    Ok(attempt.question_ids.0.iter().filter_map(|id| by_id.remove(id)).collect())
}

fn validate_answer(
    attempt: &Attempt,
    questions: &[Question],
    question_id: &str,
    selected_index: i32,
) -> Result<(), ApiError> {
    if !attempt.question_ids.0.iter().any(|id| id == question_id) {
        return Err(ApiError::BadRequest(format!(
            "Question {question_id} does not belong to this attempt"
        )));
    }

    let question = questions
        .iter()
        .find(|question| question.id == question_id)
        .ok_or_else(|| ApiError::internal("question row missing", "Failed to load question"))?;

    let choice_count = question.choices.0.len() as i32;
    if selected_index < 0 || selected_index >= choice_count {
        return Err(ApiError::BadRequest(format!(
            "selected_index {selected_index} is out of range for question {question_id}"
        )));
    }

    Ok(())
}

async fn attempt_response(state: &AppState, attempt: Attempt) -> Result<AttemptResponse, ApiError> {
    let questions = attempt_questions(state, &attempt).await?;
    let title = exam_title(state, &attempt.exam_id).await?;

    Ok(AttemptResponse::new(
        attempt,
        title,
        questions.into_iter().map(QuestionPublic::from).collect(),
    ))
}

async fn exam_title(state: &AppState, exam_id: &str) -> Result<String, ApiError> {
    let exam = repositories::exams::find_by_id(state.db(), exam_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load exam"))?
        .ok_or_else(|| ApiError::NotFound("Exam not found".to_string()))?;

    Ok(exam.title)
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|db_err| db_err.code())
        .map(|code| code == PG_UNIQUE_VIOLATION)
        .unwrap_or(false)
}
