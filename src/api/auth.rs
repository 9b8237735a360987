use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::{BearerClaims, CurrentUser};
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::repositories;
use crate::schemas::auth::{ChangePasswordRequest, UserResponse};
use crate::schemas::MessageResponse;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/sync", post(sync))
        .route("/me", get(me))
        .route("/change-password-admin", post(change_password_admin))
}

/// Mirror the verified token identity into the local users table. Called by
/// the frontend right after login; idempotent.
async fn sync(
    State(state): State<AppState>,
    BearerClaims(claims): BearerClaims,
) -> Result<Json<UserResponse>, ApiError> {
    let email = claims.email.trim().to_lowercase();
    let domain = &state.settings().idp().admin_email_domain;
    let is_admin = email.ends_with(&format!("@{domain}"));

    let user = repositories::users::upsert(
        state.db(),
        repositories::users::UpsertUser {
            id: &claims.sub,
            email: &email,
            name: claims.name.as_deref(),
            is_admin,
            created_at: primitive_now_utc(),
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to sync user"))?;

    Ok(Json(user.into()))
}

async fn me(CurrentUser(user): CurrentUser) -> Json<UserResponse> {
    Json(user.into())
}

/// Replace the provisioning-time temporary password with a permanent one.
/// The account email comes from the verified token, and the current password
/// is re-checked against the directory.
async fn change_password_admin(
    State(state): State<AppState>,
    BearerClaims(claims): BearerClaims,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let email = claims.email.trim().to_lowercase();

    let valid = state
        .identity()
        .verify_credentials(&email, &payload.current_password)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to verify credentials"))?;

    if !valid {
        return Err(ApiError::Unauthorized("Invalid credentials"));
    }

    state
        .identity()
        .set_password(&email, &payload.new_password, true)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to change password"))?;

    Ok(Json(MessageResponse { message: "Password changed".to_string() }))
}
