use axum::{extract::State, Extension, Json};
use chrono::Utc;

use crate::auth::middleware::AuthUser;
use crate::dto::ExerciseLogRequest;
use crate::error::AppResult;
use crate::handlers::current_user;
use crate::models::entry::ExerciseLog;
use crate::services::context::LocalDay;
use crate::AppState;

/// Record today's exercise answer, in the user's local calendar day.
pub async fn upsert_exercise_log(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(body): Json<ExerciseLogRequest>,
) -> AppResult<Json<ExerciseLog>> {
    let user = current_user(&state, &auth_user).await?;
    let day = LocalDay::for_user(&user, Utc::now());

    let log = state
        .store
        .upsert_exercise_log(user.id, day.date, body.has_exercised)
        .await?;
    tracing::debug!(user_id = %user.id, date = %day.date, has_exercised = log.has_exercised, "Exercise logged");
    Ok(Json(log))
}
