use axum::{extract::State, http::StatusCode, Extension, Json};
use serde::Serialize;

use crate::auth::{
    jwt::{create_access_token, AccessToken},
    middleware::AuthUser,
    password::{hash_password, verify_password},
};
use crate::dto::{validate, LoginRequest, RegisterRequest, UpdateProfileRequest};
use crate::error::{AppError, AppResult, ValidationError};
use crate::handlers::current_user;
use crate::models::user::UserProfile;
use crate::services::context::resolve_timezone;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    #[serde(flatten)]
    pub token: AccessToken,
    pub user: UserProfile,
}

/// Accept only timezones that parse; profile edits should not silently become UTC.
fn checked_timezone(raw: &str) -> AppResult<String> {
    let tz = resolve_timezone(raw);
    if tz.is_defaulted() {
        return Err(ValidationError::single("timezone", "Unknown timezone").into());
    }
    Ok(tz.into_value().name().to_string())
}

pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    validate(&body)?;
    let email = body.email.trim().to_lowercase();
    let timezone = match body.timezone.as_deref() {
        Some(tz) => checked_timezone(tz)?,
        None => "UTC".to_string(),
    };

    if state.store.find_user_by_email(&email).await?.is_some() {
        return Err(AppError::Conflict("Email already registered".into()));
    }

    let pwd_hash = hash_password(&body.password)?;
    let user = state
        .store
        .create_user(&email, &pwd_hash, body.name.trim(), &timezone)
        .await?;

    tracing::info!(user_id = %user.id, "User registered");

    let token = create_access_token(user.id, &user.email, &state.config)?;
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            user: user.into(),
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    validate(&body)?;
    let user = state
        .store
        .find_user_by_email(body.email.trim())
        .await?
        .ok_or(AppError::Unauthorized)?;

    if !verify_password(&body.password, &user.password_hash)? {
        tracing::debug!(user_id = %user.id, "Login rejected");
        return Err(AppError::Unauthorized);
    }

    let token = create_access_token(user.id, &user.email, &state.config)?;
    Ok(Json(AuthResponse {
        token,
        user: user.into(),
    }))
}

pub async fn me(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> AppResult<Json<UserProfile>> {
    let user = current_user(&state, &auth_user).await?;
    Ok(Json(user.into()))
}

pub async fn update_me(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(body): Json<UpdateProfileRequest>,
) -> AppResult<Json<UserProfile>> {
    validate(&body)?;
    let timezone = body.timezone.as_deref().map(checked_timezone).transpose()?;
    let name = body.name.as_deref().map(str::trim);

    let user = state
        .store
        .update_user(auth_user.id, name, timezone.as_deref())
        .await?;
    Ok(Json(user.into()))
}
