pub mod auth;
pub mod entries;
pub mod exercise;
pub mod guided;
pub mod health;
pub mod tags;
pub mod templates;

use crate::auth::middleware::AuthUser;
use crate::error::{AppError, AppResult};
use crate::models::user::User;
use crate::AppState;

/// Load the authenticated user's row. A valid token for a deleted user is unauthorized.
pub(crate) async fn current_user(state: &AppState, auth_user: &AuthUser) -> AppResult<User> {
    state
        .store
        .find_user(auth_user.id)
        .await?
        .ok_or(AppError::Unauthorized)
}
