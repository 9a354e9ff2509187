use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};

use crate::auth::middleware::AuthUser;
use crate::dto::{DeleteResponse, TagPath};
use crate::error::AppResult;
use crate::models::entry::{NewTag, Tag};
use crate::services::tags;
use crate::AppState;

pub async fn list_tags(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> AppResult<Json<Vec<Tag>>> {
    Ok(Json(tags::list(state.store.as_ref(), auth_user.id).await?))
}

pub async fn create_tag(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(body): Json<NewTag>,
) -> AppResult<(StatusCode, Json<Tag>)> {
    let tag = tags::create(state.store.as_ref(), auth_user.id, body).await?;
    Ok((StatusCode::CREATED, Json(tag)))
}

pub async fn delete_tag(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(path): Path<TagPath>,
) -> AppResult<Json<DeleteResponse>> {
    tags::delete(state.store.as_ref(), auth_user.id, path.id).await?;
    Ok(Json(DeleteResponse {
        deleted: true,
        id: path.id.to_string(),
    }))
}
