use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};

use crate::auth::middleware::AuthUser;
use crate::dto::DeleteResponse;
use crate::error::AppResult;
use crate::models::template::{Template, TemplateDefinition, TemplateGroups};
use crate::services::templates;
use crate::AppState;

pub async fn list_templates(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> AppResult<Json<TemplateGroups>> {
    let groups = templates::list_templates(state.store.as_ref(), auth_user.id).await?;
    Ok(Json(groups))
}

pub async fn create_template(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(body): Json<TemplateDefinition>,
) -> AppResult<(StatusCode, Json<Template>)> {
    let template = templates::create(state.store.as_ref(), auth_user.id, body).await?;
    Ok((StatusCode::CREATED, Json(template)))
}

pub async fn update_template(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(body): Json<TemplateDefinition>,
) -> AppResult<Json<Template>> {
    let template = templates::update(state.store.as_ref(), id, auth_user.id, body).await?;
    Ok(Json(template))
}

pub async fn delete_template(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> AppResult<Json<DeleteResponse>> {
    templates::delete(state.store.as_ref(), id, auth_user.id).await?;
    Ok(Json(DeleteResponse {
        deleted: true,
        id: id.to_string(),
    }))
}
