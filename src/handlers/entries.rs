use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use chrono::Utc;
use uuid::Uuid;

use crate::auth::middleware::AuthUser;
use crate::dto::{validate, ConversationRequest, DeleteResponse, EntryListQuery, EntryListResponse};
use crate::error::{AppError, AppResult};
use crate::handlers::current_user;
use crate::services::compose::{compose, flatten, EntryView};
use crate::services::context::resolve_timezone;
use crate::services::conversation::{self, ConversationReply};
use crate::services::submission::{self, QuickEntry};
use crate::AppState;

const DEFAULT_PAGE_SIZE: i64 = 20;
const EXPORT_BATCH: i64 = 100;

pub async fn create_entry(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(body): Json<QuickEntry>,
) -> AppResult<(StatusCode, Json<EntryView>)> {
    let user = current_user(&state, &auth_user).await?;
    let record = submission::submit_quick(state.store.as_ref(), &user, body, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(compose(&record))))
}

pub async fn list_entries(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Query(query): Query<EntryListQuery>,
) -> AppResult<Json<EntryListResponse>> {
    validate(&query)?;
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE);
    let offset = query.offset.unwrap_or(0);

    let records = state
        .store
        .list_entries(auth_user.id, limit, offset)
        .await?;

    Ok(Json(EntryListResponse {
        entries: records.iter().map(compose).collect(),
        limit,
        offset,
    }))
}

pub async fn get_entry(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<EntryView>> {
    let record = state
        .store
        .find_entry(auth_user.id, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Entry not found".into()))?;
    Ok(Json(compose(&record)))
}

pub async fn delete_entry(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<DeleteResponse>> {
    if !state.store.delete_entry(auth_user.id, id).await? {
        return Err(AppError::NotFound("Entry not found".into()));
    }
    tracing::info!(user_id = %auth_user.id, entry_id = %id, "Entry deleted");
    Ok(Json(DeleteResponse {
        deleted: true,
        id: id.to_string(),
    }))
}

/// All of the user's entries as plain-text blocks, newest first.
pub async fn export_entries(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> AppResult<impl IntoResponse> {
    let user = current_user(&state, &auth_user).await?;
    let tz = resolve_timezone(&user.timezone).into_value();

    let mut blocks = Vec::new();
    let mut offset = 0;
    loop {
        let batch = state
            .store
            .list_entries(user.id, EXPORT_BATCH, offset)
            .await?;
        let done = (batch.len() as i64) < EXPORT_BATCH;
        blocks.extend(batch.iter().map(|r| flatten(&compose(r), tz)));
        if done {
            break;
        }
        offset += EXPORT_BATCH;
    }

    tracing::info!(user_id = %user.id, entries = blocks.len(), "Entries exported");
    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        blocks.join("\n\n"),
    ))
}

pub async fn converse(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(body): Json<ConversationRequest>,
) -> AppResult<Json<ConversationReply>> {
    let user = current_user(&state, &auth_user).await?;
    let reply = conversation::reply(
        state.store.as_ref(),
        &state.config,
        &user,
        id,
        &body.message,
    )
    .await?;
    Ok(Json(reply))
}
