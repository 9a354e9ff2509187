use axum::{
    extract::{Query, State},
    http::StatusCode,
    Extension, Form, Json,
};
use chrono::Utc;

use crate::auth::middleware::AuthUser;
use crate::dto::{GuidedFormResponse, GuidedQuery, QuestionField};
use crate::error::AppResult;
use crate::handlers::current_user;
use crate::services::compose::{compose, EntryView};
use crate::services::submission::{self, FormFields};
use crate::services::{context, renderer, templates};
use crate::AppState;

pub async fn guided_form(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Query(query): Query<GuidedQuery>,
) -> AppResult<Json<GuidedFormResponse>> {
    let user = current_user(&state, &auth_user).await?;
    let store = state.store.as_ref();

    let resolved = templates::resolve(store, query.template_id.as_deref(), user.id).await?;
    let fallback = resolved.reason();
    let template = resolved.into_value();

    let ctx = context::build(store, &user, Utc::now()).await?;
    let questions = renderer::render(&template, &ctx)
        .into_iter()
        .map(|q| QuestionField {
            id: q.id.clone(),
            field: q.field_name(),
            prompt: q.prompt.clone(),
            kind: q.kind,
            required: q.required,
            options: q.options.clone(),
        })
        .collect();

    Ok(Json(GuidedFormResponse {
        template,
        fallback,
        context: ctx,
        questions,
    }))
}

pub async fn submit_guided(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Form(pairs): Form<Vec<(String, String)>>,
) -> AppResult<(StatusCode, Json<EntryView>)> {
    let user = current_user(&state, &auth_user).await?;
    let store = state.store.as_ref();
    let fields = FormFields::new(pairs);

    let template = templates::resolve(store, fields.get("template_id"), user.id)
        .await?
        .into_value();
    let record = submission::submit(store, &user, &template, &fields, Utc::now()).await?;

    Ok((StatusCode::CREATED, Json(compose(&record))))
}
