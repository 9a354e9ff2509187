use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, post, put},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth;
use crate::handlers;
use crate::AppState;

pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/readyz", get(handlers::health::readyz))
        .route("/api/auth/register", post(handlers::auth::register))
        .route("/api/auth/login", post(handlers::auth::login));

    let protected_routes = Router::new()
        .route(
            "/api/me",
            get(handlers::auth::me).patch(handlers::auth::update_me),
        )
        // Templates
        .route(
            "/api/templates",
            get(handlers::templates::list_templates).post(handlers::templates::create_template),
        )
        .route(
            "/api/templates/:id",
            put(handlers::templates::update_template).delete(handlers::templates::delete_template),
        )
        // Guided journal
        .route(
            "/journal/guided",
            get(handlers::guided::guided_form).post(handlers::guided::submit_guided),
        )
        // Entries
        .route(
            "/api/entries",
            get(handlers::entries::list_entries).post(handlers::entries::create_entry),
        )
        .route("/api/entries/export", get(handlers::entries::export_entries))
        .route(
            "/api/entries/:id",
            get(handlers::entries::get_entry).delete(handlers::entries::delete_entry),
        )
        .route(
            "/api/entries/:id/conversation",
            post(handlers::entries::converse),
        )
        // Tags
        .route(
            "/api/tags",
            get(handlers::tags::list_tags).post(handlers::tags::create_tag),
        )
        .route("/api/tags/:id", axum::routing::delete(handlers::tags::delete_tag))
        // Exercise
        .route(
            "/api/exercise-logs",
            post(handlers::exercise::upsert_exercise_log),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::middleware::require_auth,
        ));

    let mut origins = Vec::new();
    for origin in std::iter::once(&state.config.frontend_url).chain(&state.config.cors_extra_origins) {
        match origin.parse::<HeaderValue>() {
            Ok(hv) => origins.push(hv),
            Err(_) => tracing::warn!(origin = %origin, "Ignoring invalid CORS origin"),
        }
    }
    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .allow_credentials(true);

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(middleware::from_fn(auth::security::reject_suspicious))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
