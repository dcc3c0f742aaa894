//! Router setup with all API routes and middleware.

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Create the axum Router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    // The hosting chat UI runs on its own origin; the transport itself
    // carries no credentials, so a permissive CORS policy is sufficient.
    let cors = CorsLayer::permissive();

    Router::new()
        .route("/health", get(handlers::health))
        .route("/sessions", post(handlers::create_session))
        .route("/sessions/{id}/settings", put(handlers::update_settings))
        .route("/sessions/{id}/document", post(handlers::upload_document))
        .route("/sessions/{id}/message", post(handlers::post_message))
        .route(
            "/sessions/{id}/actions/thanks",
            post(handlers::thanks_action),
        )
        .route("/sessions/{id}", delete(handlers::end_session))
        .layer(DefaultBodyLimit::max(state.max_upload_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
