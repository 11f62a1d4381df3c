use axum::routing::{delete, get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::handlers::{
    code_stats, create_url, delete_url, health_check, list_urls, redirect_url, AppState,
};

/// Build the application router: the JSON API under `/api` and the redirect
/// path at the root.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/shorturl", post(create_url).get(list_urls))
        .route("/api/shorturl/{code}/stats", get(code_stats))
        .route("/api/shorturl/{code}", delete(delete_url))
        .route("/health", get(health_check))
        .route("/{code}", get(redirect_url))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
