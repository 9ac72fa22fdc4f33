use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::{bridge, downloads, handlers, middleware::metrics_middleware, preferences, searches};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // API routes
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Searches
        .route(
            "/searches",
            post(searches::create_search).get(searches::list_searches),
        )
        .route(
            "/searches/{id}",
            get(searches::get_search).delete(searches::cancel_search),
        )
        .route("/searches/{id}/results", get(searches::get_results))
        .route("/searches/{id}/downloaders", get(searches::get_downloaders))
        // Downloads
        .route(
            "/downloads",
            post(downloads::request_download).get(downloads::list_downloads),
        )
        // Preferences and search peers
        .route(
            "/preferences",
            get(preferences::get_preferences).put(preferences::update_preferences),
        )
        .route("/peers", get(preferences::list_peers))
        // Chat bridge
        .route("/bridge", get(bridge::bridge_handler))
        .route("/bridge/files", post(bridge::upload_file))
        .with_state(Arc::clone(&state));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::metrics))
        .with_state(state)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
