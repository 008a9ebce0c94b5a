use axum::{
    http::Method,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers;
use crate::app::App;

/// Builds the API router.
pub fn create_router(app: Arc<App>) -> Router {
    let api_routes = Router::new()
        .route("/feed", get(handlers::lookup_feed))
        .route("/analyze", post(handlers::analyze))
        .route("/summarize", post(handlers::summarize))
        .route("/briefing", post(handlers::briefing))
        .route(
            "/subscriptions",
            get(handlers::list_subscriptions).post(handlers::add_subscription),
        )
        .route("/subscriptions/:id", delete(handlers::remove_subscription))
        .route("/refresh", post(handlers::refresh))
        .route("/articles", get(handlers::articles));

    Router::new()
        .nest("/api", api_routes)
        .route("/health", get(health_check))
        .layer(create_cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(app)
}

/// Any origin, no credentials; the API is meant for a local front end.
fn create_cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any)
        .allow_origin(Any)
}

async fn health_check() -> &'static str {
    "OK"
}
