pub mod courses;
pub mod health;
pub mod query;
pub mod sessions;

use axum::http::{header, Method};
use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::api::{error::ApiError, middleware::request_logger, state::AppState};
use crate::domain::DomainError;

pub fn create_router(state: AppState) -> Router {
    let cors = build_cors(&state.config.server.cors_allowed_origins);
    let frontend_dir = &state.config.server.frontend_dir;
    let frontend = ServeDir::new(frontend_dir)
        .append_index_html_on_directories(true)
        .fallback(ServeFile::new(frontend_dir.join("index.html")));

    Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .nest("/api", api_routes())
        .fallback_service(frontend)
        .layer(middleware::from_fn(request_logger))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
        .with_state(state)
}

fn build_cors(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE]);

    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        cors.allow_origin(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
        cors.allow_origin(origins)
    }
}

/// Unknown `/api` paths never fall through to the frontend.
fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/query", post(query::query_handler))
        .route("/courses", get(courses::course_stats))
        .route("/sessions/{session_id}", delete(sessions::clear_session))
        .fallback(api_not_found)
}

async fn api_not_found() -> ApiError {
    DomainError::not_found("API route").into()
}
