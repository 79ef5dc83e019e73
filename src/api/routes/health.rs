use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use tracing::warn;

use crate::api::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Serialize)]
pub struct ReadinessResponse {
    pub status: String,
    pub vector_store: String,
    pub courses: usize,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".into(),
        version: env!("CARGO_PKG_VERSION").into(),
    })
}

pub async fn readiness_check(
    State(state): State<AppState>,
) -> Result<Json<ReadinessResponse>, StatusCode> {
    match state.rag.course_analytics().await {
        Ok(analytics) => Ok(Json(ReadinessResponse {
            status: "ready".into(),
            vector_store: "connected".into(),
            courses: analytics.total_courses,
        })),
        Err(e) => {
            warn!(error = %e, "vector store not ready");
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}
