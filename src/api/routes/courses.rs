use axum::{extract::State, Json};

use crate::api::{error::ApiError, state::AppState};
use crate::domain::CourseAnalytics;

pub async fn course_stats(State(state): State<AppState>) -> Result<Json<CourseAnalytics>, ApiError> {
    Ok(Json(state.rag.course_analytics().await?))
}
