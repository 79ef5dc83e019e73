use axum::{
    extract::{Path, State},
    http::StatusCode,
};
use tracing::info;

use crate::api::{error::ApiError, state::AppState};

pub async fn clear_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.rag.sessions().clear_session(&session_id)?;
    info!(session_id = %session_id, "session cleared");
    Ok(StatusCode::NO_CONTENT)
}
