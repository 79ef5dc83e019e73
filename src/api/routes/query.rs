use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::{error::ApiError, state::AppState};
use crate::domain::Source;

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QueryResponse {
    pub answer: String,
    pub sources: Vec<Source>,
    pub session_id: String,
}

pub async fn query_handler(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    let session_id = match request.session_id.filter(|id| !id.is_empty()) {
        Some(id) => id,
        None => {
            let id = state.rag.sessions().create_session();
            info!(session_id = %id, "session created");
            id
        }
    };

    let (answer, sources) = state.rag.query(&request.query, Some(&session_id)).await?;

    Ok(Json(QueryResponse {
        answer,
        sources,
        session_id,
    }))
}
