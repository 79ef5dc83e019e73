use std::sync::Arc;

use crate::domain::{errors::DomainError, ports::ToolExecutor};
use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub query: String,
    pub history: Option<String>,
}

impl GenerationRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            history: None,
        }
    }

    pub fn with_history(mut self, history: Option<String>) -> Self {
        self.history = history;
        self
    }
}

/// Produces the final answer for a query, optionally performing one round of
/// tool use through `tools` before answering.
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    async fn generate(
        &self,
        request: GenerationRequest,
        tools: Arc<dyn ToolExecutor>,
    ) -> Result<String, DomainError>;
}
