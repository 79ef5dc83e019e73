use crate::domain::tools::{ToolCall, ToolSpec};
use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

/// Executes tool invocations requested by the language model.
///
/// Results are plain text handed back to the model; failures inside a tool are
/// rendered into that text so the model can explain them.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    fn definitions(&self) -> Vec<ToolSpec>;
    async fn execute(&self, call: ToolCall) -> String;

    /// Dispatches a raw name/JSON invocation as the model sent it. Unknown
    /// tools and malformed arguments come back as text for the model.
    async fn execute_named(&self, name: &str, input: Value) -> String {
        match ToolCall::from_named(name, input) {
            Ok(call) => self.execute(call).await,
            Err(e) => {
                warn!(tool = name, error = %e, "rejected tool call");
                e.to_string()
            }
        }
    }
}
