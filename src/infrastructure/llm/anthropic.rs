use async_trait::async_trait;
use rig::client::CompletionClient;
use rig::completion::{CompletionError, CompletionModel, Message, ToolDefinition};
use rig::message::{AssistantContent, ToolCall, ToolResultContent, UserContent};
use rig::providers::anthropic;
use rig::OneOrMany;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::domain::{
    ports::{AnswerGenerator, GenerationRequest, ToolExecutor},
    DomainError, ToolSpec,
};
use crate::infrastructure::config::LlmConfig;

const SYSTEM_PROMPT: &str = "You are an AI assistant specialized in course materials and educational content with access to tools for searching course content and retrieving course outlines.

Tool usage:
- Use `search_course_content` for questions about specific course content or detailed educational materials
- Use `get_course_outline` for questions about a course's structure, its link or its list of lessons; include the course title, course link and every lesson number and title in the answer
- **One tool call per query maximum**
- Synthesize tool results into accurate, fact-based responses
- If a tool yields no results, state this clearly without offering alternatives

Response protocol:
- **General knowledge questions**: answer using existing knowledge without using tools
- **Course-specific questions**: use a tool first, then answer
- **No meta-commentary**: provide direct answers only, no reasoning process, tool explanations or question-type analysis
- Do not mention \"based on the search results\"

All responses must be:
1. **Brief, concise and focused** - get to the point quickly
2. **Educational** - maintain instructional value
3. **Clear** - use accessible language
4. **Example-supported** - include relevant examples when they aid understanding

Provide only the direct answer to what was asked.";

const TEMPERATURE: f64 = 0.0;
const MAX_TOKENS: u64 = 800;

/// Answers with Claude. The course tools are offered on the first request
/// only; when the model uses them, a single follow-up request without tools
/// turns the tool results into the answer.
pub struct AnthropicGenerator {
    client: anthropic::Client,
    model: String,
    timeout: Duration,
}

impl AnthropicGenerator {
    pub fn from_config(config: &LlmConfig) -> Result<Self, DomainError> {
        let builder = anthropic::Client::builder().api_key(&config.api_key);
        let builder = match &config.base_url {
            Some(url) => builder.base_url(url.trim_end_matches('/')),
            None => builder,
        };
        let client = builder
            .build()
            .map_err(|e| DomainError::external(format!("Failed to create Anthropic client: {e}")))?;

        Ok(Self {
            client,
            model: config.model.clone(),
            timeout: Duration::from_secs(config.timeout_seconds),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn exchange(
        &self,
        request: &GenerationRequest,
        tools: &dyn ToolExecutor,
    ) -> Result<String, DomainError> {
        let model = self.client.completion_model(&self.model);
        let preamble = system_prompt(request.history.as_deref());
        let prompt = Message::user(request.query.as_str());

        let first = model
            .completion_request(prompt.clone())
            .preamble(preamble.clone())
            .temperature(TEMPERATURE)
            .max_tokens(MAX_TOKENS)
            .tools(tools.definitions().into_iter().map(to_definition).collect())
            .send()
            .await
            .map_err(generation_failed)?;

        let calls = tool_calls(&first.choice);
        if calls.is_empty() {
            return answer_text(&first.choice);
        }

        let mut results = Vec::with_capacity(calls.len());
        for call in &calls {
            debug!(tool = %call.function.name, "model requested tool");
            let output = tools
                .execute_named(&call.function.name, call.function.arguments.clone())
                .await;
            results.push(tool_result(call, output));
        }
        let results = OneOrMany::many(results).map_err(|e| DomainError::internal(e.to_string()))?;

        let follow_up = model
            .completion_request(Message::User { content: results })
            .preamble(preamble)
            .messages(vec![
                prompt,
                Message::Assistant {
                    id: None,
                    content: first.choice,
                },
            ])
            .temperature(TEMPERATURE)
            .max_tokens(MAX_TOKENS)
            .send()
            .await
            .map_err(generation_failed)?;

        answer_text(&follow_up.choice)
    }
}

fn system_prompt(history: Option<&str>) -> String {
    match history {
        Some(history) => format!("{SYSTEM_PROMPT}\n\nPrevious conversation:\n{history}"),
        None => SYSTEM_PROMPT.to_string(),
    }
}

fn to_definition(spec: ToolSpec) -> ToolDefinition {
    ToolDefinition {
        name: spec.name,
        description: spec.description,
        parameters: spec.parameters,
    }
}

fn generation_failed(e: CompletionError) -> DomainError {
    DomainError::external(format!("Answer generation failed: {e}"))
}

fn tool_calls(choice: &OneOrMany<AssistantContent>) -> Vec<ToolCall> {
    choice
        .iter()
        .filter_map(|content| match content {
            AssistantContent::ToolCall(call) => Some(call.clone()),
            _ => None,
        })
        .collect()
}

fn tool_result(call: &ToolCall, output: String) -> UserContent {
    let content = OneOrMany::one(ToolResultContent::text(output));
    match &call.call_id {
        Some(call_id) => UserContent::tool_result_with_call_id(&call.id, call_id.clone(), content),
        None => UserContent::tool_result(&call.id, content),
    }
}

fn answer_text(choice: &OneOrMany<AssistantContent>) -> Result<String, DomainError> {
    let answer: String = choice
        .iter()
        .filter_map(|content| match content {
            AssistantContent::Text(text) => Some(text.text()),
            _ => None,
        })
        .collect();

    if answer.is_empty() {
        return Err(DomainError::external(
            "Answer generation failed: model returned no text",
        ));
    }
    Ok(answer)
}

#[async_trait]
impl AnswerGenerator for AnthropicGenerator {
    #[instrument(skip(self, request, tools), fields(model = %self.model))]
    async fn generate(
        &self,
        request: GenerationRequest,
        tools: Arc<dyn ToolExecutor>,
    ) -> Result<String, DomainError> {
        let answer = tokio::time::timeout(self.timeout, self.exchange(&request, tools.as_ref()))
            .await
            .map_err(|_| DomainError::timeout("Answer generation timed out"))??;

        debug!(chars = answer.len(), "answer generated");
        Ok(answer)
    }
}
