//! Runner: the agent execution engine.
//!
//! The [`Runner`] drives an [`Agent`] through its reasoning loop:
//!
//! 1. Build messages from instructions, conversation history and the request
//! 2. Call the LLM with the available tools
//! 3. A reply without tool calls is the final answer
//! 4. Otherwise execute the tool calls in order and append the observations
//! 5. Loop back to step 2
//!
//! The loop is bounded by the agent's `max_iterations`. When the bound is
//! hit the agent's [`EarlyStopping`] policy decides the answer.

use serde_json::Value;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::chat::{ChatProvider, ChatRequest, ChatResponse, ToolChoice};
use crate::error::{Error, Result, ToolError};
use crate::message::{Message, ToolCall};
use crate::tool::{BoxedTool, ToolDefinition};
use crate::usage::Usage;

use super::config::{Agent, EarlyStopping};
use super::result::{RunResult, StepInfo, ToolCallRecord};

/// Answer returned by [`EarlyStopping::Force`].
pub(crate) const FORCED_STOP_OUTPUT: &str = "Agent stopped due to iteration limit.";

/// Final instruction sent by [`EarlyStopping::Generate`].
const GENERATE_FINAL_PROMPT: &str = "\
You have used all available steps. Do not call any more tools. \
Using only the observations above, give your best final answer to the original question.";

/// Outcome of one reasoning step.
enum StepOutcome {
    /// The model produced a final answer.
    Done(String),
    /// Tool calls were executed; keep going.
    Continue,
}

/// Mutable state of a single run.
struct RunState<'a> {
    agent: &'a Agent,
    provider: &'a dyn ChatProvider,
    messages: Vec<Message>,
    definitions: Vec<ToolDefinition>,
    step_history: Vec<StepInfo>,
    usage: Usage,
}

impl<'a> RunState<'a> {
    fn init(agent: &'a Agent, input: &str, history: &[Message]) -> Result<Self> {
        let provider = agent.provider.as_deref().ok_or_else(|| {
            Error::agent(format!(
                "Agent '{}' has no provider configured. Call .provider() before running.",
                agent.name
            ))
        })?;

        let mut messages = Vec::with_capacity(history.len() + 2);
        if !agent.instructions.is_empty() {
            messages.push(Message::system(&agent.instructions));
        }
        messages.extend_from_slice(history);
        messages.push(Message::user(input));

        let definitions = agent.tool_definitions();
        let tool_names: Vec<&str> = definitions.iter().map(ToolDefinition::name).collect();
        tracing::Span::current().record("agent.tools", tracing::field::debug(&tool_names));

        Ok(Self {
            agent,
            provider,
            messages,
            definitions,
            step_history: Vec::new(),
            usage: Usage::zero(),
        })
    }

    /// Build the request for the next call, optionally offering tools.
    fn build_request(&self, with_tools: bool) -> ChatRequest {
        let mut request = ChatRequest::with_messages(&self.agent.model, self.messages.clone());
        if let Some(temperature) = self.agent.temperature {
            request = request.temperature(temperature);
        }
        if with_tools && !self.definitions.is_empty() {
            request = request
                .tools(self.definitions.clone())
                .tool_choice(ToolChoice::Auto)
                .parallel_tool_calls(true);
        }
        request
    }

    async fn call_model(&mut self, step: usize, request: &ChatRequest) -> Result<ChatResponse> {
        let response = self.provider.chat(request).await.inspect_err(|e| {
            error!(error = %e, agent = %self.agent.name, step, "LLM call failed");
            tracing::Span::current().record("error", tracing::field::display(e));
        })?;

        if let Some(usage) = response.usage {
            self.usage += usage;
        }
        Ok(response)
    }

    async fn process_step(&mut self, step: usize, response: ChatResponse) -> StepOutcome {
        let calls: Vec<ToolCall> = response
            .tool_calls()
            .map(<[ToolCall]>::to_vec)
            .unwrap_or_default();

        if calls.is_empty() {
            let output = response.text().unwrap_or_default();
            self.messages.push(response.message.clone());
            self.step_history.push(StepInfo {
                step,
                response,
                tool_calls: Vec::new(),
            });
            return StepOutcome::Done(output);
        }

        self.messages.push(response.message.clone());

        let mut records = Vec::with_capacity(calls.len());
        for call in &calls {
            let record = Runner::execute_single_tool(call, &self.agent.tools).await;
            self.messages.push(Message::tool(&record.id, &record.result));
            records.push(record);
        }

        self.step_history.push(StepInfo {
            step,
            response,
            tool_calls: records,
        });
        StepOutcome::Continue
    }

    fn finish(self, output: String, early_stopped: bool) -> RunResult {
        let steps = self.step_history.len();
        tracing::Span::current().record("agent.result_steps", steps);
        info!(
            agent = %self.agent.name,
            steps,
            early_stopped,
            input_tokens = self.usage.input_tokens,
            output_tokens = self.usage.output_tokens,
            "Agent run completed",
        );

        RunResult {
            output,
            steps,
            usage: self.usage,
            step_history: self.step_history,
            early_stopped,
            agent_name: self.agent.name.clone(),
        }
    }
}

/// Stateless execution engine that drives an [`Agent`] through its loop.
#[derive(Debug, Clone, Copy)]
pub struct Runner;

impl Runner {
    /// Execute an agent run to completion.
    ///
    /// `history` is inserted between the system instructions and `input`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Agent`] if no provider is configured and propagates
    /// LLM errors. Tool failures never fail the run; they become
    /// observations.
    pub async fn run(agent: &Agent, input: &str, history: &[Message]) -> Result<RunResult> {
        let span = info_span!(
            "agent",
            agent.name = %agent.name,
            agent.model = %agent.model,
            agent.max_iterations = agent.max_iterations,
            agent.tools = tracing::field::Empty,
            agent.result_steps = tracing::field::Empty,
            error = tracing::field::Empty,
        );
        Self::run_inner(agent, input, history).instrument(span).await
    }

    async fn run_inner(agent: &Agent, input: &str, history: &[Message]) -> Result<RunResult> {
        let mut state = RunState::init(agent, input, history)?;

        for step in 1..=agent.max_iterations {
            debug!(agent = %agent.name, step, "Starting step");

            let request = state.build_request(true);
            let response = state.call_model(step, &request).await?;

            match state.process_step(step, response).await {
                StepOutcome::Done(output) => return Ok(state.finish(output, false)),
                StepOutcome::Continue => {}
            }
        }

        warn!(
            agent = %agent.name,
            max_iterations = agent.max_iterations,
            policy = %agent.early_stopping,
            "Iteration limit reached",
        );

        match agent.early_stopping {
            EarlyStopping::Force => Ok(state.finish(FORCED_STOP_OUTPUT.to_owned(), true)),
            EarlyStopping::Generate => {
                let step = agent.max_iterations + 1;
                state.messages.push(Message::user(GENERATE_FINAL_PROMPT));

                let request = state.build_request(false);
                let response = state.call_model(step, &request).await?;
                let output = response.text().unwrap_or_default();

                state.messages.push(response.message.clone());
                state.step_history.push(StepInfo {
                    step,
                    response,
                    tool_calls: Vec::new(),
                });
                Ok(state.finish(output, true))
            }
        }
    }

    /// Execute one tool call and record the observation.
    async fn execute_single_tool(call: &ToolCall, tools: &[BoxedTool]) -> ToolCallRecord {
        let name = &call.function.name;
        let tool_span = info_span!(
            "tool",
            tool.name = %name,
            tool.id = %call.id,
            tool.input = %call.function.arguments,
            tool.success = tracing::field::Empty,
            error = tracing::field::Empty,
        );

        async {
            let (result, success) = match tools.iter().find(|t| t.name() == name.as_str()) {
                Some(tool) => Self::dispatch_tool(tool, call).await,
                None => {
                    let e = ToolError::not_found(name.as_str());
                    warn!(error = %e, "Unknown tool requested");
                    (format!("Tool error: {e}"), false)
                }
            };

            let current = tracing::Span::current();
            current.record("tool.success", success);
            if !success {
                current.record("error", result.as_str());
            }

            ToolCallRecord {
                id: call.id.clone(),
                name: name.clone(),
                arguments: call.function.arguments.clone(),
                result,
                success,
            }
        }
        .instrument(tool_span)
        .await
    }

    /// Dispatch a tool call via the [`DynTool`](crate::tool::DynTool) interface.
    async fn dispatch_tool(tool: &BoxedTool, call: &ToolCall) -> (String, bool) {
        let args = Value::String(call.function.arguments.clone());
        match tool.call_json(args).await {
            Ok(Value::String(text)) => (text, true),
            Ok(value) => (value.to_string(), true),
            Err(e) => {
                warn!(tool = %call.function.name, error = %e, "Tool execution failed");
                (format!("Tool error: {e}"), false)
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use serde::Deserialize;

    use super::*;
    use crate::chat::SharedChatProvider;
    use crate::error::LlmError;
    use crate::llms::MockChatProvider;
    use crate::message::Role;
    use crate::tool::{Tool, ToolResult};

    /// Answers with a fixed caption; fails for paths containing "broken".
    struct FakeCaptioner;

    #[derive(Deserialize)]
    struct PathArgs {
        image_path: String,
    }

    #[async_trait]
    impl Tool for FakeCaptioner {
        const NAME: &'static str = "image_captioner";
        type Args = PathArgs;
        type Output = String;

        fn description(&self) -> String {
            "Describes an image.".to_owned()
        }

        fn parameters_schema(&self) -> Value {
            serde_json::json!({
                "type": "object",
                "properties": {"image_path": {"type": "string"}},
                "required": ["image_path"]
            })
        }

        async fn call(&self, args: Self::Args) -> ToolResult<Self::Output> {
            if args.image_path.contains("broken") {
                return Err(ToolError::invalid_image("cannot decode"));
            }
            Ok("a black cat on a sofa".to_owned())
        }
    }

    fn caption_call(id: &str, path: &str) -> ChatResponse {
        ChatResponse::from_tool_calls(vec![ToolCall::function(
            id,
            "image_captioner",
            format!(r#"{{"image_path":"{path}"}}"#),
        )])
    }

    fn agent(provider: &Arc<MockChatProvider>) -> Agent {
        Agent::new("test")
            .model("gpt-3.5-turbo")
            .temperature(0.0)
            .provider(Arc::clone(provider) as SharedChatProvider)
            .tool(Box::new(FakeCaptioner))
    }

    #[tokio::test]
    async fn direct_answer_finishes_in_one_step() {
        let provider = Arc::new(MockChatProvider::from_texts(["Hello there."]));
        let result = agent(&provider).run("hi", &[]).await.unwrap();

        assert_eq!(result.output, "Hello there.");
        assert_eq!(result.steps, 1);
        assert!(!result.early_stopped);

        let request = &provider.requests()[0];
        assert_eq!(request.model, "gpt-3.5-turbo");
        assert_eq!(request.temperature, Some(0.0));
        assert_eq!(request.tools.as_ref().map(Vec::len), Some(1));
        assert_eq!(request.messages[0].role, Role::System);
        assert_eq!(request.messages[1].content_text(), Some("hi"));
    }

    #[tokio::test]
    async fn tool_observation_feeds_next_step() {
        let provider = Arc::new(MockChatProvider::new(vec![
            caption_call("call_1", "/tmp/cat.jpg"),
            ChatResponse::from_text("It is a cat."),
        ]));

        let result = agent(&provider).run("What animal?", &[]).await.unwrap();

        assert_eq!(result.output, "It is a cat.");
        assert_eq!(result.steps, 2);
        let records: Vec<_> = result.tool_calls().collect();
        assert_eq!(records.len(), 1);
        assert!(records[0].success);
        assert_eq!(records[0].result, "a black cat on a sofa");

        let second = &provider.requests()[1];
        let last = second.messages.last().unwrap();
        assert_eq!(last.role, Role::Tool);
        assert_eq!(last.tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(last.content_text(), Some("a black cat on a sofa"));
    }

    #[tokio::test]
    async fn tool_failure_becomes_observation() {
        let provider = Arc::new(MockChatProvider::new(vec![
            caption_call("call_1", "/tmp/broken.jpg"),
            ChatResponse::from_text("I could not read the image."),
        ]));

        let result = agent(&provider).run("What is it?", &[]).await.unwrap();

        let record = result.tool_calls().next().unwrap();
        assert!(!record.success);
        assert!(record.result.starts_with("Tool error: "));
        assert_eq!(result.output, "I could not read the image.");
    }

    #[tokio::test]
    async fn unknown_tool_becomes_observation() {
        let provider = Arc::new(MockChatProvider::new(vec![
            ChatResponse::from_tool_calls(vec![ToolCall::function("call_1", "ocr", "{}")]),
            ChatResponse::from_text("No OCR available."),
        ]));

        let result = agent(&provider).run("Read the text", &[]).await.unwrap();
        let record = result.tool_calls().next().unwrap();
        assert_eq!(record.result, "Tool error: Tool not found: ocr");
        assert!(!record.success);
    }

    #[tokio::test]
    async fn generate_policy_makes_one_final_call_without_tools() {
        let provider = Arc::new(MockChatProvider::new(vec![
            caption_call("c1", "/tmp/a.jpg"),
            caption_call("c2", "/tmp/a.jpg"),
            caption_call("c3", "/tmp/a.jpg"),
            caption_call("c4", "/tmp/a.jpg"),
            caption_call("c5", "/tmp/a.jpg"),
            ChatResponse::from_text("Best guess: a cat."),
        ]));

        let result = agent(&provider).run("Loop forever", &[]).await.unwrap();

        assert!(result.early_stopped);
        assert_eq!(result.output, "Best guess: a cat.");
        assert_eq!(provider.call_count(), 6);
        assert_eq!(result.tool_calls().count(), 5);

        let last = provider.requests().pop().unwrap();
        assert!(last.tools.is_none());
        assert_eq!(last.messages.last().map(|m| m.role), Some(Role::User));
    }

    #[tokio::test]
    async fn force_policy_returns_fixed_text() {
        let provider = Arc::new(MockChatProvider::new(vec![caption_call("c", "/tmp/a.jpg")]));
        let result = agent(&provider)
            .max_iterations(2)
            .early_stopping(EarlyStopping::Force)
            .run("Loop", &[])
            .await
            .unwrap();

        assert!(result.early_stopped);
        assert_eq!(result.output, FORCED_STOP_OUTPUT);
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn history_sits_between_system_and_input() {
        let provider = Arc::new(MockChatProvider::from_texts(["ok"]));
        let history = vec![Message::user("earlier q"), Message::assistant("earlier a")];

        agent(&provider).run("now", &history).await.unwrap();

        let request = &provider.requests()[0];
        assert_eq!(request.messages.len(), 4);
        assert_eq!(request.messages[1].content_text(), Some("earlier q"));
        assert_eq!(request.messages[2].content_text(), Some("earlier a"));
        assert_eq!(request.messages[3].content_text(), Some("now"));
    }

    #[tokio::test]
    async fn llm_error_propagates() {
        let provider = Arc::new(MockChatProvider::failing(LlmError::rate_limited("openai")));
        let err = agent(&provider).run("hi", &[]).await.unwrap_err();
        assert!(matches!(err, Error::Llm(_)));
    }

    #[tokio::test]
    async fn missing_provider_is_an_agent_error() {
        let err = Agent::new("lonely").run("hi", &[]).await.unwrap_err();
        assert!(matches!(err, Error::Agent(_)));
    }
}
