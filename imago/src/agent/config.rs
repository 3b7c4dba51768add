//! Agent configuration types.
//!
//! The [`Agent`] struct describes what the agent is and what it can do.
//! The [`Runner`](super::Runner) handles how it runs.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::chat::SharedChatProvider;
use crate::error::Result;
use crate::message::Message;
use crate::tool::{BoxedTool, ToolDefinition};

use super::result::RunResult;
use super::runner::Runner;

/// System prompt used when none is configured.
pub const DEFAULT_INSTRUCTIONS: &str = "\
You are an assistant that answers questions about images. \
Each question comes with the path of an image file on disk. \
You cannot see the image yourself: use the available tools, passing them the exact image path, \
and base your answer on what they report. \
Answer the question directly and concisely.";

/// What to do when the iteration limit is reached without a final answer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EarlyStopping {
    /// Ask the model one last time, without tools, for a final answer.
    #[default]
    Generate,
    /// Stop and return a fixed message.
    Force,
}

impl EarlyStopping {
    /// Configuration name of the policy.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Generate => "generate",
            Self::Force => "force",
        }
    }
}

impl fmt::Display for EarlyStopping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pure configuration struct defining the image QA agent.
pub struct Agent {
    /// Name used in logs.
    pub(crate) name: String,

    /// System-level instructions for the model.
    pub(crate) instructions: String,

    /// LLM model identifier. Empty means the provider's default.
    pub(crate) model: String,

    /// Sampling temperature sent with every request.
    pub(crate) temperature: Option<f32>,

    /// The provider used for chat completions.
    pub(crate) provider: Option<SharedChatProvider>,

    /// Tools available through function calling.
    pub(crate) tools: Vec<BoxedTool>,

    /// Maximum number of reasoning iterations.
    pub(crate) max_iterations: usize,

    /// Policy applied when `max_iterations` runs out.
    pub(crate) early_stopping: EarlyStopping,
}

impl fmt::Debug for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agent")
            .field("name", &self.name)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("provider", &self.provider.as_ref().map(|p| p.provider_name()))
            .field(
                "tools",
                &self.tools.iter().map(|t| t.name()).collect::<Vec<_>>(),
            )
            .field("max_iterations", &self.max_iterations)
            .field("early_stopping", &self.early_stopping)
            .finish_non_exhaustive()
    }
}

impl Agent {
    /// Default maximum number of reasoning iterations.
    pub const DEFAULT_MAX_ITERATIONS: usize = 5;

    /// Create a new agent with the given name and default settings.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instructions: DEFAULT_INSTRUCTIONS.to_owned(),
            model: String::new(),
            temperature: None,
            provider: None,
            tools: Vec::new(),
            max_iterations: Self::DEFAULT_MAX_ITERATIONS,
            early_stopping: EarlyStopping::default(),
        }
    }

    /// Set the system instructions.
    #[must_use]
    pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    /// Set the LLM model identifier.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the sampling temperature.
    #[must_use]
    pub const fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the LLM provider.
    #[must_use]
    pub fn provider(mut self, provider: SharedChatProvider) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Add a tool.
    #[must_use]
    pub fn tool(mut self, tool: BoxedTool) -> Self {
        self.tools.push(tool);
        self
    }

    /// Replace all tools.
    #[must_use]
    pub fn tools(mut self, tools: Vec<BoxedTool>) -> Self {
        self.tools = tools;
        self
    }

    /// Set the iteration bound.
    #[must_use]
    pub const fn max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set the early stopping policy.
    #[must_use]
    pub const fn early_stopping(mut self, policy: EarlyStopping) -> Self {
        self.early_stopping = policy;
        self
    }

    /// Returns the agent name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the configured model (may be empty).
    #[must_use]
    pub fn model_name(&self) -> &str {
        &self.model
    }

    /// Returns the iteration bound.
    #[must_use]
    pub const fn iteration_limit(&self) -> usize {
        self.max_iterations
    }

    /// Returns the early stopping policy.
    #[must_use]
    pub const fn early_stopping_policy(&self) -> EarlyStopping {
        self.early_stopping
    }

    /// Definitions of every registered tool.
    #[must_use]
    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    /// Run the agent on `input` with `history` as prior context.
    ///
    /// # Errors
    ///
    /// Fails when no provider is configured or a model call fails.
    pub async fn run(&self, input: &str, history: &[Message]) -> Result<RunResult> {
        Runner::run(self, input, history).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let agent = Agent::new("qa");
        assert_eq!(agent.name(), "qa");
        assert_eq!(agent.iteration_limit(), 5);
        assert_eq!(agent.early_stopping_policy(), EarlyStopping::Generate);
        assert!(agent.tool_definitions().is_empty());
        assert!(agent.instructions.contains("image path"));
    }

    #[test]
    fn early_stopping_names() {
        let force: EarlyStopping = serde_json::from_str(r#""force""#).unwrap();
        assert_eq!(force, EarlyStopping::Force);
        assert!(serde_json::from_str::<EarlyStopping>(r#""later""#).is_err());
        assert_eq!(EarlyStopping::Force.to_string(), "force");
    }

    #[test]
    fn debug_lists_tool_names() {
        let agent = Agent::new("qa").model("gpt-3.5-turbo").max_iterations(2);
        let debug = format!("{agent:?}");
        assert!(debug.contains("gpt-3.5-turbo"));
        assert!(debug.contains("max_iterations: 2"));
    }
}
