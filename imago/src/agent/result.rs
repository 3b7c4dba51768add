//! Agent run result types.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::chat::ChatResponse;
use crate::usage::Usage;

/// Record of one tool invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    /// Provider-assigned call id.
    pub id: String,
    /// Tool name the model asked for.
    pub name: String,
    /// Raw JSON arguments as sent by the model.
    pub arguments: String,
    /// Observation fed back to the model.
    pub result: String,
    /// Whether the tool ran successfully.
    pub success: bool,
}

/// One reasoning iteration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepInfo {
    /// 1-based step number.
    pub step: usize,
    /// What the model answered.
    pub response: ChatResponse,
    /// Tools run because of that answer.
    pub tool_calls: Vec<ToolCallRecord>,
}

/// Outcome of an agent run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    /// The final answer text.
    pub output: String,
    /// Number of model calls made.
    pub steps: usize,
    /// Token usage summed over every call.
    pub usage: Usage,
    /// Per-step details.
    pub step_history: Vec<StepInfo>,
    /// Whether the iteration limit was hit and early stopping produced the answer.
    pub early_stopped: bool,
    /// Name of the agent that produced the result.
    pub agent_name: String,
}

impl RunResult {
    /// All tool calls made during the run, in order.
    pub fn tool_calls(&self) -> impl Iterator<Item = &ToolCallRecord> {
        self.step_history.iter().flat_map(|s| s.tool_calls.iter())
    }

    /// Human-readable summary of the run.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut summary = String::with_capacity(256);
        let _ = writeln!(summary, "Agent: {}", self.agent_name);
        let _ = writeln!(summary, "Steps: {}", self.steps);
        let _ = writeln!(
            summary,
            "Tokens: {} (in: {}, out: {})",
            self.usage.total_tokens, self.usage.input_tokens, self.usage.output_tokens
        );
        for call in self.tool_calls() {
            let status = if call.success { "ok" } else { "failed" };
            let _ = writeln!(summary, "Tool: {} [{status}]", call.name);
        }
        if self.early_stopped {
            let _ = writeln!(summary, "Stopped early: iteration limit reached");
        }
        let _ = write!(summary, "Output: {}", self.output);
        summary
    }
}
