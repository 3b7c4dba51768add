//! Prelude module for convenient imports.
//!
//! # Usage
//!
//! ```rust,ignore
//! use imago::prelude::*;
//! ```

pub use crate::agent::{Agent, EarlyStopping, RunResult, Runner, StepInfo, ToolCallRecord};
pub use crate::chat::{
    ChatProvider, ChatRequest, ChatResponse, SharedChatProvider, StopReason, ToolChoice,
};
pub use crate::config::{AppConfig, load_config};
pub use crate::error::{Error, LlmError, Result, ToolError};
pub use crate::llms::{MockChatProvider, OpenAI, OpenAIConfig};
pub use crate::memory::{ConversationTurn, WindowMemory};
pub use crate::message::{FunctionCall, Message, Role, ToolCall};
pub use crate::session::Session;
pub use crate::tool::{BoxedTool, DynTool, Tool, ToolDefinition, ToolResult};
pub use crate::tools::{
    ImageCaptionTool, InferenceClient, InferenceConfig, ObjectDetectionTool, vision_tools,
};
pub use crate::upload::{Answer, ImageUpload, QuestionHandler, StagedImage, build_request};
pub use crate::usage::Usage;
