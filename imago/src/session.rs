//! The application context shared by every question.
//!
//! A [`Session`] owns the agent and the conversation window. It is built
//! once at startup and handed to the presentation layer, which calls
//! [`Session::ask`] for each question. Questions are serialized: the memory
//! lock is held for the whole run, so exchanges land in the window in the
//! order they were asked.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use crate::agent::{Agent, RunResult};
use crate::chat::SharedChatProvider;
use crate::config::AppConfig;
use crate::error::Result;
use crate::llms::{OpenAI, OpenAIConfig};
use crate::memory::{ConversationTurn, WindowMemory};
use crate::tools::{InferenceConfig, vision_tools};

/// Agent plus conversation memory.
#[derive(Debug)]
pub struct Session {
    agent: Agent,
    memory: Mutex<WindowMemory>,
}

impl Session {
    /// Name given to the agent built from configuration.
    pub const AGENT_NAME: &'static str = "image-qa";

    /// Creates a session around a ready agent.
    #[must_use]
    pub fn new(agent: Agent, memory_window: usize) -> Self {
        Self {
            agent,
            memory: Mutex::new(WindowMemory::new(memory_window)),
        }
    }

    /// Builds the OpenAI-backed session described by `config`.
    ///
    /// Credentials come from the environment: `OPENAI_API_KEY` (required),
    /// `OPENAI_ORGANIZATION` and `HF_TOKEN` (optional).
    ///
    /// # Errors
    ///
    /// Fails with an authentication error when `OPENAI_API_KEY` is unset or
    /// blank, or when an HTTP client cannot be built.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let openai = config.openai_config(OpenAIConfig::from_env()?);
        let provider = Arc::new(OpenAI::new(openai)?);

        Self::with_provider(config, provider, InferenceConfig::from_env().token)
    }

    /// Builds a session from `config` over any chat provider.
    ///
    /// # Errors
    ///
    /// Fails when the inference HTTP client cannot be built.
    pub fn with_provider(
        config: &AppConfig,
        provider: SharedChatProvider,
        inference_token: Option<String>,
    ) -> Result<Self> {
        let base = InferenceConfig {
            token: inference_token,
            ..InferenceConfig::default()
        };
        let tools = vision_tools(config.inference_config(base))?;

        let mut agent = Agent::new(Self::AGENT_NAME)
            .model(&config.llm.model)
            .temperature(config.llm.temperature)
            .provider(provider)
            .tools(tools)
            .max_iterations(config.agent.max_iterations)
            .early_stopping(config.agent.early_stopping);
        if let Some(instructions) = &config.agent.instructions {
            agent = agent.instructions(instructions);
        }

        debug!(?agent, memory_window = config.agent.memory_window, "Session ready");
        Ok(Self::new(agent, config.agent.memory_window))
    }

    /// The agent answering questions.
    #[must_use]
    pub const fn agent(&self) -> &Agent {
        &self.agent
    }

    /// Runs the agent on `request` with the current window as history.
    ///
    /// The exchange is recorded only when the run succeeds.
    ///
    /// # Errors
    ///
    /// Propagates agent and model errors.
    pub async fn ask(&self, request: &str) -> Result<RunResult> {
        let mut memory = self.memory.lock().await;
        let history = memory.to_messages();

        let result = self.agent.run(request, &history).await?;
        memory.record(request, &result.output);

        Ok(result)
    }

    /// Snapshot of the exchanges currently remembered, oldest first.
    pub async fn history(&self) -> Vec<ConversationTurn> {
        self.memory.lock().await.turns().cloned().collect()
    }

    /// Forgets every exchange.
    pub async fn reset(&self) {
        self.memory.lock().await.clear();
    }
}
