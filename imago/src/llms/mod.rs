//! LLM backend implementations.
//!
//! # Available Backends
//!
//! - [`openai`] - OpenAI Chat Completions API and compatible servers
//! - [`mock`] - scripted replies for tests

pub mod mock;
pub mod openai;

pub use mock::MockChatProvider;
pub use openai::{OpenAI, OpenAIConfig};
