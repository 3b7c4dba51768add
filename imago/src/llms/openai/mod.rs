//! OpenAI API client implementation.
//!
//! Only non-streaming chat completions are implemented; that is all the
//! agent loop needs.

mod chat;
mod client;
mod config;
mod types;

pub use client::OpenAI;
pub use config::OpenAIConfig;
