//! Imago - conversational question answering over images
//!
//! A user uploads an image and asks about it. An agent backed by a chat
//! model answers by calling vision tools (captioning and object detection)
//! on the staged image, keeping a short window of the conversation so
//! follow-up questions have context.
//!
//! The pieces, bottom-up:
//!
//! - [`tools`]: `image_captioner` and `object_detector` over a hosted
//!   inference endpoint
//! - [`memory`]: sliding window of recent exchanges
//! - [`llms`]: chat completion clients
//! - [`agent`]: the bounded tool-calling loop
//! - [`session`]: agent plus memory, shared by every question
//! - [`upload`]: staging an upload in a temp file and asking about it

pub mod agent;
pub mod chat;
pub mod config;
pub mod error;
pub mod llms;
pub mod memory;
pub mod message;
pub mod prelude;
pub mod session;
pub mod tool;
pub mod tools;
pub mod upload;
pub mod usage;

pub use error::{Error, LlmError, Result, ToolError};
