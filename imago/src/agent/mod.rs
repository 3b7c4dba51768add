//! Agent module: a tool-using reasoning loop over one chat provider.
//!
//! - **[`Agent`]** is pure configuration: instructions, model, provider,
//!   tools, iteration bound and early stopping policy.
//! - **[`Runner`]** drives an agent through a bounded loop
//!   (think → call tools → observe → repeat) until the model answers or
//!   the iteration limit hits.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use imago::agent::Agent;
//!
//! let agent = Agent::new("image-qa")
//!     .model("gpt-3.5-turbo")
//!     .temperature(0.0)
//!     .provider(openai_provider.clone())
//!     .tools(vision_tools(InferenceConfig::from_env())?);
//!
//! let result = agent.run("What is in /tmp/cat.jpg?", &[]).await?;
//! println!("{}", result.output);
//! ```

mod config;
pub mod result;
mod runner;

pub use config::{Agent, DEFAULT_INSTRUCTIONS, EarlyStopping};
pub use result::{RunResult, StepInfo, ToolCallRecord};
pub use runner::Runner;
