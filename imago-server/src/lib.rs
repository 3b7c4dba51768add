//! Web UI and command line front ends for imago.
//!
//! The `imago` binary serves a browser form ([`web`]) or answers questions
//! from the terminal. Both go through [`imago::upload::QuestionHandler`].

pub mod error;
pub mod web;

pub use error::{Result, ServerError};
