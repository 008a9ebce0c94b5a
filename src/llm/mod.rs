//! Language-model access.
//!
//! [`CompletionModel`] is the port the insight services talk to;
//! [`AnthropicClient`] implements it against the Anthropic Messages API.
//! [`json`] turns free-form model text into typed records.

mod client;
pub mod json;
pub mod prompts;

pub use client::{AnthropicClient, CompletionModel, CompletionRequest, LlmError};
pub use json::{decode, normalize_model_output};
