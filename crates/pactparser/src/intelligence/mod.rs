//! Intelligence collaborator: turns contract text into a raw structured
//! value that is expected, but not guaranteed, to match the extracted
//! contract shape.

pub mod client;
pub mod prompt;

use serde_json::Value;

use crate::error::IntelligenceError;

pub use client::ChatCompletionsClient;
pub use prompt::{build_prompt, extract_json_payload, CONTRACT_SCHEMA};

pub trait IntelligenceClient: Send + Sync {
    /// Returns the model's answer as JSON. Shape violations are not errors
    /// here; the scorer handles them.
    fn extract_structured(&self, text: &str) -> Result<Value, IntelligenceError>;
}
