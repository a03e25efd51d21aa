use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::error::IntelligenceError;

/// JSON Schema of the extracted contract, embedded in every prompt.
pub const CONTRACT_SCHEMA: &str = include_str!("../../schema/extracted-contract-v1.json");

pub const SYSTEM_PROMPT: &str =
    "You extract structured data from commercial contracts. You answer with a single JSON object and nothing else.";

static FENCED_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:json|JSON)?\s*\n?(.*?)\n?\s*```").unwrap());

/// Builds the user message for one contract.
pub fn build_prompt(contract_text: &str) -> String {
    format!(
        "Read the contract below as an experienced legal and financial analyst would.\n\
         Fill in the JSON object described by this JSON Schema:\n\n\
         {schema}\n\n\
         Rules:\n\
         - Reply with JSON only: no commentary and no Markdown.\n\
         - Use null for anything the contract does not state. Do not guess.\n\
         - Populate as many fields as the text supports.\n\
         - Monetary amounts are plain numbers without currency symbols.\n\n\
         Contract text:\n\
         ---\n\
         {text}\n\
         ---",
        schema = CONTRACT_SCHEMA.trim(),
        text = contract_text,
    )
}

/// Pulls the JSON value out of a model reply.
///
/// Accepts a bare object, an object inside a Markdown code fence, or an
/// object surrounded by prose (first `{` through last `}`).
pub fn extract_json_payload(reply: &str) -> Result<Value, IntelligenceError> {
    let trimmed = reply.trim();
    if trimmed.is_empty() {
        return Err(IntelligenceError::EmptyResponse);
    }

    let candidate = FENCED_BLOCK
        .captures(trimmed)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .unwrap_or(trimmed);

    match serde_json::from_str(candidate) {
        Ok(value) => Ok(value),
        Err(first_error) => match (candidate.find('{'), candidate.rfind('}')) {
            (Some(start), Some(end)) if start < end => {
                serde_json::from_str(&candidate[start..=end]).map_err(IntelligenceError::Parse)
            }
            _ => Err(IntelligenceError::Parse(first_error)),
        },
    }
}
