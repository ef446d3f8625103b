//! JSON extraction from model output.
//!
//! Models asked for JSON often wrap it in a markdown fence. The fence is
//! stripped before parsing; nothing else about the payload is checked.

use serde_json::{Value, json};

use crate::error::AgentError;

/// Strips a leading `` ```json `` (or bare `` ``` ``) fence and a trailing
/// `` ``` `` fence, returning the trimmed inner text.
#[must_use]
pub fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    if !trimmed.starts_with("```") {
        return trimmed;
    }
    let inner = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```JSON"))
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

/// Parses model output as JSON after stripping markdown fencing.
///
/// # Errors
///
/// Returns [`AgentError::ResponseParse`] carrying the raw content when the
/// remainder is not valid JSON.
pub fn extract_json(content: &str) -> Result<Value, AgentError> {
    serde_json::from_str(strip_code_fence(content)).map_err(|e| AgentError::ResponseParse {
        message: format!("invalid JSON in model output: {e}"),
        content: content.to_string(),
    })
}

/// Parses the synthesis output, falling back to an error object.
///
/// On success returns the parsed value. On failure returns
/// `{"status": "error", "message": ..., "raw_output": <content>}` so the
/// caller still gets the model's text.
#[must_use]
pub fn parse_synthesis(content: &str) -> Value {
    match extract_json(content) {
        Ok(value) => value,
        Err(e) => json!({
            "status": "error",
            "message": e.to_string(),
            "raw_output": content,
        }),
    }
}
