//! Data types for agent outputs and query outcomes.
//!
//! These types represent the output of each branch step and the
//! aggregated result returned by the orchestrator.

use std::time::Duration;

use serde::Serialize;
use serde_json::{Value, json};

use super::message::TokenUsage;
use super::router::{AgentStep, Branch, QueryRoute};

/// Output of one specialist agent in a branch.
#[derive(Debug, Clone, Serialize)]
pub struct SourceOutput {
    /// Which agent produced the output.
    pub step: AgentStep,
    /// The agent's final text.
    pub content: String,
    /// Tokens spent by the agent, including NL2SQL generation.
    pub usage: TokenUsage,
}

/// Result of the deterministic query pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct QueryOutcome {
    /// Classification flags of the query.
    pub route: QueryRoute,
    /// Branch that ran.
    pub branch: Branch,
    /// Outputs of the branch's agents, in execution order.
    pub sources: Vec<SourceOutput>,
    /// Parsed synthesis, or the error object embedding the raw output.
    pub response: Value,
    /// Total tokens consumed.
    pub total_tokens: u32,
    /// Total elapsed time.
    #[serde(serialize_with = "serialize_duration")]
    pub elapsed: Duration,
}

impl QueryOutcome {
    /// Whether synthesis produced a parseable JSON object.
    #[must_use]
    pub fn is_parsed(&self) -> bool {
        self.response.get("status").and_then(Value::as_str) != Some("error")
            || self.response.get("raw_output").is_none()
    }
}

/// Result of the model-routed pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct RoutedOutcome {
    /// The root agent's final text.
    pub response: String,
    /// Total tokens consumed.
    pub total_tokens: u32,
    /// Total elapsed time.
    #[serde(serialize_with = "serialize_duration")]
    pub elapsed: Duration,
}

impl RoutedOutcome {
    /// The `{"response": ...}` body returned to API callers.
    #[must_use]
    pub fn to_json(&self) -> Value {
        json!({ "response": self.response })
    }
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn serialize_duration<S>(d: &Duration, s: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    s.serialize_f64(d.as_secs_f64())
}
