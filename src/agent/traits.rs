//! Agent trait definition.
//!
//! All agents (root, rag, db, search, synthesizer, nl2sql) implement this
//! trait, which provides a uniform interface for the orchestrator.

use async_trait::async_trait;

use super::executor::ToolDispatch;
use super::message::{ChatRequest, ChatResponse, TokenUsage, system_message, user_message};
use super::provider::LlmProvider;
use super::tool::ToolDefinition;
use crate::error::AgentError;

/// Response from an agent execution.
#[derive(Debug, Clone)]
pub struct AgentResponse {
    /// The agent's text output.
    pub content: String,
    /// Token usage, summed across tool-loop round-trips.
    pub usage: TokenUsage,
    /// Why the model stopped generating (e.g. `"stop"`, `"length"`).
    pub finish_reason: Option<String>,
}

impl From<ChatResponse> for AgentResponse {
    fn from(response: ChatResponse) -> Self {
        Self {
            content: response.content,
            usage: response.usage,
            finish_reason: response.finish_reason,
        }
    }
}

/// Trait implemented by all agents in the system.
///
/// Agents encapsulate a specific role (coordination, retrieval, SQL,
/// search, synthesis) with a fixed system prompt and model configuration.
/// The orchestrator calls [`Agent::execute`] for tool-less agents and
/// [`execute_with_tools`] for the rest.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Agent name for logging and identification.
    fn name(&self) -> &'static str;

    /// Model identifier to use for this agent.
    fn model(&self) -> &str;

    /// System prompt that defines the agent's role and behavior.
    fn system_prompt(&self) -> &str;

    /// Whether to request JSON-formatted output.
    fn json_mode(&self) -> bool {
        false
    }

    /// Sampling temperature (0.0 = deterministic, higher = more creative).
    fn temperature(&self) -> f32 {
        0.0
    }

    /// Nucleus sampling cutoff. `None` leaves the provider default.
    fn top_p(&self) -> Option<f32> {
        None
    }

    /// Maximum tokens for the response.
    fn max_tokens(&self) -> u32 {
        2048
    }

    /// Tool definitions available to this agent.
    ///
    /// Returns an empty vec by default (no tools).
    fn tools(&self) -> Vec<ToolDefinition> {
        Vec::new()
    }

    /// Maximum tool-calling loop iterations before aborting.
    fn max_tool_iterations(&self) -> usize {
        10
    }

    /// Builds the initial request for `user_msg`.
    fn request(&self, user_msg: &str, tools: Vec<ToolDefinition>) -> ChatRequest {
        ChatRequest {
            model: self.model().to_string(),
            messages: vec![system_message(self.system_prompt()), user_message(user_msg)],
            temperature: Some(self.temperature()),
            top_p: self.top_p(),
            max_tokens: Some(self.max_tokens()),
            json_mode: self.json_mode(),
            tools,
        }
    }

    /// Executes the agent with the given user message (no tools).
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] on API failures or response parsing errors.
    async fn execute(
        &self,
        provider: &dyn LlmProvider,
        user_msg: &str,
    ) -> Result<AgentResponse, AgentError> {
        let request = self.request(user_msg, Vec::new());
        let response = provider.chat(&request).await?;
        Ok(response.into())
    }
}

/// Executes an agent with tool-calling support.
///
/// If the agent's [`Agent::tools`] returns definitions, builds a tool-enabled
/// request and runs the agentic loop against `dispatch`. Otherwise falls
/// through to [`Agent::execute`].
///
/// # Errors
///
/// Returns [`AgentError`] on API failures or if the tool loop exceeds the
/// agent's max iterations. Failed tool calls are reported to the model,
/// not returned.
pub async fn execute_with_tools(
    agent: &dyn Agent,
    provider: &dyn LlmProvider,
    user_msg: &str,
    dispatch: &dyn ToolDispatch,
) -> Result<AgentResponse, AgentError> {
    let tool_defs = agent.tools();

    if tool_defs.is_empty() {
        return agent.execute(provider, user_msg).await;
    }

    let mut request = agent.request(user_msg, tool_defs);
    let response = super::agentic_loop::agentic_loop(
        provider,
        &mut request,
        dispatch,
        agent.max_tool_iterations(),
    )
    .await?;

    Ok(response.into())
}
