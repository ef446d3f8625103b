//! Tool-calling loop shared by every tool-using agent.
//!
//! Each round sends the conversation to the model. When the reply asks for
//! tools, the calls are dispatched in order, their results are appended as
//! tool messages and the model is asked again. A reply without tool calls
//! ends the loop.

use tracing::debug;

use super::executor::ToolDispatch;
use super::message::{
    ChatRequest, ChatResponse, TokenUsage, assistant_tool_calls_message, tool_message,
};
use super::provider::LlmProvider;
use crate::error::AgentError;

/// Drives `request` through model and tool rounds until a final answer.
///
/// `request.messages` grows in place: one assistant message per round that
/// requested tools, followed by one tool message per call.
///
/// The returned response carries the usage summed over all rounds.
///
/// # Errors
///
/// Returns [`AgentError::ToolLoopExceeded`] when the model still requests
/// tools after `max_iterations` rounds, and propagates provider errors.
/// Tool failures are not errors here; they reach the model as tool results.
pub async fn agentic_loop(
    provider: &dyn LlmProvider,
    request: &mut ChatRequest,
    dispatch: &dyn ToolDispatch,
    max_iterations: usize,
) -> Result<ChatResponse, AgentError> {
    let mut usage = TokenUsage::default();

    for round in 0..max_iterations {
        let mut response = provider.chat(request).await?;
        usage.accumulate(&response.usage);

        if response.tool_calls.is_empty() {
            debug!(round, total_tokens = usage.total_tokens, "model returned final answer");
            response.usage = usage;
            return Ok(response);
        }

        debug!(round, calls = response.tool_calls.len(), "model requested tools");
        let calls = std::mem::take(&mut response.tool_calls);
        request
            .messages
            .push(assistant_tool_calls_message(calls.clone()));

        for call in &calls {
            let result = dispatch.dispatch(call).await;
            debug!(
                tool = %call.name,
                id = %call.id,
                is_error = result.is_error,
                "tool result appended"
            );
            request
                .messages
                .push(tool_message(&result.tool_call_id, &result.content));
        }
    }

    Err(AgentError::ToolLoopExceeded { max_iterations })
}
