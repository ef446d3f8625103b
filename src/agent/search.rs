//! Market-context search agent.

use async_trait::async_trait;

use super::config::AgentConfig;
use super::tool::{ToolDefinition, ToolSet};
use super::traits::Agent;

/// Agent that gathers municipality-specific external context from the web.
pub struct SearchAgent {
    model: String,
    max_tokens: u32,
    max_tool_iterations: usize,
    system_prompt: String,
}

impl SearchAgent {
    /// Creates a new search agent.
    #[must_use]
    pub fn new(config: &AgentConfig, system_prompt: String) -> Self {
        Self {
            model: config.model.clone(),
            max_tokens: config.agent_max_tokens,
            max_tool_iterations: config.max_tool_iterations,
            system_prompt,
        }
    }
}

#[async_trait]
impl Agent for SearchAgent {
    fn name(&self) -> &'static str {
        "search_agent"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    fn temperature(&self) -> f32 {
        0.01
    }

    fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    fn tools(&self) -> Vec<ToolDefinition> {
        ToolSet::search_tools().definitions().to_vec()
    }

    fn max_tool_iterations(&self) -> usize {
        self.max_tool_iterations
    }
}
