//! Root coordinator agent.
//!
//! Used for model-driven routing: each specialist agent is exposed to it
//! as a tool, and it decides which to call and in what order.

use async_trait::async_trait;

use super::config::AgentConfig;
use super::tool::{ToolDefinition, ToolSet};
use super::traits::Agent;

/// Agent that coordinates the specialists through agent tools.
pub struct RootAgent {
    model: String,
    max_tokens: u32,
    max_tool_iterations: usize,
    system_prompt: String,
}

impl RootAgent {
    /// Creates a new root coordinator agent.
    #[must_use]
    pub fn new(config: &AgentConfig, system_prompt: String) -> Self {
        Self {
            model: config.model.clone(),
            max_tokens: config.synthesizer_max_tokens,
            max_tool_iterations: config.max_tool_iterations,
            system_prompt,
        }
    }
}

#[async_trait]
impl Agent for RootAgent {
    fn name(&self) -> &'static str {
        "root_agent"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    fn temperature(&self) -> f32 {
        0.0
    }

    fn top_p(&self) -> Option<f32> {
        Some(0.1)
    }

    fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    fn tools(&self) -> Vec<ToolDefinition> {
        ToolSet::root_tools().definitions().to_vec()
    }

    fn max_tool_iterations(&self) -> usize {
        self.max_tool_iterations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sampling_parameters() {
        let config = AgentConfig::builder()
            .api_key("t")
            .project("p")
            .build()
            .unwrap_or_else(|_| unreachable!());
        let agent = RootAgent::new(&config, String::new());
        let request = agent.request("rank districts", agent.tools());
        assert_eq!(request.temperature, Some(0.0));
        assert_eq!(request.top_p, Some(0.1));
        assert_eq!(request.tools.len(), 3);
        assert!(!request.json_mode);
    }
}
