//! Synthesizer agent for combining specialist outputs.
//!
//! Takes the labelled outputs of the branch's agents and produces the
//! ranking JSON object. Runs in JSON mode without tools.

use async_trait::async_trait;

use super::config::AgentConfig;
use super::traits::Agent;

/// Agent that synthesizes agent outputs into the ranking object.
pub struct SynthesizerAgent {
    model: String,
    max_tokens: u32,
    system_prompt: String,
}

impl SynthesizerAgent {
    /// Creates a new synthesizer agent with the given configuration and system prompt.
    #[must_use]
    pub fn new(config: &AgentConfig, system_prompt: String) -> Self {
        Self {
            model: config.synthesizer_model.clone(),
            max_tokens: config.synthesizer_max_tokens,
            system_prompt,
        }
    }
}

#[async_trait]
impl Agent for SynthesizerAgent {
    fn name(&self) -> &'static str {
        "synthesizer"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    fn json_mode(&self) -> bool {
        true
    }

    fn temperature(&self) -> f32 {
        0.0
    }

    fn max_tokens(&self) -> u32 {
        self.max_tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_properties() {
        use super::super::prompt::SYNTHESIZER_SYSTEM_PROMPT;
        let config = AgentConfig::builder()
            .api_key("t")
            .project("p")
            .synthesizer_model("google/gemini-2.5-pro")
            .build()
            .unwrap_or_else(|_| unreachable!());
        let agent = SynthesizerAgent::new(&config, SYNTHESIZER_SYSTEM_PROMPT.to_string());
        assert_eq!(agent.name(), "synthesizer");
        assert_eq!(agent.model(), "google/gemini-2.5-pro");
        assert!(agent.json_mode());
        assert!(agent.tools().is_empty());
        assert!(agent.system_prompt().contains("ranked_areas"));
    }
}
