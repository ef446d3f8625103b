//! Database agent.
//!
//! Turns a request into SQL with `query_bigquery`, runs it with
//! `run_bigquery_validation` and returns the raw rows. The dataset schema
//! with sample rows is appended to its instruction when available.

use async_trait::async_trait;

use super::config::AgentConfig;
use super::prompt::with_schema;
use super::tool::{ToolDefinition, ToolSet};
use super::traits::Agent;
use crate::backend::DatabaseSettings;

/// Agent that answers requests from the BigQuery warehouse.
pub struct DatabaseAgent {
    model: String,
    max_tokens: u32,
    max_tool_iterations: usize,
    system_prompt: String,
}

impl DatabaseAgent {
    /// Creates a new database agent, embedding `settings` in its instruction.
    #[must_use]
    pub fn new(
        config: &AgentConfig,
        system_prompt: &str,
        settings: Option<&DatabaseSettings>,
    ) -> Self {
        Self {
            model: config.model.clone(),
            max_tokens: config.agent_max_tokens,
            max_tool_iterations: config.max_tool_iterations,
            system_prompt: with_schema(system_prompt, settings),
        }
    }
}

#[async_trait]
impl Agent for DatabaseAgent {
    fn name(&self) -> &'static str {
        "db_agent"
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
        ToolSet::db_tools().definitions().to_vec()
    }

    fn max_tool_iterations(&self) -> usize {
        self.max_tool_iterations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::tool::{QUERY_BIGQUERY, RUN_BIGQUERY_VALIDATION};

    #[test]
    fn test_instruction_carries_schema() {
        let config = AgentConfig::builder()
            .api_key("t")
            .project("p")
            .build()
            .unwrap_or_else(|_| unreachable!());
        let settings = DatabaseSettings {
            use_database: "BigQuery".to_string(),
            bq_project_id: "p".to_string(),
            bq_dataset_id: "h3_consumption".to_string(),
            bq_ddl_schema: "CREATE TABLE `p.h3_consumption.vodafone_performance` (x INT64);"
                .to_string(),
        };
        let agent = DatabaseAgent::new(&config, "BASE", Some(&settings));
        assert!(agent.system_prompt().starts_with("BASE"));
        assert!(agent.system_prompt().contains("vodafone_performance"));

        let names: Vec<_> = agent.tools().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec![QUERY_BIGQUERY, RUN_BIGQUERY_VALIDATION]);
    }

    #[test]
    fn test_instruction_without_schema() {
        let config = AgentConfig::builder()
            .api_key("t")
            .project("p")
            .build()
            .unwrap_or_else(|_| unreachable!());
        let agent = DatabaseAgent::new(&config, "BASE", None);
        assert_eq!(agent.system_prompt(), "BASE");
    }
}
