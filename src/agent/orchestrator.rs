//! Orchestrator for the branch-and-synthesize query workflow.
//!
//! Coordinates the full query pipeline: classify → run the branch's
//! specialist agents in order → concatenate their outputs → synthesize the
//! ranking object.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use super::config::AgentConfig;
use super::database::DatabaseAgent;
use super::executor::{AgentToolExecutor, ToolExecutor};
use super::extract::parse_synthesis;
use super::message::TokenUsage;
use super::outcome::{QueryOutcome, RoutedOutcome, SourceOutput};
use super::prompt::{
    PromptSet, build_db_request, build_rag_request, build_search_request, build_synthesis_prompt,
    with_schema,
};
use super::provider::LlmProvider;
use super::rag::RagAgent;
use super::root::RootAgent;
use super::router::{AgentStep, QueryRoute, classify_query};
use super::search::SearchAgent;
use super::synthesizer::SynthesizerAgent;
use super::traits::{Agent, execute_with_tools};
use crate::backend::{Backends, DatabaseSettings};
use crate::error::AgentError;
use crate::session::{DATABASE_SETTINGS_KEY, Session};

/// Maximum query length in bytes.
const MAX_QUERY_LEN: usize = 10_000;

/// Orchestrates the agentic query workflow.
pub struct Orchestrator {
    provider: Arc<dyn LlmProvider>,
    backends: Backends,
    config: AgentConfig,
    prompts: PromptSet,
}

impl Orchestrator {
    /// Creates a new orchestrator with the given provider, backends and
    /// configuration.
    ///
    /// Loads prompt templates from the directory specified in
    /// [`AgentConfig::prompt_dir`], falling back to compiled-in defaults.
    pub fn new(provider: Arc<dyn LlmProvider>, backends: Backends, config: AgentConfig) -> Self {
        let prompts = PromptSet::load(config.prompt_dir.as_deref());
        Self {
            provider,
            backends,
            config,
            prompts,
        }
    }

    /// Replaces the prompt set.
    #[must_use]
    pub fn with_prompts(mut self, prompts: PromptSet) -> Self {
        self.prompts = prompts;
        self
    }

    /// The configuration this orchestrator runs with.
    #[must_use]
    pub const fn config(&self) -> &AgentConfig {
        &self.config
    }

    fn validate_query(query: &str) -> Result<(), AgentError> {
        if query.trim().is_empty() {
            return Err(AgentError::Orchestration {
                message: "Query cannot be empty".to_string(),
            });
        }

        if query.len() > MAX_QUERY_LEN {
            return Err(AgentError::Orchestration {
                message: format!(
                    "Query exceeds maximum length ({} bytes, max {MAX_QUERY_LEN})",
                    query.len()
                ),
            });
        }

        Ok(())
    }

    /// Returns the warehouse schema, loading it into `session` on first use.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Backend`] if the schema cannot be loaded.
    pub async fn database_settings(
        &self,
        session: &mut Session,
    ) -> Result<Arc<DatabaseSettings>, AgentError> {
        if let Some(cached) = session.state.get(DATABASE_SETTINGS_KEY) {
            match serde_json::from_value::<DatabaseSettings>(cached.clone()) {
                Ok(settings) => return Ok(Arc::new(settings)),
                Err(e) => warn!(error = %e, "discarding malformed cached database settings"),
            }
        }

        let settings = self.backends.warehouse.database_settings().await?;
        let value = serde_json::to_value(&settings).map_err(|e| AgentError::Orchestration {
            message: format!("Failed to cache database settings: {e}"),
        })?;
        session
            .state
            .insert(DATABASE_SETTINGS_KEY.to_string(), value);
        Ok(Arc::new(settings))
    }

    fn tool_executor(&self, settings: Option<Arc<DatabaseSettings>>) -> ToolExecutor {
        ToolExecutor::new(
            self.backends.clone(),
            Arc::clone(&self.provider),
            &self.config,
            &self.prompts,
        )
        .with_settings(settings)
    }

    /// Executes the deterministic query pipeline.
    ///
    /// # Steps
    ///
    /// 1. Validate and classify the query, selecting a branch
    /// 2. Load the warehouse schema when the branch queries the database
    /// 3. Run the branch's agents in order, each seeing earlier outputs
    /// 4. Concatenate the outputs under source labels
    /// 5. Synthesize and parse the ranking object
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] on invalid queries, schema loading, agent or
    /// synthesis API failures. Unparseable synthesis output is not an
    /// error: the outcome carries the error object instead.
    pub async fn query(
        &self,
        session: &mut Session,
        query: &str,
    ) -> Result<QueryOutcome, AgentError> {
        Self::validate_query(query)?;

        let start = Instant::now();
        let route = classify_query(query);
        let branch = route.branch();
        info!(
            branch = %branch,
            has_strategy = route.has_strategy,
            has_performance = route.has_performance,
            session = %session.key(),
            "routing query"
        );

        let settings = if branch.steps().contains(&AgentStep::Db) {
            Some(self.database_settings(session).await?)
        } else {
            None
        };

        let mut sources: Vec<SourceOutput> = Vec::with_capacity(branch.steps().len());
        for &step in branch.steps() {
            let output = self
                .run_step(step, query, route, &sources, settings.clone())
                .await
                .map_err(|e| AgentError::Orchestration {
                    message: format!("{} failed: {e}", step.agent_name()),
                })?;
            debug!(
                agent = step.agent_name(),
                tokens = output.usage.total_tokens,
                chars = output.content.len(),
                "agent step complete"
            );
            sources.push(output);
        }

        let user_msg = build_synthesis_prompt(query, &sources);
        let synthesizer = SynthesizerAgent::new(&self.config, self.prompts.synthesizer.clone());
        let synthesis = synthesizer.execute(&*self.provider, &user_msg).await?;

        let response = parse_synthesis(&synthesis.content);
        if response.get("raw_output").is_some() {
            warn!("synthesis output was not valid JSON; returning error object");
        }

        let mut usage = synthesis.usage;
        for source in &sources {
            usage.accumulate(&source.usage);
        }

        info!(
            branch = %branch,
            total_tokens = usage.total_tokens,
            elapsed = ?start.elapsed(),
            "query complete"
        );

        Ok(QueryOutcome {
            route,
            branch,
            sources,
            response,
            total_tokens: usage.total_tokens,
            elapsed: start.elapsed(),
        })
    }

    /// Runs one specialist agent of a branch.
    async fn run_step(
        &self,
        step: AgentStep,
        query: &str,
        route: QueryRoute,
        earlier: &[SourceOutput],
        settings: Option<Arc<DatabaseSettings>>,
    ) -> Result<SourceOutput, AgentError> {
        let tools = self.tool_executor(settings);

        let agent: Box<dyn Agent> = match step {
            AgentStep::Rag => Box::new(RagAgent::new(&self.config, self.prompts.rag.clone())),
            AgentStep::Db => Box::new(DatabaseAgent::new(
                &self.config,
                &self.prompts.db,
                tools.settings(),
            )),
            AgentStep::Search => {
                Box::new(SearchAgent::new(&self.config, self.prompts.search.clone()))
            }
        };

        let user_msg = match step {
            AgentStep::Rag => build_rag_request(query),
            AgentStep::Db => {
                let strategy = earlier
                    .iter()
                    .find(|s| s.step == AgentStep::Rag)
                    .map(|s| s.content.as_str());
                build_db_request(query, route, strategy)
            }
            AgentStep::Search => build_search_request(query, earlier),
        };

        debug!(agent = agent.name(), "running agent step");
        let response = execute_with_tools(&*agent, &*self.provider, &user_msg, &tools).await?;

        let mut usage = response.usage;
        usage.accumulate(&tools.usage());
        Ok(SourceOutput {
            step,
            content: response.content,
            usage,
        })
    }

    /// Executes the model-routed pipeline.
    ///
    /// The root coordinator agent decides which specialists to call through
    /// its agent tools and writes the final answer itself.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] on invalid queries, schema loading or API
    /// failures, or if the root agent exceeds its tool iterations.
    pub async fn query_llm_routed(
        &self,
        session: &mut Session,
        query: &str,
    ) -> Result<RoutedOutcome, AgentError> {
        Self::validate_query(query)?;

        let start = Instant::now();
        info!(session = %session.key(), "routing query through root agent");

        let settings = self.database_settings(session).await?;
        let root = RootAgent::new(
            &self.config,
            with_schema(&self.prompts.root, Some(&*settings)),
        );
        let agent_tools = AgentToolExecutor::new(
            Arc::clone(&self.provider),
            self.tool_executor(Some(settings)),
            &self.config,
            &self.prompts,
        );
        let response = execute_with_tools(&root, &*self.provider, query, &agent_tools).await?;

        let mut usage: TokenUsage = response.usage;
        usage.accumulate(&agent_tools.usage());

        info!(
            total_tokens = usage.total_tokens,
            elapsed = ?start.elapsed(),
            "routed query complete"
        );

        Ok(RoutedOutcome {
            response: response.content,
            total_tokens: usage.total_tokens,
            elapsed: start.elapsed(),
        })
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("provider", &self.provider.name())
            .field("backends", &self.backends)
            .field("config", &self.config)
            .field("prompts", &self.prompts)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::agent::executor::tests::{MockWarehouse, mock_backends, test_config};
    use crate::agent::message::{ChatRequest, ChatResponse, Role};
    use crate::agent::prompt::{
        DB_SYSTEM_PROMPT, NL2SQL_SYSTEM_PROMPT, RAG_SYSTEM_PROMPT, ROOT_SYSTEM_PROMPT,
        SEARCH_SYSTEM_PROMPT, SYNTHESIZER_SYSTEM_PROMPT,
    };
    use crate::agent::router::Branch;
    use crate::agent::tool::{CALL_RAG_AGENT, RUN_BIGQUERY_VALIDATION, ToolCall};

    use std::sync::Mutex;
    use std::sync::atomic::Ordering;

    use async_trait::async_trait;

    /// Provider that plays every agent role, keyed by system prompt.
    ///
    /// The db agent validates SQL once before answering; the root agent
    /// calls the rag agent once before answering.
    struct ScriptedProvider {
        synthesis: String,
        requests: Mutex<Vec<(&'static str, ChatRequest)>>,
    }

    impl ScriptedProvider {
        fn new(synthesis: &str) -> Self {
            Self {
                synthesis: synthesis.to_string(),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn roles(&self) -> Vec<&'static str> {
            self.requests
                .lock()
                .map(|r| r.iter().map(|(role, _)| *role).collect())
                .unwrap_or_default()
        }

        fn request_for(&self, role: &str) -> ChatRequest {
            self.requests
                .lock()
                .ok()
                .and_then(|r| r.iter().find(|(n, _)| *n == role).map(|(_, req)| req.clone()))
                .unwrap_or_else(|| panic!("no request for {role}"))
        }
    }

    fn role_of(system: &str) -> &'static str {
        if system.starts_with(DB_SYSTEM_PROMPT) {
            "db"
        } else if system == RAG_SYSTEM_PROMPT {
            "rag"
        } else if system == SEARCH_SYSTEM_PROMPT {
            "search"
        } else if system == SYNTHESIZER_SYSTEM_PROMPT {
            "synthesizer"
        } else if system == NL2SQL_SYSTEM_PROMPT {
            "nl2sql"
        } else if system.starts_with(ROOT_SYSTEM_PROMPT) {
            "root"
        } else {
            "unknown"
        }
    }

    fn text(content: &str) -> ChatResponse {
        ChatResponse {
            content: content.to_string(),
            usage: TokenUsage {
                prompt_tokens: 8,
                completion_tokens: 2,
                total_tokens: 10,
            },
            tool_calls: Vec::new(),
            finish_reason: Some("stop".to_string()),
        }
    }

    fn tool_call(name: &str, arguments: &str) -> ChatResponse {
        ChatResponse {
            content: String::new(),
            usage: TokenUsage::default(),
            tool_calls: vec![ToolCall {
                id: "call_0".to_string(),
                name: name.to_string(),
                arguments: arguments.to_string(),
            }],
            finish_reason: Some("tool_calls".to_string()),
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AgentError> {
            let role = role_of(&request.messages[0].content);
            if let Ok(mut requests) = self.requests.lock() {
                requests.push((role, request.clone()));
            }
            let after_tool = request
                .messages
                .last()
                .is_some_and(|m| m.role == Role::Tool);

            Ok(match (role, after_tool) {
                ("rag", _) => text(
                    r#"{"status":"MANDATE_FOUND","strategic_mandate_key":"Berlin iPhone Focus"}"#,
                ),
                ("db", false) => tool_call(
                    RUN_BIGQUERY_VALIDATION,
                    r#"{"sql":"SELECT municipality_code FROM t"}"#,
                ),
                ("db", true) => text(r#"[{"municipality_code":"11003"}]"#),
                ("search", _) => text(r#"{"competitor_activity":"Telekom fibre rollout"}"#),
                ("synthesizer", _) => text(&self.synthesis),
                ("root", false) => tool_call(CALL_RAG_AGENT, r#"{"request":"find the mandate"}"#),
                ("root", true) => text("Pankow ranks first."),
                _ => text("SELECT 1"),
            })
        }
    }

    const RANKING: &str = "```json\n{\"status\":\"success\",\"ranked_areas\":[{\"rank\":1,\
                           \"municipality_code\":\"11003\",\"municipality_name\":\"Pankow\",\
                           \"ranking_score\":91.0}]}\n```";

    fn orchestrator(
        provider: Arc<ScriptedProvider>,
        warehouse: Arc<MockWarehouse>,
    ) -> Orchestrator {
        Orchestrator::new(provider, mock_backends(warehouse), test_config())
            .with_prompts(PromptSet::defaults())
    }

    #[tokio::test]
    async fn test_strategy_and_performance_branch() {
        let provider = Arc::new(ScriptedProvider::new(RANKING));
        let warehouse = Arc::new(MockWarehouse::default());
        let orch = orchestrator(Arc::clone(&provider), Arc::clone(&warehouse));
        let mut session = Session::new(None, None);

        let outcome = orch
            .query(&mut session, "Strategy vs network performance in Mitte")
            .await
            .unwrap_or_else(|e| panic!("query failed: {e}"));

        assert_eq!(outcome.branch, Branch::StrategyAndPerformance);
        assert_eq!(
            provider.roles(),
            vec!["rag", "db", "db", "search", "synthesizer"]
        );
        assert_eq!(outcome.sources.len(), 3);
        assert_eq!(
            outcome.response["ranked_areas"][0]["municipality_name"],
            "Pankow"
        );
        assert!(session.state.contains_key(DATABASE_SETTINGS_KEY));
        assert_eq!(warehouse.settings_loads.load(Ordering::SeqCst), 1);

        let db = provider.request_for("db");
        assert!(db.messages[0].content.contains("CREATE TABLE"));
        assert!(db.messages[1].content.contains("Berlin iPhone Focus"));
        assert!(db.messages[1].content.contains("Vodafone performance data"));

        let search = provider.request_for("search");
        assert!(search.messages[1].content.contains("<db_agent>"));

        let synthesis = provider.request_for("synthesizer");
        assert!(synthesis.json_mode);
        assert_eq!(synthesis.temperature, Some(0.0));
        assert!(synthesis.messages[1].content.contains("=== SOURCE: STRATEGY DOCUMENTS"));
        assert!(synthesis.messages[1].content.contains("NETWORK DATA (BIGQUERY)"));

        // rag 10 + db 10 + search 10 + synthesis 10
        assert_eq!(outcome.total_tokens, 40);
    }

    #[tokio::test]
    async fn test_strategy_only_branch_skips_database() {
        let provider = Arc::new(ScriptedProvider::new(RANKING));
        let warehouse = Arc::new(MockWarehouse::default());
        let orch = orchestrator(Arc::clone(&provider), Arc::clone(&warehouse));
        let mut session = Session::new(None, None);

        let outcome = orch
            .query(&mut session, "What is our strategic mandate for Berlin?")
            .await
            .unwrap_or_else(|e| panic!("query failed: {e}"));

        assert_eq!(outcome.branch, Branch::StrategyOnly);
        assert_eq!(provider.roles(), vec!["rag", "search", "synthesizer"]);
        assert_eq!(warehouse.settings_loads.load(Ordering::SeqCst), 0);
        assert!(session.state.is_empty());
    }

    #[tokio::test]
    async fn test_default_branch_uses_external_data_only() {
        let provider = Arc::new(ScriptedProvider::new(RANKING));
        let warehouse = Arc::new(MockWarehouse::default());
        let orch = orchestrator(Arc::clone(&provider), Arc::clone(&warehouse));
        let mut session = Session::new(None, None);

        let outcome = orch
            .query(&mut session, "Rank municipalities by population")
            .await
            .unwrap_or_else(|e| panic!("query failed: {e}"));

        assert_eq!(outcome.branch, Branch::Default);
        assert_eq!(provider.roles(), vec!["db", "db", "search", "synthesizer"]);
        let db = provider.request_for("db");
        assert!(
            db.messages[1]
                .content
                .contains("external foundation data (`berlin_external_foundation_view`) only")
        );
        assert!(!db.messages[1].content.contains("<strategic_mandate>"));
        let executed = warehouse.executed.lock().map(|e| e.clone()).unwrap_or_default();
        assert_eq!(executed, vec!["SELECT municipality_code FROM t LIMIT 80"]);
    }

    #[tokio::test]
    async fn test_database_settings_cached_in_session() {
        let provider = Arc::new(ScriptedProvider::new(RANKING));
        let warehouse = Arc::new(MockWarehouse::default());
        let orch = orchestrator(provider, Arc::clone(&warehouse));
        let mut session = Session::new(Some("analyst"), Some("s-1"));

        for _ in 0..2 {
            orch.query(&mut session, "Rank municipalities by population")
                .await
                .unwrap_or_else(|e| panic!("query failed: {e}"));
        }
        assert_eq!(warehouse.settings_loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unparseable_synthesis_returns_error_object() {
        let provider = Arc::new(ScriptedProvider::new("Pankow should be first."));
        let orch = orchestrator(provider, Arc::new(MockWarehouse::default()));
        let mut session = Session::new(None, None);

        let outcome = orch
            .query(&mut session, "What is our strategy?")
            .await
            .unwrap_or_else(|e| panic!("query failed: {e}"));

        assert_eq!(outcome.response["status"], "error");
        assert_eq!(outcome.response["raw_output"], "Pankow should be first.");
        assert!(!outcome.is_parsed());
    }

    #[tokio::test]
    async fn test_rejects_empty_and_oversized_queries() {
        let provider = Arc::new(ScriptedProvider::new(RANKING));
        let orch = orchestrator(Arc::clone(&provider), Arc::new(MockWarehouse::default()));
        let mut session = Session::new(None, None);

        let empty = orch.query(&mut session, "   ").await;
        assert!(matches!(empty, Err(AgentError::Orchestration { .. })));

        let long = "a".repeat(MAX_QUERY_LEN + 1);
        let oversized = orch.query(&mut session, &long).await;
        assert!(matches!(oversized, Err(AgentError::Orchestration { .. })));

        assert!(provider.roles().is_empty());
    }

    #[tokio::test]
    async fn test_llm_routed_query() {
        let provider = Arc::new(ScriptedProvider::new(RANKING));
        let orch = orchestrator(Arc::clone(&provider), Arc::new(MockWarehouse::default()));
        let mut session = Session::new(None, None);

        let outcome = orch
            .query_llm_routed(&mut session, "Rank districts for the iPhone strategy")
            .await
            .unwrap_or_else(|e| panic!("routed query failed: {e}"));

        assert_eq!(outcome.response, "Pankow ranks first.");
        assert_eq!(provider.roles(), vec!["root", "rag", "root"]);
        let root = provider.request_for("root");
        assert_eq!(root.top_p, Some(0.1));
        assert_eq!(root.tools.len(), 3);
        assert!(root.messages[0].content.starts_with(ROOT_SYSTEM_PROMPT));
        assert!(
            root.messages[0]
                .content
                .contains("CREATE TABLE `demo.h3_consumption.vodafone_performance`")
        );
        // root 10 + rag 10
        assert_eq!(outcome.total_tokens, 10 + 10);
    }
}
