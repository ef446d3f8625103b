//! Tool executors that dispatch tool calls to backends and sub-agents.
//!
//! [`ToolExecutor`] maps backend tool names to the retrieval, warehouse
//! and search backends (plus the NL2SQL model for `query_bigquery`).
//! [`AgentToolExecutor`] maps the root agent's `call_*_agent` tools to
//! sub-agent runs that use a [`ToolExecutor`] for their own tools.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use super::config::AgentConfig;
use super::database::DatabaseAgent;
use super::message::TokenUsage;
use super::nl2sql::{
    Nl2SqlAgent, VALIDATION_ROW_LIMIT, clean_sql, ensure_limit, ensure_read_only,
};
use super::prompt::{PromptSet, build_nl2sql_prompt};
use super::provider::LlmProvider;
use super::rag::RagAgent;
use super::search::SearchAgent;
use super::tool::{
    CALL_DB_AGENT, CALL_RAG_AGENT, CALL_SEARCH_AGENT, QUERY_BIGQUERY, RETRIEVE_DOCUMENTS,
    RUN_BIGQUERY_VALIDATION, ToolCall, ToolResult, WEB_SEARCH,
};
use super::traits::{Agent, execute_with_tools};
use crate::backend::{Backends, DatabaseSettings};
use crate::error::AgentError;

/// Maximum raw byte length of tool argument JSON from the LLM.
const MAX_TOOL_ARGS_LEN: usize = 100_000;
/// Default number of web search results.
const DEFAULT_SEARCH_TOP_K: usize = 5;
/// Maximum `top_k` for the `web_search` tool.
const MAX_SEARCH_TOP_K: usize = 10;

/// Executes a tool call. Failures are reported in the [`ToolResult`].
#[async_trait]
pub trait ToolDispatch: Send + Sync {
    /// Runs `call` and returns its result.
    async fn dispatch(&self, call: &ToolCall) -> ToolResult;
}

fn parse_args<T: for<'de> Deserialize<'de>>(tool: &str, args: &str) -> Result<T, AgentError> {
    serde_json::from_str(args).map_err(|e| AgentError::tool(tool, format!("invalid arguments: {e}")))
}

fn oversized(call: &ToolCall) -> Option<ToolResult> {
    (call.arguments.len() > MAX_TOOL_ARGS_LEN).then(|| {
        ToolResult::error(
            call,
            format!(
                "tool arguments too large ({} bytes, max {MAX_TOOL_ARGS_LEN})",
                call.arguments.len()
            ),
        )
    })
}

fn into_result(call: &ToolCall, result: Result<String, AgentError>) -> ToolResult {
    match result {
        Ok(content) => ToolResult::ok(call, content),
        Err(e) => {
            warn!(tool = call.name, error = %e, "tool call failed");
            ToolResult::error(call, e.to_string())
        }
    }
}

/// Executes backend tool calls.
///
/// Holds the backends, the provider used for NL2SQL generation and the
/// dataset schema the generator writes SQL against.
pub struct ToolExecutor {
    backends: Backends,
    provider: Arc<dyn LlmProvider>,
    nl2sql: Nl2SqlAgent,
    settings: Option<Arc<DatabaseSettings>>,
    usage: Mutex<TokenUsage>,
}

impl ToolExecutor {
    /// Creates a new executor over the given backends.
    #[must_use]
    pub fn new(
        backends: Backends,
        provider: Arc<dyn LlmProvider>,
        config: &AgentConfig,
        prompts: &PromptSet,
    ) -> Self {
        Self {
            backends,
            provider,
            nl2sql: Nl2SqlAgent::new(config, &prompts.nl2sql),
            settings: None,
            usage: Mutex::new(TokenUsage::default()),
        }
    }

    /// Sets the dataset schema used by `query_bigquery`.
    #[must_use]
    pub fn with_settings(mut self, settings: Option<Arc<DatabaseSettings>>) -> Self {
        self.settings = settings;
        self
    }

    /// The dataset schema used by `query_bigquery`, if loaded.
    #[must_use]
    pub fn settings(&self) -> Option<&DatabaseSettings> {
        self.settings.as_deref()
    }

    /// Tokens spent by NL2SQL generation so far.
    #[must_use]
    pub fn usage(&self) -> TokenUsage {
        self.usage.lock().map(|u| *u).unwrap_or_default()
    }

    // -----------------------------------------------------------------------
    // Tool implementations
    // -----------------------------------------------------------------------

    /// Retrieves strategy passages. Returns a JSON array of passages.
    async fn tool_retrieve_documents(&self, args: &str) -> Result<String, AgentError> {
        #[derive(Deserialize)]
        struct Args {
            query: String,
        }
        let args: Args = parse_args(RETRIEVE_DOCUMENTS, args)?;
        if args.query.trim().is_empty() {
            return Err(AgentError::tool(RETRIEVE_DOCUMENTS, "query cannot be empty"));
        }

        let passages = self.backends.retriever.retrieve(&args.query).await?;
        debug!(passages = passages.len(), "retrieved strategy passages");
        serde_json::to_string(&passages)
            .map_err(|e| AgentError::tool(RETRIEVE_DOCUMENTS, e.to_string()))
    }

    /// Writes SQL for a question. Returns the SQL text.
    async fn tool_query_bigquery(&self, args: &str) -> Result<String, AgentError> {
        #[derive(Deserialize)]
        struct Args {
            question: String,
        }
        let args: Args = parse_args(QUERY_BIGQUERY, args)?;
        if args.question.trim().is_empty() {
            return Err(AgentError::tool(QUERY_BIGQUERY, "question cannot be empty"));
        }

        let prompt = build_nl2sql_prompt(&args.question, self.settings.as_deref());
        let response = self.nl2sql.execute(&*self.provider, &prompt).await?;
        if let Ok(mut usage) = self.usage.lock() {
            usage.accumulate(&response.usage);
        }

        let sql = clean_sql(&response.content);
        if sql.is_empty() {
            return Err(AgentError::tool(QUERY_BIGQUERY, "model returned no SQL"));
        }
        info!(sql = %sql, "generated SQL");
        Ok(sql)
    }

    /// Runs read-only SQL. Returns `{query_result, error_message}`.
    ///
    /// Warehouse errors are reported in `error_message` so the model can
    /// correct the SQL; guard violations fail the call.
    async fn tool_run_bigquery_validation(&self, args: &str) -> Result<String, AgentError> {
        #[derive(Deserialize)]
        struct Args {
            sql: String,
        }
        let args: Args = parse_args(RUN_BIGQUERY_VALIDATION, args)?;
        let sql = clean_sql(&args.sql);
        ensure_read_only(&sql)?;
        let sql = ensure_limit(&sql);

        let outcome = match self
            .backends
            .warehouse
            .query(&sql, VALIDATION_ROW_LIMIT)
            .await
        {
            Ok(rows) => {
                debug!(rows = rows.rows.len(), "validation query succeeded");
                json!({ "query_result": rows.rows, "error_message": Value::Null })
            }
            Err(e) => {
                warn!(error = %e, "validation query failed");
                json!({
                    "query_result": Value::Null,
                    "error_message": format!("Invalid SQL: {e}"),
                })
            }
        };
        Ok(outcome.to_string())
    }

    /// Searches the web. Returns a JSON array of hits.
    async fn tool_web_search(&self, args: &str) -> Result<String, AgentError> {
        #[derive(Deserialize)]
        struct Args {
            query: String,
            #[serde(default)]
            top_k: Option<usize>,
        }
        let args: Args = parse_args(WEB_SEARCH, args)?;
        if args.query.trim().is_empty() {
            return Err(AgentError::tool(WEB_SEARCH, "query cannot be empty"));
        }
        let top_k = args
            .top_k
            .unwrap_or(DEFAULT_SEARCH_TOP_K)
            .clamp(1, MAX_SEARCH_TOP_K);

        let hits = self.backends.search.search(&args.query, top_k).await?;
        debug!(
            engine = self.backends.search.name(),
            hits = hits.len(),
            "web search complete"
        );
        serde_json::to_string(&hits).map_err(|e| AgentError::tool(WEB_SEARCH, e.to_string()))
    }
}

#[async_trait]
impl ToolDispatch for ToolExecutor {
    async fn dispatch(&self, call: &ToolCall) -> ToolResult {
        if let Some(rejected) = oversized(call) {
            return rejected;
        }

        let result = match call.name.as_str() {
            RETRIEVE_DOCUMENTS => self.tool_retrieve_documents(&call.arguments).await,
            QUERY_BIGQUERY => self.tool_query_bigquery(&call.arguments).await,
            RUN_BIGQUERY_VALIDATION => self.tool_run_bigquery_validation(&call.arguments).await,
            WEB_SEARCH => self.tool_web_search(&call.arguments).await,
            other => Err(AgentError::tool(other, "unknown tool")),
        };

        into_result(call, result)
    }
}

/// Executes the root agent's agent tools.
///
/// Each `call_*_agent` call runs the named sub-agent to completion, with
/// the wrapped [`ToolExecutor`] serving the sub-agent's own tool calls.
pub struct AgentToolExecutor {
    provider: Arc<dyn LlmProvider>,
    tools: ToolExecutor,
    rag: RagAgent,
    db: DatabaseAgent,
    search: SearchAgent,
    usage: Mutex<TokenUsage>,
}

impl AgentToolExecutor {
    /// Creates the executor. `tools` serves the sub-agents' tool calls.
    #[must_use]
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        tools: ToolExecutor,
        config: &AgentConfig,
        prompts: &PromptSet,
    ) -> Self {
        let db = DatabaseAgent::new(config, &prompts.db, tools.settings());
        Self {
            provider,
            rag: RagAgent::new(config, prompts.rag.clone()),
            db,
            search: SearchAgent::new(config, prompts.search.clone()),
            tools,
            usage: Mutex::new(TokenUsage::default()),
        }
    }

    /// Tokens spent by sub-agents and NL2SQL generation so far.
    #[must_use]
    pub fn usage(&self) -> TokenUsage {
        let mut total = self.usage.lock().map(|u| *u).unwrap_or_default();
        total.accumulate(&self.tools.usage());
        total
    }

    fn agent_for(&self, tool: &str) -> Option<&dyn Agent> {
        match tool {
            CALL_RAG_AGENT => Some(&self.rag),
            CALL_DB_AGENT => Some(&self.db),
            CALL_SEARCH_AGENT => Some(&self.search),
            _ => None,
        }
    }

    async fn run_agent(&self, call: &ToolCall) -> Result<String, AgentError> {
        #[derive(Deserialize)]
        struct Args {
            request: String,
        }

        let agent = self
            .agent_for(&call.name)
            .ok_or_else(|| AgentError::tool(&call.name, "unknown tool"))?;
        let args: Args = parse_args(&call.name, &call.arguments)?;
        if args.request.trim().is_empty() {
            return Err(AgentError::tool(&call.name, "request cannot be empty"));
        }

        debug!(agent = agent.name(), "running sub-agent");
        let response =
            execute_with_tools(agent, &*self.provider, &args.request, &self.tools).await?;
        if let Ok(mut usage) = self.usage.lock() {
            usage.accumulate(&response.usage);
        }
        Ok(response.content)
    }
}

#[async_trait]
impl ToolDispatch for AgentToolExecutor {
    async fn dispatch(&self, call: &ToolCall) -> ToolResult {
        if let Some(rejected) = oversized(call) {
            return rejected;
        }
        let result = self.run_agent(call).await;
        into_result(call, result)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
pub(crate) mod tests {
    use super::*;
    use crate::agent::message::{ChatRequest, ChatResponse};
    use crate::backend::{
        DocumentRetriever, Passage, QueryRows, SearchHit, TabularStore, WebSearch,
    };

    use serde_json::Map;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Retriever returning one fixed passage.
    pub(crate) struct MockRetriever;

    #[async_trait]
    impl DocumentRetriever for MockRetriever {
        async fn retrieve(&self, query: &str) -> Result<Vec<Passage>, AgentError> {
            Ok(vec![Passage {
                source_uri: Some("gs://strategy/2025-06.pdf".to_string()),
                text: format!("Q2 growth focus for: {query}"),
                distance: Some(0.21),
            }])
        }
    }

    /// Warehouse that records executed SQL and fails on a marker table.
    #[derive(Default)]
    pub(crate) struct MockWarehouse {
        pub(crate) executed: Mutex<Vec<String>>,
        pub(crate) settings_loads: AtomicUsize,
    }

    #[async_trait]
    impl TabularStore for MockWarehouse {
        async fn query(&self, sql: &str, max_rows: usize) -> Result<QueryRows, AgentError> {
            if let Ok(mut executed) = self.executed.lock() {
                executed.push(sql.to_string());
            }
            if sql.contains("missing_table") {
                return Err(AgentError::backend("bigquery", "Not found: Table missing_table"));
            }
            let mut row = Map::new();
            row.insert("municipality_code".to_string(), json!("11003"));
            row.insert("municipality_name".to_string(), json!("Pankow"));
            Ok(QueryRows {
                columns: vec!["municipality_code".to_string(), "municipality_name".to_string()],
                rows: vec![row; max_rows.min(1)],
                total_rows: Some(1),
            })
        }

        async fn database_settings(&self) -> Result<DatabaseSettings, AgentError> {
            self.settings_loads.fetch_add(1, Ordering::SeqCst);
            Ok(DatabaseSettings {
                use_database: "BigQuery".to_string(),
                bq_project_id: "demo".to_string(),
                bq_dataset_id: "h3_consumption".to_string(),
                bq_ddl_schema: "CREATE TABLE `demo.h3_consumption.vodafone_performance` \
                                (municipality_code STRING);"
                    .to_string(),
            })
        }
    }

    /// Search engine returning `top_k` numbered hits.
    pub(crate) struct MockSearch;

    #[async_trait]
    impl WebSearch for MockSearch {
        fn name(&self) -> &'static str {
            "mock_search"
        }

        async fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchHit>, AgentError> {
            Ok((0..top_k)
                .map(|i| SearchHit {
                    title: format!("{query} #{i}"),
                    url: format!("https://example.de/{i}"),
                    snippet: None,
                })
                .collect())
        }
    }

    pub(crate) fn mock_backends(warehouse: Arc<MockWarehouse>) -> Backends {
        Backends {
            retriever: Arc::new(MockRetriever),
            warehouse,
            search: Arc::new(MockSearch),
        }
    }

    /// Provider that answers every request with a fixed text and counts calls.
    pub(crate) struct EchoProvider {
        pub(crate) reply: String,
        pub(crate) calls: AtomicUsize,
    }

    impl EchoProvider {
        pub(crate) fn new(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl LlmProvider for EchoProvider {
        fn name(&self) -> &'static str {
            "echo"
        }

        async fn chat(&self, _request: &ChatRequest) -> Result<ChatResponse, AgentError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ChatResponse {
                content: self.reply.clone(),
                usage: TokenUsage {
                    prompt_tokens: 10,
                    completion_tokens: 5,
                    total_tokens: 15,
                },
                tool_calls: Vec::new(),
                finish_reason: Some("stop".to_string()),
            })
        }
    }

    pub(crate) fn test_config() -> AgentConfig {
        AgentConfig::builder()
            .api_key("t")
            .project("demo")
            .build()
            .unwrap_or_else(|_| unreachable!())
    }

    fn executor(reply: &str) -> (ToolExecutor, Arc<MockWarehouse>) {
        let warehouse = Arc::new(MockWarehouse::default());
        let executor = ToolExecutor::new(
            mock_backends(Arc::clone(&warehouse)),
            Arc::new(EchoProvider::new(reply)),
            &test_config(),
            &PromptSet::defaults(),
        );
        (executor, warehouse)
    }

    fn call(name: &str, args: &str) -> ToolCall {
        ToolCall {
            id: "call_1".to_string(),
            name: name.to_string(),
            arguments: args.to_string(),
        }
    }

    #[tokio::test]
    async fn test_retrieve_documents() {
        let (executor, _) = executor("");
        let result = executor
            .dispatch(&call(RETRIEVE_DOCUMENTS, r#"{"query":"Berlin mandate"}"#))
            .await;
        assert!(!result.is_error);
        assert_eq!(result.tool_call_id, "call_1");
        let passages: Value = serde_json::from_str(&result.content).unwrap_or_default();
        assert_eq!(passages[0]["source_uri"], "gs://strategy/2025-06.pdf");
    }

    #[tokio::test]
    async fn test_query_bigquery_strips_fences() {
        let (executor, _) = executor("```sql\nSELECT municipality_code FROM t;\n```");
        let result = executor
            .dispatch(&call(QUERY_BIGQUERY, r#"{"question":"areas with high churn"}"#))
            .await;
        assert!(!result.is_error);
        assert_eq!(result.content, "SELECT municipality_code FROM t");
        assert_eq!(executor.usage().total_tokens, 15);
    }

    #[tokio::test]
    async fn test_run_validation_appends_limit() {
        let (executor, warehouse) = executor("");
        let result = executor
            .dispatch(&call(
                RUN_BIGQUERY_VALIDATION,
                r#"{"sql":"SELECT municipality_code FROM t"}"#,
            ))
            .await;
        assert!(!result.is_error);
        let body: Value = serde_json::from_str(&result.content).unwrap_or_default();
        assert!(body["error_message"].is_null());
        assert_eq!(body["query_result"][0]["municipality_name"], "Pankow");
        let executed = warehouse.executed.lock().map(|e| e.clone()).unwrap_or_default();
        assert_eq!(executed, vec!["SELECT municipality_code FROM t LIMIT 80"]);
    }

    #[tokio::test]
    async fn test_run_validation_reports_warehouse_error() {
        let (executor, _) = executor("");
        let result = executor
            .dispatch(&call(
                RUN_BIGQUERY_VALIDATION,
                r#"{"sql":"SELECT * FROM missing_table"}"#,
            ))
            .await;
        assert!(!result.is_error);
        let body: Value = serde_json::from_str(&result.content).unwrap_or_default();
        assert!(body["query_result"].is_null());
        assert!(
            body["error_message"]
                .as_str()
                .is_some_and(|m| m.contains("missing_table"))
        );
    }

    #[tokio::test]
    async fn test_run_validation_rejects_writes() {
        let (executor, warehouse) = executor("");
        let result = executor
            .dispatch(&call(
                RUN_BIGQUERY_VALIDATION,
                r#"{"sql":"DELETE FROM vodafone_performance"}"#,
            ))
            .await;
        assert!(result.is_error);
        assert!(warehouse.executed.lock().map(|e| e.is_empty()).unwrap_or(false));
    }

    #[tokio::test]
    async fn test_web_search_clamps_top_k() {
        let (executor, _) = executor("");
        let result = executor
            .dispatch(&call(WEB_SEARCH, r#"{"query":"Pankow fibre","top_k":50}"#))
            .await;
        let hits: Value = serde_json::from_str(&result.content).unwrap_or_default();
        assert_eq!(hits.as_array().map(Vec::len), Some(MAX_SEARCH_TOP_K));

        let result = executor
            .dispatch(&call(WEB_SEARCH, r#"{"query":"Pankow fibre"}"#))
            .await;
        let hits: Value = serde_json::from_str(&result.content).unwrap_or_default();
        assert_eq!(hits.as_array().map(Vec::len), Some(DEFAULT_SEARCH_TOP_K));
    }

    #[tokio::test]
    async fn test_unknown_tool_and_bad_args() {
        let (executor, _) = executor("");
        let result = executor.dispatch(&call("drop_tables", "{}")).await;
        assert!(result.is_error);
        assert!(result.content.contains("unknown tool"));

        let result = executor.dispatch(&call(WEB_SEARCH, "not json")).await;
        assert!(result.is_error);
        assert!(result.content.contains("invalid arguments"));
    }

    #[tokio::test]
    async fn test_oversized_arguments() {
        let (executor, _) = executor("");
        let payload = format!(r#"{{"query":"{}"}}"#, "a".repeat(MAX_TOOL_ARGS_LEN));
        let result = executor.dispatch(&call(WEB_SEARCH, &payload)).await;
        assert!(result.is_error);
        assert!(result.content.contains("too large"));
    }

    #[tokio::test]
    async fn test_agent_tool_runs_sub_agent() {
        let provider: Arc<dyn LlmProvider> =
            Arc::new(EchoProvider::new(r#"{"status":"MANDATE_FOUND"}"#));
        let warehouse = Arc::new(MockWarehouse::default());
        let config = test_config();
        let prompts = PromptSet::defaults();
        let tools = ToolExecutor::new(
            mock_backends(warehouse),
            Arc::clone(&provider),
            &config,
            &prompts,
        );
        let executor = AgentToolExecutor::new(provider, tools, &config, &prompts);

        let result = executor
            .dispatch(&call(CALL_RAG_AGENT, r#"{"request":"find the Berlin mandate"}"#))
            .await;
        assert!(!result.is_error);
        assert_eq!(result.content, r#"{"status":"MANDATE_FOUND"}"#);
        assert_eq!(executor.usage().total_tokens, 15);

        let result = executor
            .dispatch(&call(RETRIEVE_DOCUMENTS, r#"{"query":"x"}"#))
            .await;
        assert!(result.is_error);
    }
}
