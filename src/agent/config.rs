//! Agent configuration with builder pattern and environment variable support.
//!
//! Configuration is resolved in order: explicit values → environment variables → defaults.

use std::path::PathBuf;
use std::time::Duration;

use super::nl2sql::Nl2SqlMethod;
use crate::error::AgentError;

/// Default model for every agent (Vertex AI OpenAI-compatible model id).
const DEFAULT_MODEL: &str = "google/gemini-2.5-flash";
/// Default cloud location.
const DEFAULT_LOCATION: &str = "europe-west1";
/// Default BigQuery dataset.
const DEFAULT_BQ_DATASET: &str = "h3_consumption";
/// Default sub-agent max tokens.
const DEFAULT_AGENT_MAX_TOKENS: u32 = 4096;
/// Default synthesizer max tokens. The ranking object lists every
/// municipality, so it gets more room than the sub-agents.
const DEFAULT_SYNTHESIZER_MAX_TOKENS: u32 = 8192;
/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 120;
/// Default maximum tool-calling loop iterations.
const DEFAULT_MAX_TOOL_ITERATIONS: usize = 10;
/// Default number of passages retrieved from the document index.
const DEFAULT_RAG_TOP_K: usize = 10;
/// Default vector distance threshold for retrieval.
const DEFAULT_RAG_DISTANCE_THRESHOLD: f64 = 0.6;
/// Default number of sessions kept in memory.
const DEFAULT_MAX_SESSIONS: usize = 1024;

/// Configuration for the agent system.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// LLM provider name (e.g., "openai").
    pub provider: String,
    /// API key or OAuth access token for the model endpoint and backends.
    pub api_key: String,
    /// Optional base URL override for the model endpoint.
    pub base_url: Option<String>,
    /// Cloud project hosting the model and the data backends.
    pub project: String,
    /// Cloud location (region).
    pub location: String,
    /// Model for the root, rag, db and search agents.
    pub model: String,
    /// Model for the final synthesis step.
    pub synthesizer_model: String,
    /// Model used by the `query_bigquery` tool to write SQL.
    pub nl2sql_model: String,
    /// NL2SQL strategy.
    pub nl2sql_method: Nl2SqlMethod,
    /// Maximum tokens for sub-agent responses.
    pub agent_max_tokens: u32,
    /// Maximum tokens for the synthesis response.
    pub synthesizer_max_tokens: u32,
    /// Request timeout for model and backend calls.
    pub timeout: Duration,
    /// Maximum tool-calling loop iterations before aborting.
    pub max_tool_iterations: usize,
    /// Project that owns the BigQuery dataset.
    pub bq_project: String,
    /// BigQuery dataset id.
    pub bq_dataset: String,
    /// Full resource name of the retrieval corpus.
    pub rag_corpus: Option<String>,
    /// Passages returned per retrieval.
    pub rag_top_k: usize,
    /// Maximum vector distance for retrieved passages.
    pub rag_distance_threshold: f64,
    /// Programmable Search API key.
    pub search_api_key: Option<String>,
    /// Programmable Search engine id.
    pub search_engine_id: Option<String>,
    /// Directory containing prompt template files.
    pub prompt_dir: Option<PathBuf>,
    /// Maximum number of in-memory sessions.
    pub max_sessions: usize,
}

impl AgentConfig {
    /// Creates a new builder for `AgentConfig`.
    #[must_use]
    pub fn builder() -> AgentConfigBuilder {
        AgentConfigBuilder::default()
    }

    /// Creates configuration from environment variables with defaults.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ApiKeyMissing`] if no token is found, or
    /// [`AgentError::ConfigMissing`] if no cloud project is set.
    pub fn from_env() -> Result<Self, AgentError> {
        Self::builder().from_env().build()
    }

    /// Returns the model endpoint base URL.
    ///
    /// Uses the explicit override when set, otherwise the Vertex AI
    /// OpenAI-compatible endpoint for the configured project and location.
    #[must_use]
    pub fn resolved_base_url(&self) -> String {
        self.base_url.clone().unwrap_or_else(|| {
            format!(
                "https://{loc}-aiplatform.googleapis.com/v1/projects/{project}/locations/{loc}/endpoints/openapi",
                loc = self.location,
                project = self.project,
            )
        })
    }
}

/// Builder for [`AgentConfig`].
#[derive(Debug, Clone, Default)]
pub struct AgentConfigBuilder {
    provider: Option<String>,
    api_key: Option<String>,
    base_url: Option<String>,
    project: Option<String>,
    location: Option<String>,
    model: Option<String>,
    synthesizer_model: Option<String>,
    nl2sql_model: Option<String>,
    nl2sql_method: Option<String>,
    agent_max_tokens: Option<u32>,
    synthesizer_max_tokens: Option<u32>,
    timeout: Option<Duration>,
    max_tool_iterations: Option<usize>,
    bq_project: Option<String>,
    bq_dataset: Option<String>,
    rag_corpus: Option<String>,
    rag_top_k: Option<usize>,
    rag_distance_threshold: Option<f64>,
    search_api_key: Option<String>,
    search_engine_id: Option<String>,
    prompt_dir: Option<PathBuf>,
    max_sessions: Option<usize>,
}

fn env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl AgentConfigBuilder {
    /// Populates unset fields from environment variables.
    #[must_use]
    pub fn from_env(mut self) -> Self {
        if self.provider.is_none() {
            self.provider = env("NGNI_PROVIDER");
        }
        if self.api_key.is_none() {
            self.api_key = env("GOOGLE_ACCESS_TOKEN")
                .or_else(|| env("NGNI_API_KEY"))
                .or_else(|| env("OPENAI_API_KEY"));
        }
        if self.base_url.is_none() {
            self.base_url = env("NGNI_BASE_URL");
        }
        if self.project.is_none() {
            self.project = env("GOOGLE_CLOUD_PROJECT");
        }
        if self.location.is_none() {
            self.location = env("GOOGLE_CLOUD_LOCATION");
        }
        if self.model.is_none() {
            self.model = env("NGNI_MODEL");
        }
        if self.synthesizer_model.is_none() {
            self.synthesizer_model = env("NGNI_SYNTHESIZER_MODEL");
        }
        if self.nl2sql_model.is_none() {
            self.nl2sql_model = env("NGNI_NL2SQL_MODEL");
        }
        if self.nl2sql_method.is_none() {
            self.nl2sql_method = env("NL2SQL_METHOD");
        }
        if self.timeout.is_none() {
            self.timeout = env("NGNI_TIMEOUT_SECS")
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs);
        }
        if self.bq_project.is_none() {
            self.bq_project = env("BQ_PROJECT_ID");
        }
        if self.bq_dataset.is_none() {
            self.bq_dataset = env("BQ_DATASET_ID");
        }
        if self.rag_corpus.is_none() {
            self.rag_corpus = env("RAG_CORPUS");
        }
        if self.search_api_key.is_none() {
            self.search_api_key = env("GOOGLE_SEARCH_API_KEY");
        }
        if self.search_engine_id.is_none() {
            self.search_engine_id = env("GOOGLE_SEARCH_ENGINE_ID");
        }
        if self.prompt_dir.is_none() {
            self.prompt_dir = env("NGNI_PROMPT_DIR").map(PathBuf::from);
        }
        if self.max_sessions.is_none() {
            self.max_sessions = env("NGNI_MAX_SESSIONS").and_then(|v| v.parse().ok());
        }
        self
    }

    /// Sets the LLM provider name.
    #[must_use]
    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Sets the API key or access token.
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the base URL override.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the cloud project.
    #[must_use]
    pub fn project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    /// Sets the cloud location.
    #[must_use]
    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Sets the sub-agent model.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the synthesizer model.
    #[must_use]
    pub fn synthesizer_model(mut self, model: impl Into<String>) -> Self {
        self.synthesizer_model = Some(model.into());
        self
    }

    /// Sets the NL2SQL model.
    #[must_use]
    pub fn nl2sql_model(mut self, model: impl Into<String>) -> Self {
        self.nl2sql_model = Some(model.into());
        self
    }

    /// Sets the NL2SQL method name (e.g. `"BASELINE"`).
    #[must_use]
    pub fn nl2sql_method(mut self, method: impl Into<String>) -> Self {
        self.nl2sql_method = Some(method.into());
        self
    }

    /// Sets the sub-agent max tokens.
    #[must_use]
    pub const fn agent_max_tokens(mut self, n: u32) -> Self {
        self.agent_max_tokens = Some(n);
        self
    }

    /// Sets the synthesizer max tokens.
    #[must_use]
    pub const fn synthesizer_max_tokens(mut self, n: u32) -> Self {
        self.synthesizer_max_tokens = Some(n);
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub const fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }

    /// Sets the maximum tool-calling loop iterations.
    #[must_use]
    pub const fn max_tool_iterations(mut self, n: usize) -> Self {
        self.max_tool_iterations = Some(n);
        self
    }

    /// Sets the BigQuery project.
    #[must_use]
    pub fn bq_project(mut self, project: impl Into<String>) -> Self {
        self.bq_project = Some(project.into());
        self
    }

    /// Sets the BigQuery dataset.
    #[must_use]
    pub fn bq_dataset(mut self, dataset: impl Into<String>) -> Self {
        self.bq_dataset = Some(dataset.into());
        self
    }

    /// Sets the retrieval corpus resource name.
    #[must_use]
    pub fn rag_corpus(mut self, corpus: impl Into<String>) -> Self {
        self.rag_corpus = Some(corpus.into());
        self
    }

    /// Sets the Programmable Search credentials.
    #[must_use]
    pub fn search_credentials(
        mut self,
        api_key: impl Into<String>,
        engine_id: impl Into<String>,
    ) -> Self {
        self.search_api_key = Some(api_key.into());
        self.search_engine_id = Some(engine_id.into());
        self
    }

    /// Sets the prompt template directory.
    #[must_use]
    pub fn prompt_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.prompt_dir = Some(dir.into());
        self
    }

    /// Sets the session capacity.
    #[must_use]
    pub const fn max_sessions(mut self, n: usize) -> Self {
        self.max_sessions = Some(n);
        self
    }

    /// Builds the [`AgentConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ApiKeyMissing`] if no API key was set,
    /// [`AgentError::ConfigMissing`] if no project was set, or
    /// [`AgentError::UnknownNl2SqlMethod`] for an unsupported NL2SQL method.
    pub fn build(self) -> Result<AgentConfig, AgentError> {
        let api_key = self.api_key.ok_or(AgentError::ApiKeyMissing)?;
        let project = self.project.ok_or_else(|| AgentError::ConfigMissing {
            name: "GOOGLE_CLOUD_PROJECT".to_string(),
        })?;
        let nl2sql_method = self
            .nl2sql_method
            .as_deref()
            .map_or(Ok(Nl2SqlMethod::Baseline), Nl2SqlMethod::parse)?;
        let model = self.model.unwrap_or_else(|| DEFAULT_MODEL.to_string());

        Ok(AgentConfig {
            provider: self.provider.unwrap_or_else(|| "openai".to_string()),
            api_key,
            base_url: self.base_url,
            bq_project: self.bq_project.unwrap_or_else(|| project.clone()),
            project,
            location: self
                .location
                .unwrap_or_else(|| DEFAULT_LOCATION.to_string()),
            synthesizer_model: self.synthesizer_model.unwrap_or_else(|| model.clone()),
            nl2sql_model: self.nl2sql_model.unwrap_or_else(|| model.clone()),
            model,
            nl2sql_method,
            agent_max_tokens: self.agent_max_tokens.unwrap_or(DEFAULT_AGENT_MAX_TOKENS),
            synthesizer_max_tokens: self
                .synthesizer_max_tokens
                .unwrap_or(DEFAULT_SYNTHESIZER_MAX_TOKENS),
            timeout: self
                .timeout
                .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
            max_tool_iterations: self
                .max_tool_iterations
                .unwrap_or(DEFAULT_MAX_TOOL_ITERATIONS),
            bq_dataset: self
                .bq_dataset
                .unwrap_or_else(|| DEFAULT_BQ_DATASET.to_string()),
            rag_corpus: self.rag_corpus,
            rag_top_k: self.rag_top_k.unwrap_or(DEFAULT_RAG_TOP_K),
            rag_distance_threshold: self
                .rag_distance_threshold
                .unwrap_or(DEFAULT_RAG_DISTANCE_THRESHOLD),
            search_api_key: self.search_api_key,
            search_engine_id: self.search_engine_id,
            prompt_dir: self.prompt_dir,
            max_sessions: self.max_sessions.unwrap_or(DEFAULT_MAX_SESSIONS),
        })
    }
}
