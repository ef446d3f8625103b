//! Backend collaborators reached over HTTP.
//!
//! The agents never talk to a data source directly: tools dispatch through
//! the traits in this module, so the orchestrator can run against the hosted
//! services or against in-process fakes.
//!
//! | trait | hosted implementation |
//! |-------|-----------------------|
//! | [`DocumentRetriever`] | Vertex AI RAG `retrieveContexts` |
//! | [`TabularStore`] | BigQuery REST `jobs.query` |
//! | [`WebSearch`] | Programmable Search JSON API, DuckDuckGo fallback |

pub mod bigquery;
pub mod http;
pub mod retrieval;
pub mod web_search;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::agent::config::AgentConfig;
use crate::error::AgentError;

pub use bigquery::BigQueryStore;
pub use retrieval::VertexRagRetriever;
pub use web_search::{DuckDuckGoSearch, ProgrammableSearch};

/// A passage returned by the document index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Passage {
    /// Source document URI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_uri: Option<String>,
    /// Passage text.
    pub text: String,
    /// Vector distance to the query (lower is closer).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
}

/// Rows returned by a warehouse query.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct QueryRows {
    /// Column names in result order.
    pub columns: Vec<String>,
    /// One JSON object per row, keyed by column name.
    pub rows: Vec<Map<String, Value>>,
    /// Total rows the query produced, before truncation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_rows: Option<u64>,
}

/// Schema description of the warehouse dataset, cached in session state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DatabaseSettings {
    /// Backend kind (always `"BigQuery"` for the hosted store).
    pub use_database: String,
    /// Project that owns the dataset.
    pub bq_project_id: String,
    /// Dataset id.
    pub bq_dataset_id: String,
    /// DDL for each table followed by a few sample rows.
    pub bq_ddl_schema: String,
}

/// A web search hit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchHit {
    /// Result title.
    pub title: String,
    /// Result URL.
    pub url: String,
    /// Snippet text, when the engine provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

/// Query string in, ranked passages out.
#[async_trait]
pub trait DocumentRetriever: Send + Sync {
    /// Retrieves passages relevant to `query`.
    async fn retrieve(&self, query: &str) -> Result<Vec<Passage>, AgentError>;
}

/// SQL in, rows out.
#[async_trait]
pub trait TabularStore: Send + Sync {
    /// Executes `sql` and returns at most `max_rows` rows.
    async fn query(&self, sql: &str, max_rows: usize) -> Result<QueryRows, AgentError>;

    /// Describes the dataset (DDL plus sample rows) for NL2SQL prompts.
    async fn database_settings(&self) -> Result<DatabaseSettings, AgentError>;
}

/// Query in, snippets out.
#[async_trait]
pub trait WebSearch: Send + Sync {
    /// Engine name for logging.
    fn name(&self) -> &'static str;

    /// Searches the web for `query`, returning at most `top_k` hits.
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchHit>, AgentError>;
}

/// The set of backends the tools dispatch to.
#[derive(Clone)]
pub struct Backends {
    /// Strategy document index.
    pub retriever: Arc<dyn DocumentRetriever>,
    /// Network and municipality data warehouse.
    pub warehouse: Arc<dyn TabularStore>,
    /// Web search engine.
    pub search: Arc<dyn WebSearch>,
}

impl Backends {
    /// Builds the hosted backends from configuration.
    ///
    /// Uses Programmable Search when both its API key and engine id are
    /// configured, otherwise the DuckDuckGo Instant Answer API.
    #[must_use]
    pub fn from_config(config: &AgentConfig) -> Self {
        let client = http::build_client(config.timeout);

        if config.rag_corpus.is_none() {
            warn!("RAG_CORPUS is not set; retrieve_documents calls will fail");
        }

        let search: Arc<dyn WebSearch> = match (&config.search_api_key, &config.search_engine_id)
        {
            (Some(key), Some(cx)) => Arc::new(ProgrammableSearch::new(
                client.clone(),
                key.clone(),
                cx.clone(),
            )),
            _ => Arc::new(DuckDuckGoSearch::new(client.clone())),
        };

        Self {
            retriever: Arc::new(VertexRagRetriever::new(client.clone(), config)),
            warehouse: Arc::new(BigQueryStore::new(client, config)),
            search,
        }
    }
}

impl std::fmt::Debug for Backends {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backends")
            .field("search", &self.search.name())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_selects_search_engine() {
        let config = AgentConfig::builder()
            .api_key("t")
            .project("p")
            .build()
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(Backends::from_config(&config).search.name(), "duckduckgo");

        let config = AgentConfig::builder()
            .api_key("t")
            .project("p")
            .search_credentials("key", "cx")
            .build()
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(
            Backends::from_config(&config).search.name(),
            "programmable_search"
        );
    }

    #[test]
    fn test_passage_serialization_skips_missing_fields() {
        let p = Passage {
            source_uri: None,
            text: "Q2 focus on Berlin growth".to_string(),
            distance: None,
        };
        let json = serde_json::to_string(&p).unwrap_or_default();
        assert_eq!(json, r#"{"text":"Q2 focus on Berlin growth"}"#);
    }
}
