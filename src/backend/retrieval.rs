//! Vertex AI RAG retrieval over the strategy report corpus.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use super::{DocumentRetriever, Passage, http};
use crate::agent::config::AgentConfig;
use crate::error::AgentError;

const BACKEND: &str = "retrieval";

/// Retriever backed by the `retrieveContexts` endpoint.
pub struct VertexRagRetriever {
    client: reqwest::Client,
    endpoint: String,
    token: String,
    corpus: Option<String>,
    top_k: usize,
    distance_threshold: f64,
}

#[derive(Debug, Deserialize)]
struct RetrieveResponse {
    #[serde(default)]
    contexts: Option<ContextList>,
}

#[derive(Debug, Deserialize)]
struct ContextList {
    #[serde(default)]
    contexts: Vec<RagContext>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RagContext {
    #[serde(default)]
    source_uri: Option<String>,
    #[serde(default)]
    text: String,
    #[serde(default)]
    distance: Option<f64>,
}

impl VertexRagRetriever {
    /// Creates a retriever for the configured project, location and corpus.
    #[must_use]
    pub fn new(client: reqwest::Client, config: &AgentConfig) -> Self {
        Self {
            client,
            endpoint: format!(
                "https://{loc}-aiplatform.googleapis.com/v1/projects/{project}/locations/{loc}:retrieveContexts",
                loc = config.location,
                project = config.project,
            ),
            token: config.api_key.clone(),
            corpus: config.rag_corpus.clone(),
            top_k: config.rag_top_k,
            distance_threshold: config.rag_distance_threshold,
        }
    }

    fn request_body(&self, corpus: &str, query: &str) -> Value {
        json!({
            "vertex_rag_store": {
                "rag_resources": [{ "rag_corpus": corpus }]
            },
            "query": {
                "text": query,
                "rag_retrieval_config": {
                    "top_k": self.top_k,
                    "filter": { "vector_distance_threshold": self.distance_threshold }
                }
            }
        })
    }

    fn into_passages(response: RetrieveResponse) -> Vec<Passage> {
        response
            .contexts
            .map(|list| list.contexts)
            .unwrap_or_default()
            .into_iter()
            .filter(|c| !c.text.trim().is_empty())
            .map(|c| Passage {
                source_uri: c.source_uri,
                text: c.text,
                distance: c.distance,
            })
            .collect()
    }
}

#[async_trait]
impl DocumentRetriever for VertexRagRetriever {
    async fn retrieve(&self, query: &str) -> Result<Vec<Passage>, AgentError> {
        let corpus = self
            .corpus
            .as_deref()
            .ok_or_else(|| AgentError::backend(BACKEND, "RAG_CORPUS is not configured"))?;

        debug!(target: "retrieval", query, top_k = self.top_k, "retrieving contexts");

        let request = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .json(&self.request_body(corpus, query));

        let response: RetrieveResponse = http::send_json(BACKEND, request).await?;
        Ok(Self::into_passages(response))
    }
}
