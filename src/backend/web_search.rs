//! Web search engines.
//!
//! [`ProgrammableSearch`] calls the Google Custom Search JSON API and needs
//! an API key plus an engine id. [`DuckDuckGoSearch`] uses the keyless
//! Instant Answer API and returns far sparser results.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{SearchHit, WebSearch, http};
use crate::error::AgentError;

const BACKEND: &str = "web_search";

/// The Custom Search API returns at most ten results per page.
const MAX_PAGE_SIZE: usize = 10;

/// Google Programmable Search engine.
pub struct ProgrammableSearch {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    engine_id: String,
}

#[derive(Debug, Deserialize)]
struct CustomSearchResponse {
    #[serde(default)]
    items: Vec<CustomSearchItem>,
}

#[derive(Debug, Deserialize)]
struct CustomSearchItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: Option<String>,
}

impl ProgrammableSearch {
    /// Creates an engine for the given API key and engine id.
    #[must_use]
    pub fn new(client: reqwest::Client, api_key: String, engine_id: String) -> Self {
        Self {
            client,
            endpoint: "https://www.googleapis.com/customsearch/v1".to_string(),
            api_key,
            engine_id,
        }
    }
}

#[async_trait]
impl WebSearch for ProgrammableSearch {
    fn name(&self) -> &'static str {
        "programmable_search"
    }

    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchHit>, AgentError> {
        let num = top_k.clamp(1, MAX_PAGE_SIZE).to_string();
        debug!(target: "web_search", query, num = %num, "programmable search");

        let request = self.client.get(&self.endpoint).query(&[
            ("key", self.api_key.as_str()),
            ("cx", self.engine_id.as_str()),
            ("q", query),
            ("num", num.as_str()),
        ]);

        let response: CustomSearchResponse = http::send_json(BACKEND, request).await?;
        Ok(response
            .items
            .into_iter()
            .filter(|item| !item.link.is_empty())
            .map(|item| SearchHit {
                title: item.title,
                url: item.link,
                snippet: item.snippet,
            })
            .collect())
    }
}

/// DuckDuckGo Instant Answer engine.
pub struct DuckDuckGoSearch {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct DuckDuckGoResponse {
    #[serde(rename = "AbstractText", default)]
    abstract_text: String,
    #[serde(rename = "AbstractURL", default)]
    abstract_url: String,
    #[serde(rename = "RelatedTopics", default)]
    related_topics: Vec<RelatedTopic>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RelatedTopic {
    Result {
        #[serde(rename = "Text")]
        text: String,
        #[serde(rename = "FirstURL")]
        first_url: String,
    },
    Group {
        #[serde(rename = "Topics")]
        topics: Vec<RelatedTopic>,
    },
}

impl DuckDuckGoSearch {
    /// Creates the keyless engine.
    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            endpoint: "https://api.duckduckgo.com/".to_string(),
        }
    }

    fn collect_hits(response: DuckDuckGoResponse, top_k: usize) -> Vec<SearchHit> {
        fn walk(topics: Vec<RelatedTopic>, hits: &mut Vec<SearchHit>, limit: usize) {
            for topic in topics {
                if hits.len() >= limit {
                    break;
                }
                match topic {
                    RelatedTopic::Result { text, first_url } => {
                        if !text.is_empty() && !first_url.is_empty() {
                            hits.push(SearchHit {
                                title: text.clone(),
                                url: first_url,
                                snippet: Some(text),
                            });
                        }
                    }
                    RelatedTopic::Group { topics } => walk(topics, hits, limit),
                }
            }
        }

        let mut hits = Vec::new();
        if !response.abstract_text.is_empty() {
            hits.push(SearchHit {
                title: "Summary".to_string(),
                url: response.abstract_url,
                snippet: Some(response.abstract_text),
            });
        }
        walk(response.related_topics, &mut hits, top_k);
        hits.truncate(top_k);
        hits
    }
}

#[async_trait]
impl WebSearch for DuckDuckGoSearch {
    fn name(&self) -> &'static str {
        "duckduckgo"
    }

    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchHit>, AgentError> {
        debug!(target: "web_search", query, top_k, "duckduckgo search");

        let request = self.client.get(&self.endpoint).query(&[
            ("q", query),
            ("format", "json"),
            ("no_html", "1"),
        ]);

        let response: DuckDuckGoResponse = http::send_json(BACKEND, request).await?;
        Ok(Self::collect_hits(response, top_k))
    }
}
