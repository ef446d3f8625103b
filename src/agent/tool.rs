//! Tool type definitions for function-calling.
//!
//! Provides provider-agnostic types for tool definitions, calls, and results,
//! plus the per-agent tool sets. Backend tools reach the retrieval index,
//! the warehouse and web search; agent tools let the root coordinator call
//! the specialist agents.

use serde::{Deserialize, Serialize};
use serde_json::json;

/// Retrieval tool name.
pub const RETRIEVE_DOCUMENTS: &str = "retrieve_documents";
/// NL2SQL generation tool name.
pub const QUERY_BIGQUERY: &str = "query_bigquery";
/// SQL execution tool name.
pub const RUN_BIGQUERY_VALIDATION: &str = "run_bigquery_validation";
/// Web search tool name.
pub const WEB_SEARCH: &str = "web_search";
/// Agent tool for the strategy-document agent.
pub const CALL_RAG_AGENT: &str = "call_rag_agent";
/// Agent tool for the database agent.
pub const CALL_DB_AGENT: &str = "call_db_agent";
/// Agent tool for the search agent.
pub const CALL_SEARCH_AGENT: &str = "call_search_agent";

/// A tool definition that can be sent to an LLM for function-calling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name (must match a dispatch arm in an executor).
    pub name: String,
    /// Human-readable description of what the tool does.
    pub description: String,
    /// JSON Schema object describing the tool's parameters.
    pub parameters: serde_json::Value,
}

/// A tool call requested by the LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique identifier for this call (assigned by the provider).
    pub id: String,
    /// Name of the tool to invoke.
    pub name: String,
    /// JSON-encoded arguments for the tool.
    pub arguments: String,
}

/// The result of executing a tool call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// ID of the tool call this result corresponds to.
    pub tool_call_id: String,
    /// Result content (JSON string on success, error message on failure).
    pub content: String,
    /// Whether this result represents an error.
    pub is_error: bool,
}

impl ToolResult {
    /// Builds a successful result.
    #[must_use]
    pub fn ok(call: &ToolCall, content: String) -> Self {
        Self {
            tool_call_id: call.id.clone(),
            content,
            is_error: false,
        }
    }

    /// Builds an error result.
    #[must_use]
    pub fn error(call: &ToolCall, message: String) -> Self {
        Self {
            tool_call_id: call.id.clone(),
            content: message,
            is_error: true,
        }
    }
}

/// A set of tool definitions scoped to an agent role.
///
/// - rag agent: `retrieve_documents`
/// - db agent: `query_bigquery`, `run_bigquery_validation`
/// - search agent: `web_search`
/// - root agent: `call_rag_agent`, `call_db_agent`, `call_search_agent`
/// - synthesizer: none
#[derive(Debug, Clone, Default)]
pub struct ToolSet {
    definitions: Vec<ToolDefinition>,
}

impl ToolSet {
    /// Returns the tool definitions in this set.
    #[must_use]
    pub fn definitions(&self) -> &[ToolDefinition] {
        &self.definitions
    }

    /// Returns `true` if this set contains no tools.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Returns the number of tools in this set.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Tool set for the strategy-document agent.
    #[must_use]
    pub fn rag_tools() -> Self {
        Self {
            definitions: vec![def_retrieve_documents()],
        }
    }

    /// Tool set for the database agent.
    #[must_use]
    pub fn db_tools() -> Self {
        Self {
            definitions: vec![def_query_bigquery(), def_run_bigquery_validation()],
        }
    }

    /// Tool set for the search agent.
    #[must_use]
    pub fn search_tools() -> Self {
        Self {
            definitions: vec![def_web_search()],
        }
    }

    /// Tool set for the root coordinator: one tool per specialist agent.
    #[must_use]
    pub fn root_tools() -> Self {
        Self {
            definitions: vec![
                def_agent_tool(
                    CALL_RAG_AGENT,
                    "Retrieves insights from strategy reports. Do NOT use for structured \
                     data, BigQuery or network data.",
                ),
                def_agent_tool(
                    CALL_DB_AGENT,
                    "Answers questions over the BigQuery network and municipality data \
                     using NL2SQL. Returns raw rows as JSON.",
                ),
                def_agent_tool(
                    CALL_SEARCH_AGENT,
                    "Retrieves municipality-specific market context from web search.",
                ),
            ],
        }
    }

    /// Empty tool set (no tools available).
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }
}

// ---------------------------------------------------------------------------
// Tool schema definitions
// ---------------------------------------------------------------------------

fn def_retrieve_documents() -> ToolDefinition {
    ToolDefinition {
        name: RETRIEVE_DOCUMENTS.to_string(),
        description: "Search the strategy report corpus for passages relevant to a query. \
                       Returns passages with source URI and vector distance."
            .to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Natural-language retrieval query."
                }
            },
            "required": ["query"],
            "additionalProperties": false
        }),
    }
}

fn def_query_bigquery() -> ToolDefinition {
    ToolDefinition {
        name: QUERY_BIGQUERY.to_string(),
        description: "Generate a BigQuery Standard SQL statement that answers a \
                       natural-language question over the dataset schema. Returns SQL only; \
                       run it with run_bigquery_validation."
            .to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "question": {
                    "type": "string",
                    "description": "Natural-language question to translate into SQL."
                }
            },
            "required": ["question"],
            "additionalProperties": false
        }),
    }
}

fn def_run_bigquery_validation() -> ToolDefinition {
    ToolDefinition {
        name: RUN_BIGQUERY_VALIDATION.to_string(),
        description: "Validate and execute a read-only BigQuery SQL statement. Returns \
                       {query_result, error_message}; fix the SQL and retry on error."
            .to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "sql": {
                    "type": "string",
                    "description": "SELECT or WITH statement to execute."
                }
            },
            "required": ["sql"],
            "additionalProperties": false
        }),
    }
}

fn def_web_search() -> ToolDefinition {
    ToolDefinition {
        name: WEB_SEARCH.to_string(),
        description: "Search the web. Returns result titles, URLs and snippets.".to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Search query string."
                },
                "top_k": {
                    "type": "integer",
                    "description": "Maximum number of results. Defaults to 5.",
                    "default": 5
                }
            },
            "required": ["query"],
            "additionalProperties": false
        }),
    }
}

fn def_agent_tool(name: &str, description: &str) -> ToolDefinition {
    ToolDefinition {
        name: name.to_string(),
        description: description.to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "request": {
                    "type": "string",
                    "description": "Task for the agent, including any context from earlier steps."
                }
            },
            "required": ["request"],
            "additionalProperties": false
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(ts: &ToolSet) -> Vec<&str> {
        ts.definitions().iter().map(|d| d.name.as_str()).collect()
    }

    #[test]
    fn test_toolsets_per_agent() {
        assert_eq!(names(&ToolSet::rag_tools()), vec![RETRIEVE_DOCUMENTS]);
        assert_eq!(
            names(&ToolSet::db_tools()),
            vec![QUERY_BIGQUERY, RUN_BIGQUERY_VALIDATION]
        );
        assert_eq!(names(&ToolSet::search_tools()), vec![WEB_SEARCH]);
        assert_eq!(
            names(&ToolSet::root_tools()),
            vec![CALL_RAG_AGENT, CALL_DB_AGENT, CALL_SEARCH_AGENT]
        );
    }

    #[test]
    fn test_toolset_none() {
        let ts = ToolSet::none();
        assert!(ts.is_empty());
        assert_eq!(ts.len(), 0);
    }

    #[test]
    fn test_tool_result_constructors() {
        let call = ToolCall {
            id: "call_9".to_string(),
            name: WEB_SEARCH.to_string(),
            arguments: "{}".to_string(),
        };
        assert!(!ToolResult::ok(&call, "[]".to_string()).is_error);
        let err = ToolResult::error(&call, "boom".to_string());
        assert!(err.is_error);
        assert_eq!(err.tool_call_id, "call_9");
    }

    #[test]
    fn test_all_definitions_have_valid_schemas() {
        let all = [
            ToolSet::rag_tools(),
            ToolSet::db_tools(),
            ToolSet::search_tools(),
            ToolSet::root_tools(),
        ];
        for def in all.iter().flat_map(ToolSet::definitions) {
            assert!(!def.description.is_empty());
            assert_eq!(def.parameters["type"], "object");
            assert!(def.parameters["required"].is_array());
        }
    }
}
