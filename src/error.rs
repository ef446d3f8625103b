//! Error types for ngni-agent.
//!
//! [`AgentError`] covers the agent system (configuration, providers,
//! backends, tools, orchestration). [`CommandError`] covers CLI command
//! execution. [`Error`] unifies both for the CLI layer.

use thiserror::Error;

/// Errors produced by the agent system.
#[derive(Debug, Error)]
pub enum AgentError {
    /// No API key or access token was configured.
    #[error(
        "no API key configured (set GOOGLE_ACCESS_TOKEN, NGNI_API_KEY or OPENAI_API_KEY)"
    )]
    ApiKeyMissing,

    /// A required configuration value is missing.
    #[error("missing configuration: {name}")]
    ConfigMissing {
        /// Environment variable or setting name.
        name: String,
    },

    /// The configured provider name is not supported.
    #[error("unsupported LLM provider: {name}")]
    UnsupportedProvider {
        /// Provider name as configured.
        name: String,
    },

    /// The configured NL2SQL method is not supported.
    #[error("unknown NL2SQL method: {method}")]
    UnknownNl2SqlMethod {
        /// Method name as configured.
        method: String,
    },

    /// The LLM API request failed.
    #[error("API request failed: {message}")]
    ApiRequest {
        /// Error description.
        message: String,
        /// HTTP status code, when known.
        status: Option<u16>,
    },

    /// The model output could not be parsed.
    #[error("failed to parse response: {message}")]
    ResponseParse {
        /// Parse error description.
        message: String,
        /// Raw model output.
        content: String,
    },

    /// A backend service (retrieval, BigQuery, web search) failed.
    #[error("{backend} backend error: {message}")]
    Backend {
        /// Backend name.
        backend: &'static str,
        /// Error description.
        message: String,
    },

    /// A tool call failed.
    #[error("tool '{name}' failed: {message}")]
    ToolExecution {
        /// Tool name.
        name: String,
        /// Error description.
        message: String,
    },

    /// The model kept requesting tools past the iteration limit.
    #[error("tool-calling loop exceeded {max_iterations} iterations")]
    ToolLoopExceeded {
        /// Configured iteration limit.
        max_iterations: usize,
    },

    /// The orchestration pipeline failed.
    #[error("orchestration error: {message}")]
    Orchestration {
        /// Error description.
        message: String,
    },
}

impl AgentError {
    /// Builds a [`AgentError::Backend`] error.
    pub fn backend(backend: &'static str, message: impl Into<String>) -> Self {
        Self::Backend {
            backend,
            message: message.into(),
        }
    }

    /// Builds a [`AgentError::ToolExecution`] error.
    pub fn tool(name: &str, message: impl Into<String>) -> Self {
        Self::ToolExecution {
            name: name.to_string(),
            message: message.into(),
        }
    }
}

/// Errors produced by CLI commands.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The command failed while executing.
    #[error("{0}")]
    ExecutionFailed(String),

    /// Output could not be formatted.
    #[error("output formatting failed: {0}")]
    OutputFormat(String),
}

/// Top-level error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Agent system error.
    #[error(transparent)]
    Agent(#[from] AgentError),

    /// Command error.
    #[error(transparent)]
    Command(#[from] CommandError),

    /// I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result alias using the crate [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_error_display() {
        let err = AgentError::backend("bigquery", "HTTP 403");
        assert_eq!(err.to_string(), "bigquery backend error: HTTP 403");
    }

    #[test]
    fn test_tool_error_display() {
        let err = AgentError::tool("web_search", "not configured");
        assert_eq!(err.to_string(), "tool 'web_search' failed: not configured");
    }

    #[test]
    fn test_error_from_agent_error() {
        let err: Error = AgentError::ApiKeyMissing.into();
        assert!(err.to_string().contains("GOOGLE_ACCESS_TOKEN"));
    }
}
