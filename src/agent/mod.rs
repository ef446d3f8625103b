//! Agent system for network investment planning.
//!
//! Specialist agents share a pluggable provider abstraction backed by
//! OpenAI-compatible APIs (Vertex AI by default) and call the data
//! backends through tools.
//!
//! # Architecture
//!
//! ```text
//! User query → Orchestrator
//!   ├── classify_query → Branch
//!   ├── for each step of the branch, in order:
//!   │   ├── RagAgent      (retrieve_documents)
//!   │   ├── DatabaseAgent (query_bigquery → run_bigquery_validation)
//!   │   └── SearchAgent   (web_search)
//!   ├── concatenate labelled outputs
//!   └── SynthesizerAgent → ranking JSON (or the error object)
//!
//! Model-routed mode:
//!   RootAgent ── call_rag_agent / call_db_agent / call_search_agent
//! ```

pub mod agentic_loop;
pub mod client;
pub mod config;
pub mod database;
pub mod executor;
pub mod extract;
pub mod message;
pub mod nl2sql;
pub mod orchestrator;
pub mod outcome;
pub mod prompt;
pub mod provider;
pub mod providers;
pub mod rag;
pub mod root;
pub mod router;
pub mod search;
pub mod synthesizer;
pub mod tool;
pub mod traits;

// Re-export key types
pub use config::AgentConfig;
pub use database::DatabaseAgent;
pub use executor::{AgentToolExecutor, ToolDispatch, ToolExecutor};
pub use extract::{extract_json, parse_synthesis};
pub use message::{ChatMessage, ChatRequest, ChatResponse, Role, TokenUsage};
pub use nl2sql::{Nl2SqlAgent, Nl2SqlMethod};
pub use orchestrator::Orchestrator;
pub use outcome::{QueryOutcome, RoutedOutcome, SourceOutput};
pub use prompt::PromptSet;
pub use provider::LlmProvider;
pub use rag::RagAgent;
pub use root::RootAgent;
pub use router::{AgentStep, Branch, QueryRoute, classify_query};
pub use search::SearchAgent;
pub use synthesizer::SynthesizerAgent;
pub use tool::{ToolCall, ToolDefinition, ToolResult, ToolSet};
pub use traits::{Agent, AgentResponse, execute_with_tools};
