//! # ngni-agent
//!
//! Network growth and investment planning agent.
//!
//! A planning question is classified by keyword into one of three fixed
//! branches. Each branch runs specialist agents in order over strategy
//! documents (Vertex AI RAG), network and municipality data (BigQuery via
//! NL2SQL) and market context (web search). A synthesizer then combines
//! their labelled outputs into a JSON ranking of municipalities.
//!
//! ```text
//! HTTP POST /query ─┐
//!                   ├─► SessionStore ─► Orchestrator ─► agents ─► synthesizer
//! CLI query ────────┘
//! ```
//!
//! ## Modules
//!
//! - [`agent`]: providers, agents, tools, routing and orchestration
//! - [`backend`]: retrieval, BigQuery and web search clients
//! - [`session`]: in-memory session store
//! - [`server`]: axum HTTP endpoint (feature `server`)
//! - [`cli`]: command-line interface

pub mod agent;
pub mod backend;
pub mod cli;
pub mod error;
#[cfg(feature = "server")]
pub mod server;
pub mod session;

pub use agent::{AgentConfig, Orchestrator, QueryOutcome, RoutedOutcome, classify_query};
pub use error::{AgentError, CommandError, Error, Result};
pub use session::{Session, SessionStore};
