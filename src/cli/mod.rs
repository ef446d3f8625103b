//! CLI layer for ngni-agent.
//!
//! Provides the command-line interface using clap, with commands for
//! serving the HTTP endpoint, running and classifying queries, and managing
//! prompt templates.

pub mod commands;
pub mod output;
pub mod parser;

pub use commands::execute;
pub use output::OutputFormat;
pub use parser::{Cli, Commands, RoutingArg};
