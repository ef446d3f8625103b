//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// NGNI agent: network growth and investment planning assistant.
///
/// Routes planning questions across strategy documents, BigQuery network
/// data and web search, then synthesizes a municipality ranking.
#[derive(Parser, Debug)]
#[command(name = "ngni-agent")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output (debug logging).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, default_value = "text", global = true)]
    pub format: String,

    /// Directory containing prompt template files.
    #[arg(long, env = "NGNI_PROMPT_DIR", global = true)]
    pub prompt_dir: Option<PathBuf>,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Query routing mode.
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RoutingArg {
    /// Keyword classification into a fixed branch, then synthesis.
    #[default]
    Deterministic,
    /// The root agent picks specialists through agent tools.
    Llm,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP query server.
    ///
    /// Serves `POST /query` and `GET /health`.
    #[cfg(feature = "server")]
    #[command(after_help = r#"Examples:
  ngni-agent serve                           # Listen on 0.0.0.0:8080
  ngni-agent serve --host 127.0.0.1 --port 9000
  GOOGLE_CLOUD_PROJECT=my-proj ngni-agent serve
"#)]
    Serve {
        /// Host to bind to.
        #[arg(long, env = "NGNI_HOST", default_value = "0.0.0.0")]
        host: String,

        /// Port to bind to.
        #[arg(long, env = "NGNI_PORT", default_value = "8080")]
        port: u16,
    },

    /// Run a planning query once and print the result.
    ///
    /// Requires `GOOGLE_CLOUD_PROJECT` and an access token.
    #[command(after_help = r#"Examples:
  ngni-agent query "Which Berlin districts should we prioritise?"
  ngni-agent query "What is our strategic mandate and network performance?"
  ngni-agent query "Rank districts for fibre" --routing llm
  ngni-agent --format json query "Top areas by churn" | jq '.outcome.response.ranked_areas'
"#)]
    Query {
        /// The question to answer.
        query: String,

        /// Session id reported with the result.
        ///
        /// The CLI keeps no session store: every run starts from empty
        /// session state and loads the schema afresh. Use `serve` to
        /// continue sessions across queries.
        #[arg(long)]
        session_id: Option<String>,

        /// User id reported with the result.
        #[arg(long)]
        user_id: Option<String>,

        /// Routing mode.
        #[arg(long, value_enum, default_value_t = RoutingArg::Deterministic)]
        routing: RoutingArg,
    },

    /// Show how a query would be routed, without calling any model.
    #[command(after_help = r#"Examples:
  ngni-agent classify "What is our strategy for Pankow?"
  ngni-agent --format json classify "network performance in Mitte"
"#)]
    Classify {
        /// The question to classify.
        query: String,
    },

    /// Print the warehouse schema handed to the database agent.
    Schema,

    /// Write the default prompt templates to a directory.
    ///
    /// Existing files are left untouched.
    #[command(after_help = r#"Examples:
  ngni-agent init-prompts                    # ~/.config/ngni-agent/prompts
  ngni-agent init-prompts --dir ./prompts
"#)]
    InitPrompts {
        /// Target directory.
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_parse_query_defaults() {
        let cli = Cli::try_parse_from(["ngni-agent", "query", "What is our strategy?"])
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(cli.format, "text");
        assert!(matches!(
            cli.command,
            Commands::Query {
                routing: RoutingArg::Deterministic,
                session_id: None,
                ..
            }
        ));
    }

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "ngni-agent",
            "query",
            "Rank districts",
            "--routing",
            "llm",
            "--format",
            "json",
            "-v",
        ])
        .unwrap_or_else(|_| unreachable!());
        assert!(cli.verbose);
        assert_eq!(cli.format, "json");
        assert!(matches!(
            cli.command,
            Commands::Query {
                routing: RoutingArg::Llm,
                ..
            }
        ));
    }

    fn query_command() -> clap::Command {
        Cli::command()
            .find_subcommand("query")
            .cloned()
            .unwrap_or_else(|| unreachable!())
    }

    #[test]
    fn test_query_help_example_matches_json_output_shape() {
        let after_help = query_command()
            .get_after_help()
            .map(ToString::to_string)
            .unwrap_or_default();
        assert!(after_help.contains("jq '.outcome.response.ranked_areas'"));
    }

    #[test]
    fn test_session_id_help_states_runs_are_stateless() {
        let help = query_command()
            .get_arguments()
            .find(|a| a.get_id() == "session_id")
            .and_then(|a| a.get_long_help().map(ToString::to_string))
            .unwrap_or_default();
        assert!(help.contains("keeps no session store"));
    }

    #[test]
    fn test_rejects_unknown_routing() {
        let result = Cli::try_parse_from(["ngni-agent", "query", "q", "--routing", "random"]);
        assert!(result.is_err());
    }
}
