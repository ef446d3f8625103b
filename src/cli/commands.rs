//! CLI command implementations.
//!
//! Each command returns its output as a string; the binary prints it.
//! Commands that reach the model or the backends build a tokio runtime and
//! block on the async pipeline.

use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;

use crate::agent::client::create_provider;
use crate::agent::router::classify_query;
use crate::agent::{AgentConfig, LlmProvider, Orchestrator, PromptSet};
use crate::backend::Backends;
use crate::cli::output::OutputFormat;
use crate::cli::parser::{Cli, Commands, RoutingArg};
use crate::error::{CommandError, Result};
use crate::session::Session;

/// Executes the parsed CLI command.
///
/// # Arguments
///
/// * `cli` - Parsed CLI arguments.
///
/// # Returns
///
/// Result with output string on success.
///
/// # Errors
///
/// Returns an error if configuration is incomplete or the command fails.
pub fn execute(cli: &Cli) -> Result<String> {
    let format = OutputFormat::parse(&cli.format);

    match &cli.command {
        #[cfg(feature = "server")]
        Commands::Serve { host, port } => cmd_serve(cli, host, *port),
        Commands::Query {
            query,
            session_id,
            user_id,
            routing,
        } => {
            let params = QueryParams {
                query,
                session_id: session_id.as_deref(),
                user_id: user_id.as_deref(),
                routing: *routing,
            };
            cmd_query(cli, &params, format)
        }
        Commands::Classify { query } => cmd_classify(query, format),
        Commands::Schema => cmd_schema(cli, format),
        Commands::InitPrompts { dir } => cmd_init_prompts(dir.as_deref(), format),
    }
}

/// Arguments of the `query` command.
struct QueryParams<'a> {
    query: &'a str,
    session_id: Option<&'a str>,
    user_id: Option<&'a str>,
    routing: RoutingArg,
}

fn load_config(cli: &Cli) -> Result<AgentConfig> {
    let mut builder = AgentConfig::builder().from_env();
    if let Some(dir) = &cli.prompt_dir {
        builder = builder.prompt_dir(dir);
    }
    Ok(builder.build()?)
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    let rt = tokio::runtime::Runtime::new().map_err(|e| {
        CommandError::ExecutionFailed(format!("Failed to create async runtime: {e}"))
    })?;
    Ok(rt)
}

fn build_orchestrator(config: AgentConfig) -> Result<Orchestrator> {
    let provider: Arc<dyn LlmProvider> = Arc::from(create_provider(&config)?);
    let backends = Backends::from_config(&config);
    Ok(Orchestrator::new(provider, backends, config))
}

#[cfg(feature = "server")]
fn cmd_serve(cli: &Cli, host: &str, port: u16) -> Result<String> {
    use crate::server::{AppState, serve};
    use crate::session::SessionStore;

    let config = load_config(cli)?;
    let sessions = Arc::new(SessionStore::new(config.max_sessions));
    let state = Arc::new(AppState {
        orchestrator: Arc::new(build_orchestrator(config)?),
        sessions,
    });

    runtime()?
        .block_on(serve(state, host, port))
        .map_err(|e| CommandError::ExecutionFailed(format!("Server error: {e:#}")))?;

    Ok(String::new())
}

fn cmd_query(cli: &Cli, params: &QueryParams<'_>, format: OutputFormat) -> Result<String> {
    let orchestrator = build_orchestrator(load_config(cli)?)?;
    let mut session = Session::new(params.user_id, params.session_id);
    let rt = runtime()?;

    match params.routing {
        RoutingArg::Deterministic => {
            let outcome = rt
                .block_on(orchestrator.query(&mut session, params.query))
                .map_err(|e| CommandError::ExecutionFailed(format!("Query failed: {e}")))?;

            match format {
                OutputFormat::Text => {
                    let body = serde_json::to_string_pretty(&outcome.response)
                        .map_err(|e| CommandError::OutputFormat(e.to_string()))?;
                    let mut output = format!("{body}\n\n");
                    let _ = writeln!(
                        output,
                        "Branch: {} | Agents: {} | Tokens: {} | Time: {:.1}s | Session: {}",
                        outcome.branch,
                        outcome
                            .sources
                            .iter()
                            .map(|s| s.step.agent_name())
                            .collect::<Vec<_>>()
                            .join(" -> "),
                        outcome.total_tokens,
                        outcome.elapsed.as_secs_f64(),
                        session.session_id,
                    );
                    if !outcome.is_parsed() {
                        output.push_str("Warning: synthesis output was not valid JSON\n");
                    }
                    Ok(output)
                }
                OutputFormat::Json => {
                    let json = serde_json::json!({
                        "session_id": session.session_id,
                        "outcome": outcome,
                    });
                    Ok(format.to_json(&json))
                }
            }
        }
        RoutingArg::Llm => {
            let outcome = rt
                .block_on(orchestrator.query_llm_routed(&mut session, params.query))
                .map_err(|e| CommandError::ExecutionFailed(format!("Query failed: {e}")))?;

            match format {
                OutputFormat::Text => Ok(format!(
                    "{}\n\nTokens: {} | Time: {:.1}s | Session: {}\n",
                    outcome.response.trim_end(),
                    outcome.total_tokens,
                    outcome.elapsed.as_secs_f64(),
                    session.session_id,
                )),
                OutputFormat::Json => {
                    let json = serde_json::json!({
                        "session_id": session.session_id,
                        "outcome": outcome,
                    });
                    Ok(format.to_json(&json))
                }
            }
        }
    }
}

fn cmd_classify(query: &str, format: OutputFormat) -> Result<String> {
    let route = classify_query(query);
    let branch = route.branch();
    let steps: Vec<&str> = branch.steps().iter().map(|s| s.agent_name()).collect();

    match format {
        OutputFormat::Text => Ok(format!(
            "Strategy:    {}\nPerformance: {}\nBranch:      {branch}\nAgents:      {} -> synthesizer\n",
            route.has_strategy,
            route.has_performance,
            steps.join(" -> "),
        )),
        OutputFormat::Json => {
            let json = serde_json::json!({
                "has_strategy": route.has_strategy,
                "has_performance": route.has_performance,
                "branch": branch,
                "steps": steps,
            });
            Ok(format.to_json(&json))
        }
    }
}

fn cmd_schema(cli: &Cli, format: OutputFormat) -> Result<String> {
    let config = load_config(cli)?;
    let backends = Backends::from_config(&config);

    let settings = runtime()?
        .block_on(backends.warehouse.database_settings())
        .map_err(|e| CommandError::ExecutionFailed(format!("Failed to load schema: {e}")))?;

    match format {
        OutputFormat::Text => Ok(format!(
            "Dataset: {}.{}\n\n{}\n",
            settings.bq_project_id,
            settings.bq_dataset_id,
            settings.bq_ddl_schema.trim_end()
        )),
        OutputFormat::Json => Ok(format.to_json(&settings)),
    }
}

fn cmd_init_prompts(dir: Option<&Path>, format: OutputFormat) -> Result<String> {
    let target_dir = dir
        .map(Path::to_path_buf)
        .or_else(PromptSet::default_dir)
        .ok_or_else(|| {
            CommandError::ExecutionFailed(
                "Could not determine home directory for default prompt path".to_string(),
            )
        })?;

    let written = PromptSet::write_defaults(&target_dir).map_err(|e| {
        CommandError::ExecutionFailed(format!("Failed to write prompt templates: {e}"))
    })?;

    match format {
        OutputFormat::Text => {
            if written.is_empty() {
                return Ok(format!(
                    "All prompt templates already exist in: {}\n",
                    target_dir.display()
                ));
            }
            let mut output = format!(
                "Wrote {} prompt template(s) to: {}\n",
                written.len(),
                target_dir.display()
            );
            for path in &written {
                let _ = writeln!(
                    output,
                    "  {}",
                    path.file_name()
                        .and_then(|n| n.to_str())
                        .unwrap_or("unknown")
                );
            }
            output.push_str("\nEdit these files to customize agent instructions.\n");
            Ok(output)
        }
        OutputFormat::Json => {
            let json = serde_json::json!({
                "directory": target_dir.to_string_lossy(),
                "written": written
                    .iter()
                    .map(|p| p.to_string_lossy().into_owned())
                    .collect::<Vec<_>>(),
                "count": written.len(),
            });
            Ok(format.to_json(&json))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_cmd_classify_text() {
        let output = cmd_classify("What is our STRATEGY and network performance?", OutputFormat::Text)
            .unwrap_or_default();
        assert!(output.contains("Branch:      strategy_and_performance"));
        assert!(output.contains("rag_agent -> db_agent -> search_agent -> synthesizer"));
    }

    #[test]
    fn test_cmd_classify_json() {
        let output = cmd_classify("Where is churn highest?", OutputFormat::Json).unwrap_or_default();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap_or_default();
        assert_eq!(value["has_strategy"], false);
        assert_eq!(value["has_performance"], true);
        assert_eq!(value["branch"], "default");
        assert_eq!(value["steps"], serde_json::json!(["db_agent", "search_agent"]));
    }

    #[test]
    fn test_cmd_init_prompts_writes_once() {
        let temp_dir = TempDir::new().unwrap_or_else(|_| unreachable!());

        let first = cmd_init_prompts(Some(temp_dir.path()), OutputFormat::Text).unwrap_or_default();
        assert!(first.contains("Wrote 6 prompt template(s)"));
        assert!(first.contains("synthesizer.md"));
        assert!(temp_dir.path().join("nl2sql.md").exists());

        let second = cmd_init_prompts(Some(temp_dir.path()), OutputFormat::Json).unwrap_or_default();
        let value: serde_json::Value = serde_json::from_str(&second).unwrap_or_default();
        assert_eq!(value["count"], 0);
    }
}
