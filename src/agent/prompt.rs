//! System prompts and template builders for agents.
//!
//! Prompts define each agent's behavior. Template builders format user
//! messages with the query, earlier agent outputs and the dataset schema.

use std::fmt::Write;
use std::path::{Path, PathBuf};

use super::outcome::SourceOutput;
use super::router::QueryRoute;
use crate::backend::DatabaseSettings;

/// System prompt for the root coordinator agent.
pub const ROOT_SYSTEM_PROMPT: &str = r#"### ROLE
Lead strategic coordinator for network investment planning. Combine strategy documents, network data and market context into one ranked decision object per municipality.

### WORKFLOW
1. Call `call_rag_agent` to obtain the strategic mandate key and the required quadrant.
   Report: "found strategic mandate: <key> targeting <quadrant>".
2. Call `call_db_agent` with the mandate key. Data scope:
   - If the user names no data source, use the external foundation data only.
   - If the user asks for Vodafone data, query the Vodafone performance data together with the external foundation data and the strategy context.
   Group metrics by `municipality_code` and `municipality_name`.
   Report: "retrieved data for <N> municipalities".
3. Call `call_search_agent` for municipality-specific external factors (competitors, funding, demographics) for the identified locations.
   Report: "identified external drivers: <driver>, <driver>".
4. Share a short process breakdown, then append the final JSON object described below.

### GUARDRAILS
- Drop any record whose `municipality_code` is NULL, empty or "Unknown".
- Drop any record whose `municipality_name` is generic ("District", "Area X") or invalid.
- `ranking_score` must lie between 0 and 100.
- Invest: high traffic or growth for the Q2 strategy. Remediate: high churn or risk. Subsidy: low traffic and low quality.

### OUTPUT SCHEMA
{
  "status": "success",
  "overall_steps": "summary of steps 1-3",
  "exec_summary": "concise executive summary",
  "metadata": { "document_source": "string" },
  "ranked_areas": [
    {
      "rank": 1,
      "municipality_code": "string",
      "municipality_name": "string",
      "ranking_score": 0.0,
      "reasoning": "why this area is ranked here",
      "investment_recommendation": "Invest | Defer | Cancel",
      "metrics_summary": { "avg_daily_traffic": 0.0, "avg_churn_risk": 0.0 },
      "market_context": { "details": "summary of external factors" },
      "financial_projection": { "npv": "string", "roi": "string" }
    }
  ]
}
Include `metrics_summary` only when Vodafone data was requested, `market_context` only when search data was used, and `financial_projection` only when strategy data was used.
"#;

/// System prompt for the strategy-document agent.
pub const RAG_SYSTEM_PROMPT: &str = r#"### ROLE
Data extraction specialist for strategy reports. Use `retrieve_documents` to read the strategy corpus and extract the strategic mandate behind the user's question.
Do not answer the user. Output only the JSON object below.

### TASK
1. Identify the core subject of the question (e.g. "iPhone", "Growth", "Churn").
2. Check the month and year of every retrieved document. When strategies conflict, use the document with the latest date and ignore superseded ones.
3. Extract goals, mandates and financial rules from the latest strategy documents.
4. Produce a 3-5 word `strategic_mandate_key` usable as a BigQuery filter theme.

### OUTPUT (strict JSON)
{
  "status": "MANDATE_FOUND" | "NO_MANDATE",
  "strategic_goal": "quote or summary from the document",
  "required_quadrant": "target quadrant (Q1-Q4)",
  "financial_mandate": "ROI / NPV / payback rules",
  "strategic_mandate_key": "3-5 word key, e.g. 'Berlin iPhone Focus'",
  "citation": "document page or section"
}
"#;

/// System prompt for the database agent.
pub const DB_SYSTEM_PROMPT: &str = r#"You are a BigQuery SQL expert. Answer the request with data from the warehouse.

Process:
1. Call `query_bigquery` with the natural-language question to get SQL.
2. Call `run_bigquery_validation` with that SQL. If it returns an error_message, correct the SQL and validate again.
3. Return only the raw JSON rows from the successful validation. No prose, no summaries.
Never invent SQL results; always run the tools.

Dataset `h3_consumption` (tables join on `municipality_code`):
- `berlin_external_foundation_view` (base table): municipality_name STRING, municipality_code STRING, avg_population FLOAT, avg_age FLOAT, total_commercial INTEGER, total_residential INTEGER, total_landfill INTEGER, hex_count INTEGER, hex_profile_classification STRING.
- `vodafone_performance`: municipality_name STRING, municipality_code STRING, broadband_market_share_pct FLOAT, chrun_rate_pct FLOAT, mobile_market_share_pct FLOAT, monthly_arpu_euro FLOAT, avg_download_speed_mbps FLOAT, congestion_index FLOAT, latency_ms FLOAT, signal_strength_dbm FLOAT.

Rules for the generated SQL:
- Always filter `WHERE T1.municipality_code IS NOT NULL`.
- Start from `berlin_external_foundation_view` AS T1 and LEFT JOIN `vodafone_performance` AS T2 ON T1.municipality_code = T2.municipality_code, so no municipality is dropped. Do not filter on T2 columns; use them only for selection and ordering.
- Select T1.municipality_name and T1.municipality_code. Group by both when aggregating.
- Churn risk: chrun_rate_pct > 5 OR congestion_index > 0.8. Growth: mobile_market_share_pct < 20 AND avg_population > 5000. Quality issue: avg_download_speed_mbps < 30 OR latency_ms > 50.
- LIMIT 50 unless a specific filter is applied.
"#;

/// System prompt for the search agent.
pub const SEARCH_SYSTEM_PROMPT: &str = r#"Role: market intelligence specialist for Berlin.
Mission: provide municipality- and district-specific external context using `web_search`.

Parameters:
- Timeframe: 2025-2026 only.
- Scope: Berlin and the named municipalities or districts. Ignore generic news.
- Run at most one search per municipality. Combine intents into a single query, e.g. "Berlin <municipality> commercial development broadband news 2025".

Return only this JSON object (do not repeat BigQuery data):
{
  "competitor_activity": "...",
  "local_infrastructure_and_events": "...",
  "demographics_and_economy": "...",
  "subsidy_and_regulation": "...",
  "sentiment_and_outages": "...",
  "data_sources": ["url"]
}
"#;

/// System prompt for the final synthesis step.
pub const SYNTHESIZER_SYSTEM_PROMPT: &str = r#"You are the synthesis stage of a network investment planner. You receive the user's question and the labelled outputs of specialist agents (strategy documents, network data, market context). Combine them into one JSON object ranking municipalities.

Guardrails:
- Drop any record whose municipality_code is NULL, empty or "Unknown", and any record with a generic or invalid municipality_name.
- ranking_score must lie between 0 and 100; rank 1 is the highest score.
- Invest: high traffic or growth for the strategy. Remediate: high churn or risk. Subsidy: low traffic and low quality.
- Use only facts present in the agent outputs.

Return only this JSON object:
{
  "status": "success",
  "overall_steps": "summary of what each source contributed",
  "exec_summary": "concise executive summary",
  "metadata": { "document_source": "string" },
  "ranked_areas": [
    {
      "rank": 1,
      "municipality_code": "string",
      "municipality_name": "string",
      "ranking_score": 0.0,
      "reasoning": "why this area is ranked here",
      "investment_recommendation": "Invest | Defer | Cancel",
      "metrics_summary": { "avg_daily_traffic": 0.0, "avg_churn_risk": 0.0 },
      "market_context": { "details": "summary of external factors" },
      "financial_projection": { "npv": "string", "roi": "string" }
    }
  ]
}
Include metrics_summary only when network data is present, market_context only when market context is present, and financial_projection only when strategy documents are present.
"#;

/// System prompt for the NL2SQL generator behind `query_bigquery`.
pub const NL2SQL_SYSTEM_PROMPT: &str = r#"You translate questions into BigQuery Standard SQL.
- Use only tables and columns from the provided schema, fully qualified as `project.dataset.table`.
- Write a single read-only SELECT (or WITH ... SELECT) statement.
- Return only the SQL, with no explanation and no markdown.
"#;

/// Default prompt directory relative to home.
const DEFAULT_PROMPT_DIR: &str = ".config/ngni-agent/prompts";

const ROOT_FILENAME: &str = "root.md";
const RAG_FILENAME: &str = "rag.md";
const DB_FILENAME: &str = "db.md";
const SEARCH_FILENAME: &str = "search.md";
const SYNTHESIZER_FILENAME: &str = "synthesizer.md";
const NL2SQL_FILENAME: &str = "nl2sql.md";

/// A set of system prompts for all agents.
///
/// Loaded from external template files when available, falling back to
/// compiled-in defaults per file.
#[derive(Debug, Clone)]
pub struct PromptSet {
    /// Root coordinator prompt.
    pub root: String,
    /// Strategy-document agent prompt.
    pub rag: String,
    /// Database agent prompt.
    pub db: String,
    /// Search agent prompt.
    pub search: String,
    /// Synthesis prompt.
    pub synthesizer: String,
    /// NL2SQL generator prompt.
    pub nl2sql: String,
}

impl PromptSet {
    /// Loads prompts from the given directory, falling back to compiled-in defaults.
    ///
    /// Resolution order for the directory:
    /// 1. Explicit `prompt_dir` argument
    /// 2. `NGNI_PROMPT_DIR` environment variable
    /// 3. `~/.config/ngni-agent/prompts/`
    #[must_use]
    pub fn load(prompt_dir: Option<&Path>) -> Self {
        let resolved_dir = prompt_dir
            .map(PathBuf::from)
            .or_else(|| std::env::var("NGNI_PROMPT_DIR").ok().map(PathBuf::from))
            .or_else(Self::default_dir);

        let load_file = |filename: &str, default: &str| -> String {
            resolved_dir
                .as_ref()
                .map(|dir| dir.join(filename))
                .and_then(|path| std::fs::read_to_string(path).ok())
                .unwrap_or_else(|| default.to_string())
        };

        Self {
            root: load_file(ROOT_FILENAME, ROOT_SYSTEM_PROMPT),
            rag: load_file(RAG_FILENAME, RAG_SYSTEM_PROMPT),
            db: load_file(DB_FILENAME, DB_SYSTEM_PROMPT),
            search: load_file(SEARCH_FILENAME, SEARCH_SYSTEM_PROMPT),
            synthesizer: load_file(SYNTHESIZER_FILENAME, SYNTHESIZER_SYSTEM_PROMPT),
            nl2sql: load_file(NL2SQL_FILENAME, NL2SQL_SYSTEM_PROMPT),
        }
    }

    /// Returns compiled-in defaults without checking the filesystem.
    #[must_use]
    pub fn defaults() -> Self {
        Self {
            root: ROOT_SYSTEM_PROMPT.to_string(),
            rag: RAG_SYSTEM_PROMPT.to_string(),
            db: DB_SYSTEM_PROMPT.to_string(),
            search: SEARCH_SYSTEM_PROMPT.to_string(),
            synthesizer: SYNTHESIZER_SYSTEM_PROMPT.to_string(),
            nl2sql: NL2SQL_SYSTEM_PROMPT.to_string(),
        }
    }

    /// Writes the compiled-in default prompts to the given directory.
    ///
    /// Creates the directory if needed. Existing files are not overwritten.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if directory creation or file writing fails.
    pub fn write_defaults(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
        std::fs::create_dir_all(dir)?;

        let templates = [
            (ROOT_FILENAME, ROOT_SYSTEM_PROMPT),
            (RAG_FILENAME, RAG_SYSTEM_PROMPT),
            (DB_FILENAME, DB_SYSTEM_PROMPT),
            (SEARCH_FILENAME, SEARCH_SYSTEM_PROMPT),
            (SYNTHESIZER_FILENAME, SYNTHESIZER_SYSTEM_PROMPT),
            (NL2SQL_FILENAME, NL2SQL_SYSTEM_PROMPT),
        ];

        let mut written = Vec::new();
        for (filename, content) in &templates {
            let path = dir.join(filename);
            if !path.exists() {
                std::fs::write(&path, content)?;
                written.push(path);
            }
        }

        Ok(written)
    }

    /// Returns the default prompt directory under the user's home.
    #[must_use]
    pub fn default_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(DEFAULT_PROMPT_DIR))
    }
}

/// Appends the dataset schema (DDL plus sample rows) to an instruction.
#[must_use]
pub fn with_schema(instruction: &str, settings: Option<&DatabaseSettings>) -> String {
    match settings {
        Some(s) if !s.bq_ddl_schema.trim().is_empty() => format!(
            "{instruction}\n\n--------- BigQuery schema of `{}.{}` with sample rows ---------\n{}\n",
            s.bq_project_id, s.bq_dataset_id, s.bq_ddl_schema
        ),
        _ => instruction.to_string(),
    }
}

/// Builds the user message for the strategy-document agent.
#[must_use]
pub fn build_rag_request(query: &str) -> String {
    format!("<query>{query}</query>\n\nExtract the strategic mandate for this question.")
}

/// Builds the user message for the database agent.
///
/// The data scope follows the route: Vodafone performance data is only
/// joined in when the query asked for it.
#[must_use]
pub fn build_db_request(query: &str, route: QueryRoute, strategy: Option<&str>) -> String {
    let mut prompt = format!("<query>{query}</query>\n\n");

    if let Some(strategy) = strategy {
        let _ = write!(
            prompt,
            "<strategic_mandate>\n{strategy}\n</strategic_mandate>\n\n"
        );
    }

    prompt.push_str(if route.has_performance {
        "Data scope: Vodafone performance data (`vodafone_performance`) together with the \
         external foundation data (`berlin_external_foundation_view`) and the strategic \
         mandate above."
    } else {
        "Data scope: external foundation data (`berlin_external_foundation_view`) only."
    });
    prompt.push_str("\nReturn metrics grouped by municipality_code and municipality_name.");
    prompt
}

/// Builds the user message for the search agent from earlier outputs.
#[must_use]
pub fn build_search_request(query: &str, earlier: &[SourceOutput]) -> String {
    let mut prompt = format!("<query>{query}</query>\n\n");
    for source in earlier {
        let _ = write!(
            prompt,
            "<{tag}>\n{content}\n</{tag}>\n\n",
            tag = source.step.agent_name(),
            content = source.content,
        );
    }
    prompt.push_str(
        "Find municipality-specific external factors for the locations identified above.",
    );
    prompt
}

/// Concatenates agent outputs under their source labels.
#[must_use]
pub fn concatenate_sources(sources: &[SourceOutput]) -> String {
    let mut combined = String::new();
    for source in sources {
        let _ = write!(
            combined,
            "=== SOURCE: {label} ({agent}) ===\n{content}\n\n",
            label = source.step.source_label(),
            agent = source.step.agent_name(),
            content = source.content.trim(),
        );
    }
    combined.truncate(combined.trim_end().len());
    combined
}

/// Builds the user message for the synthesis step.
#[must_use]
pub fn build_synthesis_prompt(query: &str, sources: &[SourceOutput]) -> String {
    format!(
        "<query>{query}</query>\n\n<agent_outputs>\n{}\n</agent_outputs>\n\n\
         Synthesize the ranking JSON object.",
        concatenate_sources(sources)
    )
}

/// Builds the user message for the NL2SQL generator.
#[must_use]
pub fn build_nl2sql_prompt(question: &str, settings: Option<&DatabaseSettings>) -> String {
    let schema = settings.map_or("(schema unavailable)", |s| s.bq_ddl_schema.as_str());
    format!("<schema>\n{schema}\n</schema>\n\n<question>{question}</question>")
}
