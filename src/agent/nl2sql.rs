//! Natural-language to SQL generation and validation helpers.
//!
//! [`Nl2SqlAgent`] writes BigQuery SQL from a question and the dataset
//! schema. [`ensure_read_only`] and [`ensure_limit`] guard what the
//! validation tool is allowed to execute.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;

use super::config::AgentConfig;
use super::extract::strip_code_fence;
use super::traits::Agent;
use crate::error::AgentError;

/// Row cap appended to validation queries that carry no `LIMIT`.
pub const VALIDATION_ROW_LIMIT: usize = 80;

/// Statements the validation tool refuses to run.
const FORBIDDEN_KEYWORDS: &[&str] = &[
    "INSERT", "UPDATE", "DELETE", "MERGE", "DROP", "CREATE", "ALTER", "TRUNCATE", "GRANT",
    "REVOKE",
];

static FORBIDDEN_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)\b({})\b", FORBIDDEN_KEYWORDS.join("|"))).ok()
});

static LIMIT_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)\blimit\s+\d+").ok());

static LEADING_COMMENT_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^(?s)(\s*(--[^\n]*\n|/\*.*?\*/))*\s*").ok());

/// NL2SQL strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Nl2SqlMethod {
    /// Single-shot generation from the schema prompt.
    #[default]
    Baseline,
}

impl Nl2SqlMethod {
    /// Parses a method name (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::UnknownNl2SqlMethod`] for anything other than
    /// `BASELINE`.
    pub fn parse(raw: &str) -> Result<Self, AgentError> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "BASELINE" => Ok(Self::Baseline),
            _ => Err(AgentError::UnknownNl2SqlMethod {
                method: raw.to_string(),
            }),
        }
    }

    /// Canonical method name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Baseline => "BASELINE",
        }
    }
}

/// Agent behind the `query_bigquery` tool.
pub struct Nl2SqlAgent {
    model: String,
    system_prompt: String,
    max_tokens: u32,
}

impl Nl2SqlAgent {
    /// Creates the generator from config and its system prompt.
    #[must_use]
    pub fn new(config: &AgentConfig, system_prompt: &str) -> Self {
        Self {
            model: config.nl2sql_model.clone(),
            system_prompt: system_prompt.to_string(),
            max_tokens: config.agent_max_tokens,
        }
    }
}

#[async_trait]
impl Agent for Nl2SqlAgent {
    fn name(&self) -> &'static str {
        "nl2sql"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    fn temperature(&self) -> f32 {
        0.01
    }

    fn max_tokens(&self) -> u32 {
        self.max_tokens
    }
}

/// Cleans generated SQL: strips markdown fencing and trailing semicolons.
#[must_use]
pub fn clean_sql(raw: &str) -> String {
    let sql = strip_code_fence(raw);
    let sql = sql
        .strip_prefix("sql\n")
        .or_else(|| sql.strip_prefix("SQL\n"))
        .unwrap_or(sql);
    sql.trim().trim_end_matches(';').trim_end().to_string()
}

/// Rejects anything but a single read-only `SELECT` or `WITH` statement.
///
/// Statement separators and forbidden keywords are only looked for outside
/// string literals and quoted identifiers, so `WHERE name = 'a;b'` passes.
///
/// # Errors
///
/// Returns [`AgentError::ToolExecution`] naming the offending construct.
pub fn ensure_read_only(sql: &str) -> Result<(), AgentError> {
    const TOOL: &str = super::tool::RUN_BIGQUERY_VALIDATION;

    let body = LEADING_COMMENT_RE
        .as_ref()
        .and_then(|re| re.find(sql))
        .map_or(sql, |m| &sql[m.end()..]);
    let first = body
        .split(|c: char| !c.is_ascii_alphanumeric() && c != '_')
        .next()
        .unwrap_or_default()
        .to_ascii_uppercase();
    if first != "SELECT" && first != "WITH" {
        return Err(AgentError::tool(
            TOOL,
            "only SELECT or WITH queries are allowed",
        ));
    }

    let code = mask_literals(body);
    let trimmed = code.trim().trim_end_matches(';');
    if trimmed.contains(';') {
        return Err(AgentError::tool(TOOL, "multiple statements are not allowed"));
    }

    let forbidden = FORBIDDEN_RE
        .as_ref()
        .ok_or_else(|| AgentError::tool(TOOL, "keyword filter unavailable"))?;
    if let Some(m) = forbidden.find(trimmed) {
        return Err(AgentError::tool(
            TOOL,
            format!("forbidden keyword: {}", m.as_str().to_ascii_uppercase()),
        ));
    }

    Ok(())
}

/// Blanks the contents of `'...'`, `"..."` and `` `...` `` spans, keeping
/// the quotes. Backslash escapes inside a span are honoured.
fn mask_literals(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for c in sql.chars() {
        match quote {
            None => {
                if matches!(c, '\'' | '"' | '`') {
                    quote = Some(c);
                }
                out.push(c);
            }
            Some(_) if escaped => {
                escaped = false;
                out.push(' ');
            }
            Some(_) if c == '\\' => {
                escaped = true;
                out.push(' ');
            }
            Some(q) if c == q => {
                quote = None;
                out.push(c);
            }
            Some(_) => out.push(' '),
        }
    }
    out
}

/// Appends `LIMIT 80` when the statement carries no limit of its own.
#[must_use]
pub fn ensure_limit(sql: &str) -> String {
    let sql = sql.trim().trim_end_matches(';').trim_end();
    let has_limit = LIMIT_RE.as_ref().is_some_and(|re| re.is_match(sql));
    if has_limit {
        sql.to_string()
    } else {
        format!("{sql} LIMIT {VALIDATION_ROW_LIMIT}")
    }
}
