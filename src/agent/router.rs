//! Deterministic query routing.
//!
//! A query is classified by case-insensitive keyword membership into a
//! [`QueryRoute`]; the route selects one of three fixed [`Branch`]es, each a
//! fixed sequence of specialist agents.

use serde::{Deserialize, Serialize};

/// Keywords that mark a query as needing the strategy documents.
pub const STRATEGY_KEYWORDS: &[&str] = &["strategy", "strategic", "mandate"];

/// Keywords that mark a query as needing Vodafone network performance data.
pub const PERFORMANCE_KEYWORDS: &[&str] = &[
    "network performance",
    "vodafone data",
    "churn",
    "latency",
    "congestion",
];

/// Classification flags for a query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRoute {
    /// The query asks about strategy reports or mandates.
    pub has_strategy: bool,
    /// The query asks about network performance data.
    pub has_performance: bool,
}

/// Classifies a query by keyword membership. Matching is case-insensitive
/// substring search.
#[must_use]
pub fn classify_query(query: &str) -> QueryRoute {
    let lowered = query.to_lowercase();
    let contains_any = |keywords: &[&str]| keywords.iter().any(|k| lowered.contains(k));
    QueryRoute {
        has_strategy: contains_any(STRATEGY_KEYWORDS),
        has_performance: contains_any(PERFORMANCE_KEYWORDS),
    }
}

/// A specialist agent invoked by a branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStep {
    /// Strategy document retrieval.
    Rag,
    /// BigQuery NL2SQL.
    Db,
    /// Web search for market context.
    Search,
}

impl AgentStep {
    /// Agent name as it appears in prompts and logs.
    #[must_use]
    pub const fn agent_name(self) -> &'static str {
        match self {
            Self::Rag => "rag_agent",
            Self::Db => "db_agent",
            Self::Search => "search_agent",
        }
    }

    /// Source label used when concatenating outputs for synthesis.
    #[must_use]
    pub const fn source_label(self) -> &'static str {
        match self {
            Self::Rag => "STRATEGY DOCUMENTS",
            Self::Db => "NETWORK DATA (BIGQUERY)",
            Self::Search => "MARKET CONTEXT (WEB SEARCH)",
        }
    }
}

/// Fixed orchestration branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Branch {
    /// Strategy documents, then Vodafone + external data, then market context.
    StrategyAndPerformance,
    /// Strategy documents, then market context.
    StrategyOnly,
    /// External data, then market context.
    Default,
}

impl Branch {
    /// The agents this branch runs, in order.
    #[must_use]
    pub const fn steps(self) -> &'static [AgentStep] {
        match self {
            Self::StrategyAndPerformance => &[AgentStep::Rag, AgentStep::Db, AgentStep::Search],
            Self::StrategyOnly => &[AgentStep::Rag, AgentStep::Search],
            Self::Default => &[AgentStep::Db, AgentStep::Search],
        }
    }

    /// Branch name for logs and CLI output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StrategyAndPerformance => "strategy_and_performance",
            Self::StrategyOnly => "strategy_only",
            Self::Default => "default",
        }
    }
}

impl std::fmt::Display for Branch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl QueryRoute {
    /// Selects the branch for these flags.
    ///
    /// Strategy + performance only when both flags are set; strategy-only
    /// when only `has_strategy` is set; default otherwise, including when
    /// only `has_performance` is set.
    #[must_use]
    pub const fn branch(self) -> Branch {
        match (self.has_strategy, self.has_performance) {
            (true, true) => Branch::StrategyAndPerformance,
            (true, false) => Branch::StrategyOnly,
            _ => Branch::Default,
        }
    }
}
