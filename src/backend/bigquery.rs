//! BigQuery REST client (`jobs.query`).
//!
//! Queries run synchronously: the call waits up to [`QUERY_TIMEOUT_MS`]
//! for the job and fails if it has not completed by then.

use std::fmt::Write;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::{debug, info};

use super::{DatabaseSettings, QueryRows, TabularStore, http};
use crate::agent::config::AgentConfig;
use crate::error::AgentError;

const BACKEND: &str = "bigquery";

/// Server-side wait for a query job, in milliseconds.
const QUERY_TIMEOUT_MS: u64 = 60_000;
/// Sample rows included per table in the schema description.
const SAMPLE_ROWS: usize = 3;

/// Warehouse backed by BigQuery.
pub struct BigQueryStore {
    client: reqwest::Client,
    endpoint: String,
    token: String,
    project: String,
    dataset: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
    #[serde(default)]
    job_complete: bool,
    #[serde(default)]
    schema: Option<TableSchema>,
    #[serde(default)]
    rows: Vec<TableRow>,
    #[serde(default)]
    total_rows: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TableSchema {
    #[serde(default)]
    fields: Vec<FieldSchema>,
}

#[derive(Debug, Deserialize)]
struct FieldSchema {
    name: String,
    #[serde(rename = "type", default)]
    field_type: String,
    #[serde(default)]
    mode: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TableRow {
    #[serde(default)]
    f: Vec<TableCell>,
}

#[derive(Debug, Deserialize)]
struct TableCell {
    #[serde(default)]
    v: Value,
}

impl BigQueryStore {
    /// Creates a store for the configured warehouse project and dataset.
    #[must_use]
    pub fn new(client: reqwest::Client, config: &AgentConfig) -> Self {
        Self {
            client,
            endpoint: format!(
                "https://bigquery.googleapis.com/bigquery/v2/projects/{}/queries",
                config.bq_project
            ),
            token: config.api_key.clone(),
            project: config.bq_project.clone(),
            dataset: config.bq_dataset.clone(),
        }
    }

    fn qualified(&self, table: &str) -> String {
        format!("`{}.{}.{table}`", self.project, self.dataset)
    }

    fn decode(response: QueryResponse, max_rows: usize) -> Result<QueryRows, AgentError> {
        if !response.job_complete {
            return Err(AgentError::backend(
                BACKEND,
                format!("query did not complete within {QUERY_TIMEOUT_MS} ms"),
            ));
        }

        let fields = response.schema.map(|s| s.fields).unwrap_or_default();
        let rows = response
            .rows
            .into_iter()
            .take(max_rows)
            .map(|row| {
                fields
                    .iter()
                    .zip(row.f)
                    .map(|(field, cell)| (field.name.clone(), decode_cell(field, cell.v)))
                    .collect::<Map<String, Value>>()
            })
            .collect();

        Ok(QueryRows {
            columns: fields.into_iter().map(|f| f.name).collect(),
            rows,
            total_rows: response.total_rows.and_then(|t| t.parse().ok()),
        })
    }
}

/// Converts a cell from BigQuery's all-strings wire format to typed JSON.
fn decode_cell(field: &FieldSchema, value: Value) -> Value {
    if field.mode.as_deref() == Some("REPEATED") {
        return match value {
            Value::Array(items) => Value::Array(
                items
                    .into_iter()
                    .map(|item| decode_scalar(&field.field_type, item["v"].clone()))
                    .collect(),
            ),
            other => other,
        };
    }
    decode_scalar(&field.field_type, value)
}

fn decode_scalar(field_type: &str, value: Value) -> Value {
    let Value::String(raw) = value else {
        return value;
    };
    match field_type {
        "INTEGER" | "INT64" => raw.parse::<i64>().map_or(Value::String(raw), Value::from),
        "FLOAT" | "FLOAT64" | "NUMERIC" | "BIGNUMERIC" => {
            raw.parse::<f64>().map_or(Value::String(raw), Value::from)
        }
        "BOOLEAN" | "BOOL" => match raw.as_str() {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => Value::String(raw),
        },
        _ => Value::String(raw),
    }
}

#[async_trait]
impl TabularStore for BigQueryStore {
    async fn query(&self, sql: &str, max_rows: usize) -> Result<QueryRows, AgentError> {
        debug!(target: "bigquery", sql, max_rows, "running query");

        let request = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .json(&json!({
                "query": sql,
                "useLegacySql": false,
                "maxResults": max_rows,
                "timeoutMs": QUERY_TIMEOUT_MS,
            }));

        let response: QueryResponse = http::send_json(BACKEND, request).await?;
        Self::decode(response, max_rows)
    }

    async fn database_settings(&self) -> Result<DatabaseSettings, AgentError> {
        let tables = self
            .query(
                &format!(
                    "SELECT table_name, ddl FROM {} ORDER BY table_name",
                    self.qualified("INFORMATION_SCHEMA.TABLES")
                ),
                100,
            )
            .await?;

        let mut ddl_schema = String::new();
        for table in &tables.rows {
            let (Some(name), Some(ddl)) = (table["table_name"].as_str(), table["ddl"].as_str())
            else {
                continue;
            };
            let _ = writeln!(ddl_schema, "{ddl}");

            let samples = self
                .query(
                    &format!("SELECT * FROM {} LIMIT {SAMPLE_ROWS}", self.qualified(name)),
                    SAMPLE_ROWS,
                )
                .await?;
            let _ = writeln!(ddl_schema, "-- Example values for table `{name}`:");
            for row in &samples.rows {
                let _ = writeln!(ddl_schema, "-- {}", Value::Object(row.clone()));
            }
            ddl_schema.push('\n');
        }

        info!(
            dataset = %self.dataset,
            tables = tables.rows.len(),
            "loaded dataset schema"
        );

        Ok(DatabaseSettings {
            use_database: "BigQuery".to_string(),
            bq_project_id: self.project.clone(),
            bq_dataset_id: self.dataset.clone(),
            bq_ddl_schema: ddl_schema,
        })
    }
}
