//! Reading materialized model results back out of the backing store

use std::path::PathBuf;
use std::process::Stdio;

use serde::Serialize;
use serde_json::Value;
use tokio::process::Command;

use flowdbt_core::Config;
use flowdbt_graph::is_valid_identifier;

/// How many rows to fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultMode {
    All,
    Preview(usize),
}

/// Column names plus rows, in column order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl ResultSet {
    /// Parse a JSON array of row objects
    ///
    /// Column order follows the keys of the first row. Empty input is an
    /// empty result.
    pub fn from_json_records(json: &str) -> Result<Self, InspectError> {
        if json.trim().is_empty() {
            return Ok(Self::default());
        }

        let records: Vec<serde_json::Map<String, Value>> =
            serde_json::from_str(json).map_err(|e| InspectError::InvalidResponse(e.to_string()))?;

        let columns: Vec<String> = records
            .first()
            .map(|row| row.keys().cloned().collect())
            .unwrap_or_default();

        let rows = records
            .iter()
            .map(|row| {
                columns
                    .iter()
                    .map(|c| row.get(c).cloned().unwrap_or(Value::Null))
                    .collect()
            })
            .collect();

        Ok(Self { columns, rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InspectError {
    #[error("'{0}' is not a valid relation name")]
    InvalidIdentifier(String),

    #[error("Database not found: {0}")]
    MissingDatabase(PathBuf),

    #[error("Failed to start {executable}: {message}")]
    Spawn { executable: String, message: String },

    #[error("Query against '{relation}' failed: {message}")]
    QueryFailed { relation: String, message: String },

    #[error("Unreadable query output: {0}")]
    InvalidResponse(String),
}

/// Reads the materialized result of one node
#[async_trait::async_trait]
pub trait ResultInspector: Send + Sync {
    async fn get_result(&self, relation: &str, mode: ResultMode) -> Result<ResultSet, InspectError>;
}

/// Queries a DuckDB database file through the `duckdb` CLI, read-only
#[derive(Debug, Clone)]
pub struct DuckDbInspector {
    executable: String,
    database: PathBuf,
}

impl DuckDbInspector {
    pub fn new(executable: impl Into<String>, database: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            database: database.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.inspect.executable.clone(),
            config.resolve(&config.inspect.database),
        )
    }

    /// SQL for one lookup; `relation` must be a plain identifier
    pub fn query(relation: &str, mode: ResultMode) -> Result<String, InspectError> {
        if !is_valid_identifier(relation) {
            return Err(InspectError::InvalidIdentifier(relation.to_string()));
        }

        Ok(match mode {
            ResultMode::All => format!("select * from \"{relation}\";"),
            ResultMode::Preview(limit) => format!("select * from \"{relation}\" limit {limit};"),
        })
    }
}

#[async_trait::async_trait]
impl ResultInspector for DuckDbInspector {
    async fn get_result(&self, relation: &str, mode: ResultMode) -> Result<ResultSet, InspectError> {
        let sql = Self::query(relation, mode)?;

        if !self.database.is_file() {
            return Err(InspectError::MissingDatabase(self.database.clone()));
        }

        tracing::debug!(relation, sql = %sql, db = %self.database.display(), "querying result");

        let output = Command::new(&self.executable)
            .arg("-json")
            .arg("-readonly")
            .arg(&self.database)
            .arg("-c")
            .arg(&sql)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| InspectError::Spawn {
                executable: self.executable.clone(),
                message: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(InspectError::QueryFailed {
                relation: relation.to_string(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        ResultSet::from_json_records(&String::from_utf8_lossy(&output.stdout))
    }
}
