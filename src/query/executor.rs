//! C8 step 8-9: execute a planned query on the read-only engine connection,
//! serialised through a reader mutex (spec §4.8, §5).

use std::path::Path;
use std::time::{Duration, Instant};

use duckdb::{AccessMode, Config, Connection};
use tokio::sync::Mutex as AsyncMutex;
use tokio_util::sync::CancellationToken;

use crate::errors::QueryError;
use crate::query::planner::{PlannedQuery, SourceMeta};

pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
    pub duration: Duration,
    pub sources: Vec<SourceMeta>,
}

/// Owns the single read-only connection. Queries run one at a time through
/// `reader` (spec §5: "a process-wide reader mutex bounds peak memory").
pub struct Executor {
    reader: AsyncMutex<Connection>,
}

impl Executor {
    pub fn open(db_path: &Path) -> Result<Executor, QueryError> {
        let config = Config::default()
            .access_mode(AccessMode::ReadOnly)
            .map_err(QueryError::Engine)?;
        let conn = Connection::open_with_flags(db_path, config).map_err(QueryError::Engine)?;
        Ok(Executor {
            reader: AsyncMutex::new(conn),
        })
    }

    /// Execute a planned query. `cancel` is checked before acquiring the
    /// reader mutex (fail-fast, spec §4.8 step 1) and the same token should
    /// be honoured by callers wrapping long engine calls in a timeout.
    pub async fn execute(
        &self,
        plan: PlannedQuery,
        cancel: CancellationToken,
    ) -> Result<QueryResult, QueryError> {
        if cancel.is_cancelled() {
            return Err(QueryError::Cancelled("cancelled before execution".to_string()));
        }

        let guard = self.reader.lock().await;
        if cancel.is_cancelled() {
            return Err(QueryError::Cancelled("cancelled while waiting for reader lock".to_string()));
        }

        let start = Instant::now();
        let (columns, rows) = run_query(&guard, &plan.sql)?;
        let duration = start.elapsed();

        Ok(QueryResult {
            columns,
            rows,
            duration,
            sources: plan.sources,
        })
    }
}

fn run_query(
    conn: &Connection,
    sql: &str,
) -> Result<(Vec<String>, Vec<Vec<serde_json::Value>>), QueryError> {
    let mut stmt = conn.prepare(sql).map_err(QueryError::Engine)?;
    let column_count = stmt.column_count();
    let columns: Vec<String> = (0..column_count)
        .map(|i| stmt.column_name(i).unwrap_or("?").to_string())
        .collect();

    let mut rows_out = Vec::new();
    let mut rows = stmt.query([]).map_err(QueryError::Engine)?;
    while let Some(row) = rows.next().map_err(QueryError::Engine)? {
        let mut values = Vec::with_capacity(column_count);
        for i in 0..column_count {
            let value: duckdb::types::Value = row.get(i).map_err(QueryError::Engine)?;
            values.push(value_to_json(value));
        }
        rows_out.push(values);
    }
    Ok((columns, rows_out))
}

/// Convert an engine value to JSON for the caller. Variants beyond the
/// scalar ones fall back to their debug representation rather than
/// enumerating every composite/temporal type the engine supports.
fn value_to_json(value: duckdb::types::Value) -> serde_json::Value {
    use duckdb::types::Value;
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Boolean(b) => serde_json::Value::Bool(b),
        Value::TinyInt(i) => serde_json::json!(i),
        Value::SmallInt(i) => serde_json::json!(i),
        Value::Int(i) => serde_json::json!(i),
        Value::BigInt(i) => serde_json::json!(i),
        Value::UTinyInt(i) => serde_json::json!(i),
        Value::USmallInt(i) => serde_json::json!(i),
        Value::UInt(i) => serde_json::json!(i),
        Value::UBigInt(i) => serde_json::json!(i),
        Value::Float(f) => serde_json::json!(f),
        Value::Double(f) => serde_json::json!(f),
        Value::Text(s) => serde_json::Value::String(s),
        Value::Blob(b) => serde_json::Value::String(hex::encode(&b)),
        other => serde_json::Value::String(format!("{other:?}")),
    }
}
