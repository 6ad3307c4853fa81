//! C8: Query Planner & Executor (spec §4.8). Exposes the `rangeQuery`
//! surface described in spec §6, consumed by whatever external collaborator
//! owns the HTTP/RPC front end (out of scope here).

mod executor;
mod planner;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

pub use executor::QueryResult;
pub use planner::{PlannedQuery, SourceMeta};

use crate::errors::QueryError;
use crate::observability::Counters;

pub struct QueryEngine {
    executor: executor::Executor,
    cold_dir: PathBuf,
    counters: Arc<Counters>,
}

impl QueryEngine {
    pub fn open(db_path: &Path, cold_dir: PathBuf, counters: Arc<Counters>) -> Result<QueryEngine, QueryError> {
        Ok(QueryEngine {
            executor: executor::Executor::open(db_path)?,
            cold_dir,
            counters,
        })
    }

    /// `rangeQuery(ctx, sqlWithPlaceholder, start, end) -> (rows, meta)`
    /// (spec §6): plan sources for `[start, end]`, rewrite `$events`,
    /// execute, and return rows plus execution metadata.
    pub async fn range_query(
        &self,
        sql_with_placeholder: &str,
        start: i64,
        end: i64,
        cancel: CancellationToken,
    ) -> Result<QueryResult, QueryError> {
        if cancel.is_cancelled() {
            self.counters.query_cancelled();
            return Err(QueryError::Cancelled("cancelled before planning".to_string()));
        }

        self.counters.query_run();
        let plan = planner::plan(sql_with_placeholder, start, end, &self.cold_dir);
        let plan = match plan {
            Ok(p) => p,
            Err(err) => {
                self.counters.query_failed();
                return Err(err);
            }
        };

        match self.executor.execute(plan, cancel).await {
            Ok(result) => Ok(result),
            Err(QueryError::Cancelled(reason)) => {
                self.counters.query_cancelled();
                Err(QueryError::Cancelled(reason))
            }
            Err(err) => {
                self.counters.query_failed();
                Err(err)
            }
        }
    }
}
