//! Ingest, lifecycle, and unified range-query core for a cluster event
//! stream: a bounded ingest pipeline feeding a hot analytical table,
//! hot-to-cold archival with a live-table swap, compaction of small cold
//! files, retention under a size budget, and a query planner/executor that
//! transparently unifies hot and cold data for a caller-supplied window.

pub mod config;
pub mod demo;
pub mod errors;
pub mod event;
pub mod filenamer;
pub mod ingest;
pub mod observability;
pub mod query;
pub mod scheduler;
pub mod store;

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

pub use config::Options;
pub use event::Event;
pub use observability::{Counters, Snapshot};

use errors::{IngestError, OpenError};
use ingest::{IngestHandle, Pipeline};
use query::{QueryEngine, QueryResult};
use scheduler::Scheduler;
use store::HotStore;

/// The facade applications embed: owns the hot store, the ingest pipeline,
/// the lifecycle scheduler, and the query engine, and wires cancellation
/// through all of them. `Drop` cancels background work so callers don't
/// have to remember to call `shutdown` explicitly.
pub struct EventLake {
    options: Options,
    hot: Arc<HotStore>,
    counters: Arc<Counters>,
    query_engine: Arc<QueryEngine>,
    ingest_handle: IngestHandle,
    cancel: CancellationToken,
    pipeline_task: Option<tokio::task::JoinHandle<()>>,
    scheduler_task: Option<tokio::task::JoinHandle<()>>,
}

impl EventLake {
    /// Opens the hot store and the read-only query connection, then spawns
    /// the ingest batcher and lifecycle scheduler tasks. Requires a running
    /// Tokio runtime (uses `tokio::spawn`/`spawn_blocking`).
    pub fn open(options: Options) -> Result<EventLake, OpenError> {
        let hot = Arc::new(HotStore::open(&options.db_path)?);
        let counters = Arc::new(Counters::new());
        let query_engine = Arc::new(QueryEngine::open(
            &options.db_path,
            options.cold_dir.clone(),
            Arc::clone(&counters),
        )?);

        let (ingest_handle, pipeline) = Pipeline::new(
            Arc::clone(&hot),
            Arc::clone(&counters),
            options.ingest_buffer_size,
            options.batch_size,
            options.batch_interval,
        );

        let cancel = CancellationToken::new();
        let pipeline_task = tokio::spawn(pipeline.run(cancel.clone()));

        let scheduler = Scheduler::new(
            Arc::clone(&hot),
            options.cold_dir.clone(),
            options.archive_byte_threshold,
            options.compaction_threshold_bytes,
            options.retention_budget_bytes,
            options.lifecycle_interval,
            Arc::clone(&counters),
        );
        let scheduler_task = scheduler.spawn(cancel.clone());

        Ok(EventLake {
            options,
            hot,
            counters,
            query_engine,
            ingest_handle,
            cancel,
            pipeline_task: Some(pipeline_task),
            scheduler_task: Some(scheduler_task),
        })
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// A cloneable producer handle; non-blocking, fails fast when the
    /// ingest buffer is full (spec §4.2).
    pub fn ingest_handle(&self) -> IngestHandle {
        self.ingest_handle.clone()
    }

    pub fn append(&self, event: Event) -> Result<(), IngestError> {
        self.ingest_handle.append(event)
    }

    /// `rangeQuery` (spec §6): plan sources for `[start, end]`, rewrite
    /// `$events`, execute, and return rows plus execution metadata.
    pub async fn range_query(
        &self,
        sql_with_placeholder: &str,
        start: i64,
        end: i64,
        cancel: CancellationToken,
    ) -> Result<QueryResult, errors::QueryError> {
        self.query_engine
            .range_query(sql_with_placeholder, start, end, cancel)
            .await
    }

    pub fn metrics(&self) -> Snapshot {
        self.counters.snapshot()
    }

    /// Point-in-time storage footprint: hot row count and byte estimate,
    /// plus the number and total size of cold files currently on disk.
    /// Table-stats-style introspection, generalized to this crate's
    /// hot/cold split rather than a single in-memory column tree.
    pub fn stats(&self) -> Result<Stats, errors::StoreError> {
        let hot_rows = self.hot.live_row_count()?;
        let hot_bytes = self.hot.approx_live_bytes();
        let enumeration = filenamer::enumerate_cold_dir(&self.options.cold_dir)?;
        let cold_files = enumeration.parseable.len() + enumeration.unparseable.len();
        let cold_bytes = enumeration.parseable.iter().map(|f| f.size_bytes).sum();
        Ok(Stats {
            hot_rows,
            hot_bytes,
            cold_files,
            cold_bytes,
        })
    }

    /// Cooperative shutdown: cancels the pipeline and scheduler tasks and
    /// waits (bounded by `timeout`) for the final ingest flush to land
    /// before the writer handle is dropped (spec §4.2, §9: "wait for
    /// ingest drain, close writer").
    pub async fn shutdown(&mut self, timeout: Duration) {
        self.cancel.cancel();
        if let Some(task) = self.pipeline_task.take() {
            let _ = tokio::time::timeout(timeout, task).await;
        }
        if let Some(task) = self.scheduler_task.take() {
            let _ = tokio::time::timeout(timeout, task).await;
        }
    }
}

impl Drop for EventLake {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Snapshot returned by [`EventLake::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    pub hot_rows: i64,
    pub hot_bytes: u64,
    pub cold_files: usize,
    pub cold_bytes: u64,
}
