//! Typed errors for each subsystem, one `thiserror`-derived enum per
//! component so failures stay contained to where they occur.

use thiserror::Error;

/// Errors surfaced by the ingest pipeline (C2). Per §7 these are contained:
/// logged and retried, never propagated to the caller of `append`.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("ingest buffer is full")]
    Full,
    #[error("flush transaction failed: {0}")]
    FlushFailed(#[source] duckdb::Error),
}

/// Errors from the hot store / writer handle (C3).
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("duckdb error: {0}")]
    Engine(#[from] duckdb::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from archival (C4). Per §4.4 step 8, export failure retains the
/// archive table for the next tick rather than propagating.
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("swap transaction failed: {0}")]
    SwapFailed(#[source] duckdb::Error),
    #[error("export of archive table {table} failed: {source}")]
    ExportFailed {
        table: String,
        #[source]
        source: duckdb::Error,
    },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from compaction (C5).
#[derive(Error, Debug)]
pub enum CompactError {
    #[error("failed to write merged file {path}: {source}")]
    WriteFailed {
        path: String,
        #[source]
        source: duckdb::Error,
    },
    #[error("failed to delete input file {path} after merge: {source}")]
    DeleteInputFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from retention (C6).
#[derive(Error, Debug)]
pub enum RetentionError {
    #[error("failed to delete cold file {path}: {source}")]
    DeleteFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from the query planner and executor (C8).
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("query must contain the literal placeholder `$events` exactly once, found {0}")]
    BadPlaceholder(usize),
    #[error("no data sources overlap the requested window")]
    NoDataSources,
    #[error("query execution was cancelled: {0}")]
    Cancelled(String),
    #[error("engine error: {0}")]
    Engine(#[from] duckdb::Error),
}

/// Errors from opening the facade: either side (writer or reader) of the
/// engine connection can fail independently at startup.
#[derive(Error, Debug)]
pub enum OpenError {
    #[error("failed to open hot store: {0}")]
    Store(#[from] StoreError),
    #[error("failed to open query engine: {0}")]
    Query(#[from] QueryError),
}
