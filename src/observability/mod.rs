//! Lightweight process metrics: an atomic counter per tracked event kind,
//! incremented by the rest of the crate as it works, with a plain-data
//! snapshot for logging. No external exporter wiring lives here.

use std::sync::atomic::{AtomicU64, Ordering};

const ORDERING: Ordering = Ordering::SeqCst;

/// Process-wide counters. One instance is shared (via `Arc`) across the
/// ingest pipeline, lifecycle scheduler, and query executor.
#[derive(Debug, Default)]
pub struct Counters {
    events_ingested: AtomicU64,
    events_rejected_full: AtomicU64,
    flush_failures: AtomicU64,

    archives_started: AtomicU64,
    archives_exported: AtomicU64,
    archive_export_failures: AtomicU64,

    compactions_run: AtomicU64,
    compaction_write_failures: AtomicU64,
    compaction_delete_failures: AtomicU64,

    retention_deletes: AtomicU64,
    retention_delete_failures: AtomicU64,

    queries_run: AtomicU64,
    queries_failed: AtomicU64,
    queries_cancelled: AtomicU64,

    cold_bytes_written: AtomicU64,
    cold_bytes_deleted: AtomicU64,
}

impl Counters {
    pub fn new() -> Counters {
        Counters::default()
    }

    pub fn event_ingested(&self) {
        self.events_ingested.fetch_add(1, ORDERING);
    }

    pub fn events_ingested_count(&self) -> u64 {
        self.events_ingested.load(ORDERING)
    }

    pub fn event_rejected_full(&self) {
        self.events_rejected_full.fetch_add(1, ORDERING);
    }

    pub fn flush_failure(&self) {
        self.flush_failures.fetch_add(1, ORDERING);
    }

    pub fn archive_started(&self) {
        self.archives_started.fetch_add(1, ORDERING);
    }

    pub fn archive_exported(&self, bytes: u64) {
        self.archives_exported.fetch_add(1, ORDERING);
        self.cold_bytes_written.fetch_add(bytes, ORDERING);
    }

    pub fn archive_export_failure(&self) {
        self.archive_export_failures.fetch_add(1, ORDERING);
    }

    pub fn compaction_run(&self, output_bytes: u64) {
        self.compactions_run.fetch_add(1, ORDERING);
        self.cold_bytes_written.fetch_add(output_bytes, ORDERING);
    }

    pub fn compaction_write_failure(&self) {
        self.compaction_write_failures.fetch_add(1, ORDERING);
    }

    pub fn compaction_delete_failure(&self) {
        self.compaction_delete_failures.fetch_add(1, ORDERING);
    }

    pub fn retention_delete(&self, bytes: u64) {
        self.retention_deletes.fetch_add(1, ORDERING);
        self.cold_bytes_deleted.fetch_add(bytes, ORDERING);
    }

    pub fn retention_delete_failure(&self) {
        self.retention_delete_failures.fetch_add(1, ORDERING);
    }

    pub fn query_run(&self) {
        self.queries_run.fetch_add(1, ORDERING);
    }

    pub fn query_failed(&self) {
        self.queries_failed.fetch_add(1, ORDERING);
    }

    pub fn query_cancelled(&self) {
        self.queries_cancelled.fetch_add(1, ORDERING);
    }

    /// A point-in-time snapshot suitable for logging or an external exporter
    /// to scrape; this crate does not expose an HTTP endpoint for it.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            events_ingested: self.events_ingested.load(ORDERING),
            events_rejected_full: self.events_rejected_full.load(ORDERING),
            flush_failures: self.flush_failures.load(ORDERING),
            archives_started: self.archives_started.load(ORDERING),
            archives_exported: self.archives_exported.load(ORDERING),
            archive_export_failures: self.archive_export_failures.load(ORDERING),
            compactions_run: self.compactions_run.load(ORDERING),
            compaction_write_failures: self.compaction_write_failures.load(ORDERING),
            compaction_delete_failures: self.compaction_delete_failures.load(ORDERING),
            retention_deletes: self.retention_deletes.load(ORDERING),
            retention_delete_failures: self.retention_delete_failures.load(ORDERING),
            queries_run: self.queries_run.load(ORDERING),
            queries_failed: self.queries_failed.load(ORDERING),
            queries_cancelled: self.queries_cancelled.load(ORDERING),
            cold_bytes_written: self.cold_bytes_written.load(ORDERING),
            cold_bytes_deleted: self.cold_bytes_deleted.load(ORDERING),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub events_ingested: u64,
    pub events_rejected_full: u64,
    pub flush_failures: u64,
    pub archives_started: u64,
    pub archives_exported: u64,
    pub archive_export_failures: u64,
    pub compactions_run: u64,
    pub compaction_write_failures: u64,
    pub compaction_delete_failures: u64,
    pub retention_deletes: u64,
    pub retention_delete_failures: u64,
    pub queries_run: u64,
    pub queries_failed: u64,
    pub queries_cancelled: u64,
    pub cold_bytes_written: u64,
    pub cold_bytes_deleted: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let c = Counters::new();
        c.event_ingested();
        c.event_ingested();
        c.event_rejected_full();
        c.archive_exported(4096);
        let snap = c.snapshot();
        assert_eq!(snap.events_ingested, 2);
        assert_eq!(snap.events_rejected_full, 1);
        assert_eq!(snap.archives_exported, 1);
        assert_eq!(snap.cold_bytes_written, 4096);
    }
}
