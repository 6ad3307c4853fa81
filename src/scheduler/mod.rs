//! C7: Lifecycle Scheduler. A single periodic timer driving archival,
//! compaction, then retention, in that order, with cooperative shutdown
//! (spec §4.7). The periodic-tick-under-cancellation shape follows the same
//! `tokio::select!` pattern used for scheduled background replication in
//! the wider pack (an async loop racing a cancellation future against a
//! sleep, looping until cancelled).

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::observability::Counters;
use crate::store::{archive, compactor, retention, HotStore};

pub struct Scheduler {
    hot: Arc<HotStore>,
    cold_dir: PathBuf,
    archive_byte_threshold: u64,
    compaction_threshold_bytes: u64,
    retention_budget_bytes: u64,
    interval: Duration,
    counters: Arc<Counters>,
}

impl Scheduler {
    pub fn new(
        hot: Arc<HotStore>,
        cold_dir: PathBuf,
        archive_byte_threshold: u64,
        compaction_threshold_bytes: u64,
        retention_budget_bytes: u64,
        interval: Duration,
        counters: Arc<Counters>,
    ) -> Scheduler {
        Scheduler {
            hot,
            cold_dir,
            archive_byte_threshold,
            compaction_threshold_bytes,
            retention_budget_bytes,
            interval,
            counters,
        }
    }

    /// Spawn the periodic loop. Runs one tick immediately if not already
    /// cancelled, then on every subsequent `interval` until `cancel` fires.
    pub fn spawn(self, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            if !cancel.is_cancelled() {
                self.tick(&cancel).await;
            }
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(self.interval) => {}
                }
                if cancel.is_cancelled() {
                    break;
                }
                self.tick(&cancel).await;
            }
        })
    }

    async fn tick(&self, cancel: &CancellationToken) {
        self.run_archive(cancel).await;
        if cancel.is_cancelled() {
            return;
        }
        self.run_compaction(cancel).await;
        if cancel.is_cancelled() {
            return;
        }
        self.run_retention().await;
    }

    async fn run_archive(&self, cancel: &CancellationToken) {
        let hot = Arc::clone(&self.hot);
        let cold_dir = self.cold_dir.clone();
        let threshold = self.archive_byte_threshold;
        let cancel = cancel.clone();
        let counters = Arc::clone(&self.counters);
        let result =
            tokio::task::spawn_blocking(move || archive::run_archive_cycle(&hot, &cold_dir, threshold, &cancel))
                .await;
        match result {
            Ok(Ok(Some(outcome))) => {
                counters.archive_started();
                if let Some(bytes) = Some(outcome.cold_file_bytes).filter(|_| outcome.cold_file.is_some()) {
                    counters.archive_exported(bytes);
                } else {
                    counters.archive_export_failure();
                }
            }
            Ok(Ok(None)) => {}
            Ok(Err(err)) => {
                log::warn!("archive tick failed: {err}");
                counters.archive_export_failure();
            }
            Err(join_err) => log::warn!("archive task panicked: {join_err}"),
        }
    }

    async fn run_compaction(&self, cancel: &CancellationToken) {
        let cold_dir = self.cold_dir.clone();
        let threshold = self.compaction_threshold_bytes;
        let cancel = cancel.clone();
        let counters = Arc::clone(&self.counters);
        let result =
            tokio::task::spawn_blocking(move || compactor::compact(&cold_dir, threshold, &cancel)).await;
        match result {
            Ok(Ok(outcomes)) => {
                for outcome in outcomes {
                    counters.compaction_run(outcome.output_bytes);
                }
            }
            Ok(Err(err)) => {
                log::warn!("compaction tick failed: {err}");
                match err {
                    crate::errors::CompactError::DeleteInputFailed { .. } => {
                        counters.compaction_delete_failure();
                    }
                    crate::errors::CompactError::WriteFailed { .. }
                    | crate::errors::CompactError::Io(_) => {
                        counters.compaction_write_failure();
                    }
                }
            }
            Err(join_err) => log::warn!("compaction task panicked: {join_err}"),
        }
    }

    async fn run_retention(&self) {
        let cold_dir = self.cold_dir.clone();
        let budget = self.retention_budget_bytes;
        let counters = Arc::clone(&self.counters);
        let result = tokio::task::spawn_blocking(move || retention::enforce_budget(&cold_dir, budget)).await;
        match result {
            Ok(Ok(report)) => {
                for _ in &report.deleted {
                    counters.retention_delete(report.bytes_freed / report.deleted.len().max(1) as u64);
                }
            }
            Ok(Err(err)) => {
                log::warn!("retention tick failed: {err}");
                counters.retention_delete_failure();
            }
            Err(join_err) => log::warn!("retention task panicked: {join_err}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tick_runs_archive_then_compaction_then_retention_without_panicking() {
        let dir = tempfile::tempdir().unwrap();
        let hot = Arc::new(HotStore::open(&dir.path().join("events.db")).unwrap());
        let scheduler = Scheduler::new(
            hot,
            dir.path().join("cold"),
            u64::MAX,
            u64::MAX,
            u64::MAX,
            Duration::from_secs(3600),
            Arc::new(Counters::new()),
        );
        let cancel = CancellationToken::new();
        scheduler.tick(&cancel).await;
    }

    #[tokio::test]
    async fn spawn_exits_promptly_on_cancel() {
        let dir = tempfile::tempdir().unwrap();
        let hot = Arc::new(HotStore::open(&dir.path().join("events.db")).unwrap());
        let scheduler = Scheduler::new(
            hot,
            dir.path().join("cold"),
            u64::MAX,
            u64::MAX,
            u64::MAX,
            Duration::from_secs(3600),
            Arc::new(Counters::new()),
        );
        let cancel = CancellationToken::new();
        let handle = scheduler.spawn(cancel.clone());
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("scheduler should exit promptly after cancellation")
            .unwrap();
    }
}
