use std::sync::Arc;
use std::time::Duration;

use eventlake::demo::generator;
use eventlake::ingest::Pipeline;
use eventlake::store::HotStore;
use eventlake::{Counters, EventLake, Options};
use pretty_assertions::assert_eq;
use tempfile::tempdir;
use tokio_util::sync::CancellationToken;

fn base_options(dir: &std::path::Path) -> Options {
    let mut opts = Options::default();
    opts.db_path = dir.join("events.db");
    opts.cold_dir = dir.join("cold");
    opts.lifecycle_interval = Duration::from_secs(3600);
    opts.batch_size = 16;
    opts.batch_interval = Duration::from_millis(20);
    opts
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_ingestion_persists_across_restart() {
    let _ = env_logger::try_init();
    let dir = tempdir().unwrap();
    let opts = base_options(dir.path());

    let mut lake = EventLake::open(opts.clone()).unwrap();
    for event in generator::generate(200, 1_700_000_000, 0) {
        lake.append(event).unwrap();
    }
    tokio::time::sleep(Duration::from_millis(200)).await;

    let result = lake
        .range_query(
            "SELECT count(*) AS n FROM $events",
            1_699_000_000,
            1_701_000_000,
            CancellationToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(result.rows, vec![vec![serde_json::json!(200)]]);

    lake.shutdown(Duration::from_secs(5)).await;
    drop(lake);

    // Reopening against the same db_path must see the previously ingested rows.
    let mut lake = EventLake::open(opts).unwrap();
    let result = lake
        .range_query(
            "SELECT count(*) AS n FROM $events",
            1_699_000_000,
            1_701_000_000,
            CancellationToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(result.rows, vec![vec![serde_json::json!(200)]]);
    lake.shutdown(Duration::from_secs(5)).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_duplicate_revision_ignored_end_to_end() {
    let _ = env_logger::try_init();
    let dir = tempdir().unwrap();
    let opts = base_options(dir.path());
    let mut lake = EventLake::open(opts).unwrap();

    let events = generator::generate(1, 1_700_000_000, 42);
    lake.append(events[0].clone()).unwrap();
    lake.append(events[0].clone()).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let result = lake
        .range_query(
            "SELECT count(*) AS n FROM $events",
            1_699_000_000,
            1_701_000_000,
            CancellationToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(result.rows, vec![vec![serde_json::json!(1)]]);
    lake.shutdown(Duration::from_secs(5)).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_producer_backpressure_fails_fast_when_buffer_full() {
    let _ = env_logger::try_init();
    let dir = tempdir().unwrap();
    let hot = Arc::new(HotStore::open(&dir.path().join("events.db")).unwrap());
    let counters = Arc::new(Counters::new());
    // No pipeline task is spawned, so nothing ever drains the channel: the
    // buffer fills up after exactly `buffer_size` sends.
    let (handle, _pipeline) = Pipeline::new(hot, counters, 4, 1_000, Duration::from_secs(3600));

    let events = generator::generate(10, 1_700_000_000, 0);
    let mut saw_full = false;
    for event in events {
        if handle.append(event).is_err() {
            saw_full = true;
            break;
        }
    }
    assert!(saw_full, "expected the bounded ingest buffer to fill up");
}
