//! C4: Archival. Atomically rotates `events_live` into a uniquely named
//! archive table, then exports that table to a cold columnar file and drops
//! it (spec §4.4).

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use tokio_util::sync::CancellationToken;

use crate::errors::ArchiveError;
use crate::filenamer::format_file_name;
use crate::store::hot::{create_table_sql, HotStore, LIVE_TABLE};

/// Outcome of one archive cycle that actually ran (the trigger condition
/// was met).
#[derive(Debug, Clone)]
pub struct ArchiveOutcome {
    pub archive_table: String,
    pub rows: i64,
    pub cold_file: Option<PathBuf>,
    pub cold_file_bytes: u64,
}

/// Should archival fire? Spec §4.4: estimated hot size exceeds the
/// threshold and at least one row exists.
pub fn should_archive(hot: &HotStore, threshold_bytes: u64) -> Result<bool, ArchiveError> {
    if hot.approx_live_bytes() < threshold_bytes {
        return Ok(false);
    }
    let rows = hot.live_row_count().map_err(|e| match e {
        crate::errors::StoreError::Engine(err) => ArchiveError::SwapFailed(err),
        crate::errors::StoreError::Io(io_err) => ArchiveError::Io(io_err),
    })?;
    Ok(rows > 0)
}

/// Step 1-5: swap `events_live` into a freshly named archive table and
/// recreate an empty live table, as a single transaction. Returns the
/// archive table's name.
fn swap(hot: &HotStore) -> Result<String, ArchiveError> {
    let epoch_nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let archive_table = format!("events_archive_{epoch_nanos}");

    let mut conn = hot.writer();
    let tx = conn.transaction().map_err(ArchiveError::SwapFailed)?;
    tx.execute(&format!("DROP INDEX IF EXISTS {LIVE_TABLE}_revision_idx"), [])
        .map_err(ArchiveError::SwapFailed)?;
    tx.execute(
        &format!("ALTER TABLE {LIVE_TABLE} RENAME TO {archive_table}"),
        [],
    )
    .map_err(ArchiveError::SwapFailed)?;
    tx.execute(&create_table_sql(LIVE_TABLE), [])
        .map_err(ArchiveError::SwapFailed)?;
    tx.execute(
        &format!("CREATE UNIQUE INDEX IF NOT EXISTS {LIVE_TABLE}_revision_idx ON {LIVE_TABLE}(revision)"),
        [],
    )
    .map_err(ArchiveError::SwapFailed)?;
    tx.commit().map_err(ArchiveError::SwapFailed)?;
    drop(conn);

    hot.reset_approx_live_bytes();
    Ok(archive_table)
}

/// Step 6-8: compute the archive table's `lastTimestamp` range, export to a
/// cold file, and drop the table on success. On export failure the archive
/// table is left in place for a later retry (spec §4.4 step 8, §7).
///
/// Opens its own connection to `hot`'s database file rather than taking
/// `hot.writer()`: the export is the slow step (a full `COPY...TO PARQUET`),
/// and holding the writer mutex across it would block C2's flushes into the
/// freshly swapped-in `events_live` for as long as the export runs. DuckDB
/// allows multiple connections to the same on-disk file from one process, so
/// this runs concurrently with ingest instead of serialising behind it.
fn export_and_drop(
    hot: &HotStore,
    cold_dir: &Path,
    archive_table: &str,
    cancel: &CancellationToken,
) -> Result<ArchiveOutcome, ArchiveError> {
    let conn = duckdb::Connection::open(hot.db_path()).map_err(|source| ArchiveError::ExportFailed {
        table: archive_table.to_string(),
        source,
    })?;

    let rows: i64 = conn
        .query_row(&format!("SELECT COUNT(*) FROM {archive_table}"), [], |r| {
            r.get(0)
        })
        .map_err(|source| ArchiveError::ExportFailed {
            table: archive_table.to_string(),
            source,
        })?;

    if cancel.is_cancelled() {
        return Ok(ArchiveOutcome {
            archive_table: archive_table.to_string(),
            rows,
            cold_file: None,
            cold_file_bytes: 0,
        });
    }

    let (min_unix, max_unix): (Option<i64>, Option<i64>) = conn
        .query_row(
            &format!("SELECT MIN(lastTimestamp), MAX(lastTimestamp) FROM {archive_table}"),
            [],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .unwrap_or((None, None));

    // Per the Open Questions resolution (DESIGN.md): fall back to "now" for
    // both bounds when extraction fails, rather than guessing a zero range.
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64;
    let min_unix = min_unix.unwrap_or(now);
    let max_unix = max_unix.unwrap_or(now);

    let file_name = format_file_name(min_unix, max_unix);
    let cold_path = cold_dir.join(&file_name);
    std::fs::create_dir_all(cold_dir)?;

    let copy_sql = format!(
        "COPY (SELECT * FROM {archive_table}) TO '{}' (FORMAT PARQUET, COMPRESSION ZSTD)",
        cold_path.display()
    );
    conn.execute(&copy_sql, [])
        .map_err(|source| ArchiveError::ExportFailed {
            table: archive_table.to_string(),
            source,
        })?;

    if cancel.is_cancelled() {
        log::warn!("archive export of {archive_table} completed but cancellation requested before drop");
    }

    conn.execute(&format!("DROP TABLE {archive_table}"), [])
        .map_err(|source| ArchiveError::ExportFailed {
            table: archive_table.to_string(),
            source,
        })?;

    let cold_file_bytes = std::fs::metadata(&cold_path).map(|m| m.len()).unwrap_or(0);

    Ok(ArchiveOutcome {
        archive_table: archive_table.to_string(),
        rows,
        cold_file: Some(cold_path),
        cold_file_bytes,
    })
}

/// Run one archive cycle if the trigger condition holds. Intended to be
/// invoked from a blocking context (e.g. `tokio::task::spawn_blocking`) by
/// the scheduler, since both the swap and the export below are blocking
/// `duckdb` calls.
pub fn run_archive_cycle(
    hot: &HotStore,
    cold_dir: &Path,
    threshold_bytes: u64,
    cancel: &CancellationToken,
) -> Result<Option<ArchiveOutcome>, ArchiveError> {
    if cancel.is_cancelled() {
        return Ok(None);
    }
    if !should_archive(hot, threshold_bytes)? {
        return Ok(None);
    }
    let archive_table = swap(hot)?;
    let outcome = export_and_drop(hot, cold_dir, &archive_table, cancel)?;
    Ok(Some(outcome))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Event, EventSource, ObjectMeta, ObjectReference};

    fn sample_event(rv: &str, last_ts_unix: i64) -> Event {
        Event {
            metadata: ObjectMeta {
                name: "pod-1".into(),
                namespace: "default".into(),
                uid: "uid-1".into(),
                resource_version: rv.into(),
                creation_timestamp: String::new(),
            },
            involved_object: ObjectReference {
                kind: "Pod".into(),
                namespace: "default".into(),
                name: "pod-1".into(),
                uid: "uid-1".into(),
                api_version: "v1".into(),
                resource_version: rv.into(),
                field_path: String::new(),
            },
            reason: "Scheduled".into(),
            message: "msg".into(),
            source: EventSource {
                component: "scheduler".into(),
                host: String::new(),
            },
            first_timestamp: chrono::DateTime::from_timestamp(last_ts_unix, 0)
                .unwrap()
                .to_rfc3339(),
            last_timestamp: chrono::DateTime::from_timestamp(last_ts_unix, 0)
                .unwrap()
                .to_rfc3339(),
            event_time: String::new(),
            count: 1,
            type_: "Normal".into(),
            action: String::new(),
            reporting_component: String::new(),
            reporting_instance: String::new(),
            kind: "Event".into(),
            api_version: "v1".into(),
            series: None,
            related: None,
        }
    }

    #[test]
    fn s5_archive_produces_one_cold_file_and_empties_live() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("events.db");
        let cold_dir = dir.path().join("cold");
        let hot = HotStore::open(&db_path).unwrap();

        let events: Vec<Event> = (5..=50).map(|t| sample_event(&t.to_string(), t)).collect();
        hot.insert_batch(&events).unwrap();

        let cancel = CancellationToken::new();
        let outcome = run_archive_cycle(&hot, &cold_dir, 0, &cancel)
            .unwrap()
            .expect("archive should have triggered");

        assert_eq!(outcome.rows, 46);
        assert_eq!(hot.live_row_count().unwrap(), 0);
        let cold_file = outcome.cold_file.expect("export should have produced a file");
        assert_eq!(
            cold_file.file_name().unwrap().to_str().unwrap(),
            "events_5_50.parquet"
        );
        assert!(cold_file.exists());
    }

    #[test]
    fn no_archive_below_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("events.db");
        let cold_dir = dir.path().join("cold");
        let hot = HotStore::open(&db_path).unwrap();
        hot.insert_batch(&[sample_event("1", 1000)]).unwrap();

        let cancel = CancellationToken::new();
        let outcome = run_archive_cycle(&hot, &cold_dir, u64::MAX, &cancel).unwrap();
        assert!(outcome.is_none());
        assert_eq!(hot.live_row_count().unwrap(), 1);
    }
}
