//! C3: Hot Store (writer side). Owns the live analytical database in
//! read-write mode and the `events_live` table (spec §4.3).

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use duckdb::Connection;

use crate::errors::StoreError;
use crate::event::Event;

pub const LIVE_TABLE: &str = "events_live";
const REVISION_INDEX_SUFFIX: &str = "revision_idx";

/// DDL for a fresh events table, parameterised by name so C4 can recreate
/// `events_live` and build archive tables with the same shape.
pub fn create_table_sql(table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {table} (
            revision VARCHAR,
            lastTimestamp BIGINT,
            metadata STRUCT(name VARCHAR, namespace VARCHAR, uid VARCHAR, resourceVersion VARCHAR, creationTimestamp VARCHAR),
            involvedObject STRUCT(kind VARCHAR, namespace VARCHAR, name VARCHAR, uid VARCHAR, apiVersion VARCHAR, resourceVersion VARCHAR, fieldPath VARCHAR),
            reason VARCHAR,
            message VARCHAR,
            source STRUCT(component VARCHAR, host VARCHAR),
            firstTimestampRaw VARCHAR,
            lastTimestampRaw VARCHAR,
            eventTimeRaw VARCHAR,
            count BIGINT,
            type VARCHAR,
            action VARCHAR,
            reportingComponent VARCHAR,
            reportingInstance VARCHAR,
            kind VARCHAR,
            apiVersion VARCHAR,
            series STRUCT(count BIGINT, lastObservedTime VARCHAR),
            related STRUCT(kind VARCHAR, namespace VARCHAR, name VARCHAR, uid VARCHAR, apiVersion VARCHAR, resourceVersion VARCHAR, fieldPath VARCHAR)
        )"
    )
}

fn create_index_sql(table: &str) -> String {
    format!(
        "CREATE UNIQUE INDEX IF NOT EXISTS {table}_{REVISION_INDEX_SUFFIX} ON {table}(revision)"
    )
}

fn drop_index_sql(table: &str) -> String {
    format!("DROP INDEX IF EXISTS {table}_{REVISION_INDEX_SUFFIX}")
}

const INSERT_SQL: &str = "INSERT INTO events_live VALUES (
    ?, ?,
    struct_pack(name := ?, namespace := ?, uid := ?, resourceVersion := ?, creationTimestamp := ?),
    struct_pack(kind := ?, namespace := ?, name := ?, uid := ?, apiVersion := ?, resourceVersion := ?, fieldPath := ?),
    ?, ?,
    struct_pack(component := ?, host := ?),
    ?, ?, ?,
    ?, ?, ?, ?, ?, ?,
    CASE WHEN ? THEN struct_pack(count := ?, lastObservedTime := ?) ELSE NULL END,
    CASE WHEN ? THEN struct_pack(kind := ?, namespace := ?, name := ?, uid := ?, apiVersion := ?, resourceVersion := ?, fieldPath := ?) ELSE NULL END
) ON CONFLICT (revision) DO NOTHING";

/// Owns the single writer connection shared by C2 (flush) and C4 (swap).
/// Concurrent mutation goes through the `Mutex`, matching spec §5's "writer
/// database handle mutated only by C2/C3/C4" rule.
pub struct HotStore {
    conn: Mutex<Connection>,
    db_path: PathBuf,
    /// Running estimate of `events_live`'s on-disk footprint, since DuckDB
    /// does not expose a cheap per-table byte size and only an *estimate*
    /// is needed for the archive trigger (§4.4). Reset to zero on every
    /// successful swap.
    approx_live_bytes: AtomicU64,
}

impl HotStore {
    /// Opens (creating if absent) the database at `db_path`. Deletes any
    /// stale write-ahead journal left by an unclean shutdown before opening,
    /// per §4.3.
    pub fn open(db_path: &Path) -> Result<HotStore, StoreError> {
        let wal_path = wal_journal_path(db_path);
        if wal_path.exists() {
            log::warn!("deleting stale WAL journal at {}", wal_path.display());
            std::fs::remove_file(&wal_path)?;
        }

        let conn = Connection::open(db_path)?;
        conn.execute(&create_table_sql(LIVE_TABLE), [])?;
        conn.execute(&create_index_sql(LIVE_TABLE), [])?;

        Ok(HotStore {
            conn: Mutex::new(conn),
            db_path: db_path.to_path_buf(),
            approx_live_bytes: AtomicU64::new(0),
        })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Insert a batch using the ignore-on-conflict semantic keyed on
    /// `revision` (spec §4.2). Runs as one transaction; any failure rolls
    /// back and the whole batch is left for the caller to retry.
    pub fn insert_batch(&self, events: &[Event]) -> Result<(), StoreError> {
        if events.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let mut bytes_written = 0u64;
        for event in events {
            let mut stmt = tx.prepare_cached(INSERT_SQL)?;
            stmt.execute(duckdb::params![
                event.revision(),
                event.last_timestamp_unix(),
                event.metadata.name,
                event.metadata.namespace,
                event.metadata.uid,
                event.metadata.resource_version,
                event.metadata.creation_timestamp,
                event.involved_object.kind,
                event.involved_object.namespace,
                event.involved_object.name,
                event.involved_object.uid,
                event.involved_object.api_version,
                event.involved_object.resource_version,
                event.involved_object.field_path,
                event.reason,
                event.message,
                event.source.component,
                event.source.host,
                event.first_timestamp,
                event.last_timestamp,
                event.event_time,
                event.count,
                event.type_,
                event.action,
                event.reporting_component,
                event.reporting_instance,
                event.kind,
                event.api_version,
                event.series.is_some(),
                event.series.as_ref().map(|s| s.count).unwrap_or_default(),
                event
                    .series
                    .as_ref()
                    .map(|s| s.last_observed_time.clone())
                    .unwrap_or_default(),
                event.related.is_some(),
                event.related.as_ref().map(|r| r.kind.clone()).unwrap_or_default(),
                event
                    .related
                    .as_ref()
                    .map(|r| r.namespace.clone())
                    .unwrap_or_default(),
                event.related.as_ref().map(|r| r.name.clone()).unwrap_or_default(),
                event.related.as_ref().map(|r| r.uid.clone()).unwrap_or_default(),
                event
                    .related
                    .as_ref()
                    .map(|r| r.api_version.clone())
                    .unwrap_or_default(),
                event
                    .related
                    .as_ref()
                    .map(|r| r.resource_version.clone())
                    .unwrap_or_default(),
                event
                    .related
                    .as_ref()
                    .map(|r| r.field_path.clone())
                    .unwrap_or_default(),
            ])?;
            bytes_written += serde_json::to_vec(event).map(|v| v.len() as u64).unwrap_or(0);
        }
        tx.commit()?;
        self.approx_live_bytes.fetch_add(bytes_written, Ordering::SeqCst);
        Ok(())
    }

    pub fn approx_live_bytes(&self) -> u64 {
        self.approx_live_bytes.load(Ordering::SeqCst)
    }

    pub fn reset_approx_live_bytes(&self) {
        self.approx_live_bytes.store(0, Ordering::SeqCst);
    }

    pub fn live_row_count(&self) -> Result<i64, StoreError> {
        let conn = self.conn.lock().unwrap();
        let count: i64 =
            conn.query_row(&format!("SELECT COUNT(*) FROM {LIVE_TABLE}"), [], |r| r.get(0))?;
        Ok(count)
    }

    /// Exclusive access to the writer connection, for C4's swap transaction.
    pub fn writer(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap()
    }
}

fn wal_journal_path(db_path: &Path) -> PathBuf {
    let mut name = db_path.file_name().unwrap_or_default().to_os_string();
    name.push(".wal");
    db_path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventSource, ObjectMeta, ObjectReference};

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
    fn open_creates_table_and_allows_insert() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("events.db");
        let store = HotStore::open(&db_path).unwrap();
        store.insert_batch(&[sample_event("1", 1000)]).unwrap();
        assert_eq!(store.live_row_count().unwrap(), 1);
    }

    #[test]
    fn duplicate_revision_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("events.db");
        let store = HotStore::open(&db_path).unwrap();
        store
            .insert_batch(&[sample_event("42", 10), sample_event("42", 10)])
            .unwrap();
        assert_eq!(store.live_row_count().unwrap(), 1);
    }

    #[test]
    fn stale_wal_journal_is_removed_on_open() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("events.db");
        HotStore::open(&db_path).unwrap();
        let wal = wal_journal_path(&db_path);
        std::fs::write(&wal, b"stale").unwrap();
        assert!(wal.exists());
        HotStore::open(&db_path).unwrap();
        assert!(!wal.exists());
    }
}
