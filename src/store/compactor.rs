//! C5: Compactor. Merges runs of small cold files into larger ones while
//! preserving ordering by `lastTimestamp` (spec §4.5).

use std::path::{Path, PathBuf};

use duckdb::Connection;
use tokio_util::sync::CancellationToken;

use crate::errors::CompactError;
use crate::filenamer::{self, format_file_name, ColdFile};

/// One completed merge: the inputs it consumed and the output it produced.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub inputs: Vec<PathBuf>,
    pub output: PathBuf,
    pub output_bytes: u64,
}

/// Sweep the cold directory once, ascending by start timestamp, and merge
/// every eligible run. A run is eligible when it has accumulated >= 2 files
/// with aggregate size > `threshold_bytes` before a file >= `threshold_bytes`
/// is encountered, or at the end of the sweep.
pub fn compact(
    cold_dir: &Path,
    threshold_bytes: u64,
    cancel: &CancellationToken,
) -> Result<Vec<MergeOutcome>, CompactError> {
    let enumeration = filenamer::enumerate_cold_dir(cold_dir)?;
    let mut files = enumeration.parseable;
    files.sort_by_key(|f| (f.min_unix, f.max_unix));

    let mut outcomes = Vec::new();
    let mut batch: Vec<ColdFile> = Vec::new();

    let mut flush_batch = |batch: &mut Vec<ColdFile>,
                           outcomes: &mut Vec<MergeOutcome>|
     -> Result<(), CompactError> {
        if batch.len() < 2 {
            batch.clear();
            return Ok(());
        }
        let aggregate: u64 = batch.iter().map(|f| f.size_bytes).sum();
        if aggregate <= threshold_bytes {
            batch.clear();
            return Ok(());
        }
        let outcome = merge_batch(cold_dir, batch)?;
        outcomes.push(outcome);
        batch.clear();
        Ok(())
    };

    for file in files {
        if cancel.is_cancelled() {
            break;
        }
        if file.size_bytes >= threshold_bytes {
            flush_batch(&mut batch, &mut outcomes)?;
            continue;
        }
        batch.push(file);
    }
    flush_batch(&mut batch, &mut outcomes)?;

    Ok(outcomes)
}

/// Merge a batch of inputs into a single output file, sorted ascending by
/// `lastTimestamp`, via a tempname derived from the batch's min/max. Deletes
/// the inputs only after a successful write.
fn merge_batch(cold_dir: &Path, batch: &[ColdFile]) -> Result<MergeOutcome, CompactError> {
    let min_unix = batch.iter().map(|f| f.min_unix).min().unwrap();
    let max_unix = batch.iter().map(|f| f.max_unix).max().unwrap();

    let final_name = format_file_name(min_unix, max_unix);
    let temp_name = format!(".{final_name}.tmp");
    let temp_path = cold_dir.join(&temp_name);
    let final_path = cold_dir.join(&final_name);

    let file_list = batch
        .iter()
        .map(|f| format!("'{}'", f.path.display()))
        .collect::<Vec<_>>()
        .join(", ");

    let conn = Connection::open_in_memory().map_err(|source| CompactError::WriteFailed {
        path: temp_path.display().to_string(),
        source,
    })?;

    let copy_sql = format!(
        "COPY (SELECT * FROM read_parquet([{file_list}]) ORDER BY lastTimestamp ASC) TO '{}' (FORMAT PARQUET, COMPRESSION ZSTD)",
        temp_path.display()
    );

    if let Err(source) = conn.execute(&copy_sql, []) {
        let _ = std::fs::remove_file(&temp_path);
        return Err(CompactError::WriteFailed {
            path: temp_path.display().to_string(),
            source,
        });
    }

    if let Err(e) = std::fs::rename(&temp_path, &final_path) {
        let _ = std::fs::remove_file(&temp_path);
        return Err(CompactError::Io(e));
    }

    for input in batch {
        if input.path == final_path {
            // The output happens to reuse an input's name (same min/max,
            // single-survivor edge case); nothing to delete.
            continue;
        }
        if let Err(source) = std::fs::remove_file(&input.path) {
            log::error!(
                "failed to delete compaction input {} after successful merge into {}: {source}; \
                 rows are now duplicated on disk until this is resolved manually",
                input.path.display(),
                final_path.display()
            );
            return Err(CompactError::DeleteInputFailed {
                path: input.path.display().to_string(),
                source,
            });
        }
    }

    let output_bytes = std::fs::metadata(&final_path).map(|m| m.len()).unwrap_or(0);

    Ok(MergeOutcome {
        inputs: batch.iter().map(|f| f.path.clone()).collect(),
        output: final_path,
        output_bytes,
    })
}
