//! C6: Retention. Deletes oldest cold files until total size is within
//! budget (spec §4.6).

use std::path::{Path, PathBuf};

use crate::errors::RetentionError;
use crate::filenamer::{self, ColdFile};

#[derive(Debug, Clone, Default)]
pub struct RetentionReport {
    pub deleted: Vec<PathBuf>,
    pub bytes_freed: u64,
    pub remaining_bytes: u64,
}

/// Delete from the head of a name-encoded-start-timestamp-ascending sort
/// (ties broken by name) until total cold size <= budget. Unparseable
/// names sort first (treated as oldest, per the Open Questions resolution)
/// since their true age is unknown. A failing deletion stops the loop
/// (spec §4.6, §7).
pub fn enforce_budget(cold_dir: &Path, budget_bytes: u64) -> Result<RetentionReport, RetentionError> {
    let enumeration = match filenamer::enumerate_cold_dir(cold_dir) {
        Ok(e) => e,
        Err(source) => {
            return Err(RetentionError::DeleteFailed {
                path: cold_dir.display().to_string(),
                source,
            })
        }
    };

    let mut total: u64 = enumeration.parseable.iter().map(|f| f.size_bytes).sum();
    let unparseable_sizes: Vec<u64> = enumeration
        .unparseable
        .iter()
        .map(|p| std::fs::metadata(p).map(|m| m.len()).unwrap_or(0))
        .collect();
    total += unparseable_sizes.iter().sum::<u64>();

    let mut report = RetentionReport {
        remaining_bytes: total,
        ..Default::default()
    };

    if total <= budget_bytes {
        return Ok(report);
    }

    // Unparseable files first (oldest by convention), then parseable
    // ascending by (min_unix, name).
    let mut ordered: Vec<(PathBuf, u64)> = enumeration
        .unparseable
        .iter()
        .cloned()
        .zip(unparseable_sizes)
        .collect();
    let mut parseable: Vec<&ColdFile> = enumeration.parseable.iter().collect();
    parseable.sort_by(|a, b| {
        a.min_unix
            .cmp(&b.min_unix)
            .then_with(|| a.path.cmp(&b.path))
    });
    ordered.extend(parseable.into_iter().map(|f| (f.path.clone(), f.size_bytes)));

    for (path, size) in ordered {
        if report.remaining_bytes <= budget_bytes {
            break;
        }
        match std::fs::remove_file(&path) {
            Ok(()) => {
                report.deleted.push(path);
                report.bytes_freed += size;
                report.remaining_bytes = report.remaining_bytes.saturating_sub(size);
            }
            Err(source) => {
                return Err(RetentionError::DeleteFailed {
                    path: path.display().to_string(),
                    source,
                });
            }
        }
    }

    Ok(report)
}
