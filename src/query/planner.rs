//! C8 step 1-7: build the concrete SQL for a `$events`-templated query
//! (spec §4.8).

use std::path::Path;

use crate::errors::QueryError;
use crate::filenamer;

pub const PLACEHOLDER: &str = "$events";

/// One data source the plan selected, reported back to the caller as
/// execution metadata (spec §4.8 step 9).
#[derive(Debug, Clone)]
pub struct SourceMeta {
    pub label: String,
    pub size_bytes: u64,
}

#[derive(Debug, Clone)]
pub struct PlannedQuery {
    pub sql: String,
    pub sources: Vec<SourceMeta>,
}

/// Steps 2-7: enumerate cold files, select relevant sources via C1, build
/// and combine the hot/cold sub-selects, and substitute `$events` exactly
/// once.
pub fn plan(
    sql_template: &str,
    start: i64,
    end: i64,
    cold_dir: &Path,
) -> Result<PlannedQuery, QueryError> {
    let occurrences = sql_template.matches(PLACEHOLDER).count();
    if occurrences != 1 {
        return Err(QueryError::BadPlaceholder(occurrences));
    }

    let enumeration = filenamer::enumerate_cold_dir(cold_dir).map_err(|e| {
        QueryError::Engine(duckdb::Error::InvalidParameterName(e.to_string()))
    })?;
    let file_plan = filenamer::plan(&enumeration, start, end);

    if file_plan.is_empty() {
        return Err(QueryError::NoDataSources);
    }

    let mut subselects = Vec::new();
    let mut sources = Vec::new();

    if file_plan.include_hot {
        subselects.push(format!(
            "SELECT * FROM events_live WHERE lastTimestamp BETWEEN {start} AND {end}"
        ));
        sources.push(SourceMeta {
            label: "events_live".to_string(),
            size_bytes: 0,
        });
    }

    if !file_plan.cold_files.is_empty() {
        let file_list = file_plan
            .cold_files
            .iter()
            .map(|p| format!("'{}'", p.display()))
            .collect::<Vec<_>>()
            .join(", ");
        subselects.push(format!(
            "SELECT * FROM read_parquet([{file_list}]) WHERE lastTimestamp BETWEEN {start} AND {end}"
        ));
        for (path, size) in file_plan.cold_files.iter().zip(&file_plan.cold_sizes) {
            sources.push(SourceMeta {
                label: path.display().to_string(),
                size_bytes: *size,
            });
        }
    }

    let combined = if subselects.len() == 1 {
        format!("({})", subselects.remove(0))
    } else {
        format!("({} UNION BY NAME {})", subselects[0], subselects[1])
    };

    let sql = sql_template.replacen(PLACEHOLDER, &combined, 1);

    Ok(PlannedQuery { sql, sources })
}
