//! Runtime configuration: a plain struct with a `Default` impl carrying
//! the documented defaults, plus a `clap`-derived CLI front end.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

/// Recognised configuration options, with a `Default` impl carrying the
/// documented defaults.
#[derive(Clone, Debug)]
pub struct Options {
    /// Path to the writable database file.
    pub db_path: PathBuf,
    /// Path to the cold files directory. Defaults to the parent of `db_path`.
    pub cold_dir: PathBuf,
    /// Hot-table size above which archival fires.
    pub archive_byte_threshold: u64,
    /// Small-file cutoff for compaction.
    pub compaction_threshold_bytes: u64,
    /// Maximum total cold-file size.
    pub retention_budget_bytes: u64,
    /// Scheduler tick period.
    pub lifecycle_interval: Duration,
    /// Bounded ingest buffer capacity.
    pub ingest_buffer_size: usize,
    /// Flush trigger count.
    pub batch_size: usize,
    /// Flush trigger timer.
    pub batch_interval: Duration,
}

impl Default for Options {
    fn default() -> Options {
        Options {
            db_path: PathBuf::from("data/events.db"),
            cold_dir: PathBuf::from("data"),
            archive_byte_threshold: 128 * 1024 * 1024,
            compaction_threshold_bytes: 128 * 1024 * 1024,
            retention_budget_bytes: 10 * 1024 * 1024 * 1024,
            lifecycle_interval: Duration::from_secs(60),
            ingest_buffer_size: 10_000,
            batch_size: 1_000,
            batch_interval: Duration::from_secs(5),
        }
    }
}

impl Options {
    pub fn cold_file_extension() -> &'static str {
        "parquet"
    }
}

/// CLI front end for the `eventlaked` binary.
#[derive(Parser, Debug)]
#[command(name = "eventlaked", about = "Hot/cold event lake for cluster events")]
pub struct Cli {
    /// Path to the writable database file.
    #[arg(long, default_value = "data/events.db")]
    pub db_path: PathBuf,

    /// Path to the cold files directory (defaults to parent of db-path).
    #[arg(long)]
    pub cold_dir: Option<PathBuf>,

    /// Hot-table size (bytes) above which archival fires.
    #[arg(long, default_value_t = Options::default().archive_byte_threshold)]
    pub archive_byte_threshold: u64,

    /// Small-file cutoff for compaction (bytes).
    #[arg(long, default_value_t = Options::default().compaction_threshold_bytes)]
    pub compaction_threshold_bytes: u64,

    /// Maximum total cold-file size (bytes).
    #[arg(long, default_value_t = Options::default().retention_budget_bytes)]
    pub retention_budget_bytes: u64,

    /// Scheduler tick period, in seconds.
    #[arg(long, default_value_t = 60)]
    pub lifecycle_interval_secs: u64,

    /// Bounded ingest buffer capacity.
    #[arg(long, default_value_t = Options::default().ingest_buffer_size)]
    pub ingest_buffer_size: usize,

    /// Flush trigger count.
    #[arg(long, default_value_t = Options::default().batch_size)]
    pub batch_size: usize,

    /// Flush trigger timer, in seconds.
    #[arg(long, default_value_t = 5)]
    pub batch_interval_secs: u64,
}

impl From<Cli> for Options {
    fn from(cli: Cli) -> Options {
        let cold_dir = cli.cold_dir.unwrap_or_else(|| {
            cli.db_path
                .parent()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| PathBuf::from("."))
        });
        Options {
            db_path: cli.db_path,
            cold_dir,
            archive_byte_threshold: cli.archive_byte_threshold,
            compaction_threshold_bytes: cli.compaction_threshold_bytes,
            retention_budget_bytes: cli.retention_budget_bytes,
            lifecycle_interval: Duration::from_secs(cli.lifecycle_interval_secs),
            ingest_buffer_size: cli.ingest_buffer_size,
            batch_size: cli.batch_size,
            batch_interval: Duration::from_secs(cli.batch_interval_secs),
        }
    }
}
