//! C2: Ingest Pipeline (spec §4.2).

mod pipeline;

pub use pipeline::{IngestHandle, Pipeline};
