//! Stand-ins for the external collaborators spec §6 excludes from the
//! core: a synthetic event generator and a stdin-JSONL watch-stream
//! surrogate. Neither is part of the ingest/lifecycle/query core itself.

pub mod generator;
pub mod stdin_source;
