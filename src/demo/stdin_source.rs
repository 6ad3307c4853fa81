//! A stdin-JSONL producer standing in for the orchestrator watch client
//! (spec §1, §6: out of scope, assumed to deliver an ordered stream of
//! event records). Useful for local exercising of the pipeline: pipe
//! newline-delimited `Event` JSON in and each line is appended.

use tokio::io::{AsyncBufReadExt, BufReader};

use crate::ingest::IngestHandle;

/// Reads JSON lines from `reader` until EOF, appending each as an `Event`.
/// Malformed lines are logged and skipped rather than aborting the stream,
/// matching the "reconnects and resumes" tolerance spec §6 expects of the
/// real watch client.
pub async fn run<R>(reader: R, handle: IngestHandle) -> usize
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    let mut appended = 0;
    while let Ok(Some(line)) = lines.next_line().await {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(&line) {
            Ok(event) => match handle.append(event) {
                Ok(()) => appended += 1,
                Err(err) => log::warn!("dropping event, ingest buffer rejected it: {err}"),
            },
            Err(err) => log::warn!("skipping unparseable event line: {err}"),
        }
    }
    appended
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::Pipeline;
    use crate::observability::Counters;
    use crate::store::HotStore;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn appends_well_formed_lines_and_skips_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let hot = Arc::new(HotStore::open(&dir.path().join("events.db")).unwrap());
        let counters = Arc::new(Counters::new());
        let (handle, pipeline) =
            Pipeline::new(Arc::clone(&hot), counters, 100, 1000, Duration::from_secs(3600));

        let event_json = serde_json::to_string(&crate::demo::generator::generate(1, 1000, 1)[0]).unwrap();
        let input = format!("{event_json}\nnot json\n\n");

        let appended = run(input.as_bytes(), handle).await;
        assert_eq!(appended, 1);

        drop(pipeline);
    }
}
