//! C2: Ingest Pipeline. A bounded channel from producers to a single
//! batch-inserter task; flush on size or timer (spec §4.2).

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::errors::IngestError;
use crate::event::Event;
use crate::observability::Counters;
use crate::store::HotStore;

/// Producer-facing handle. Cloning is cheap (wraps an `mpsc::Sender`); every
/// producer task gets its own clone.
#[derive(Clone)]
pub struct IngestHandle {
    sender: mpsc::Sender<Event>,
    counters: Arc<Counters>,
}

impl IngestHandle {
    /// Non-blocking append (spec §4.2): fails fast with `IngestError::Full`
    /// rather than ever blocking the caller.
    pub fn append(&self, event: Event) -> Result<(), IngestError> {
        self.sender.try_send(event).map_err(|e| {
            self.counters.event_rejected_full();
            match e {
                mpsc::error::TrySendError::Full(_) => IngestError::Full,
                mpsc::error::TrySendError::Closed(_) => IngestError::Full,
            }
        })
    }
}

/// Owns the receiving half and drives the batch-and-flush loop. Spawn via
/// [`Pipeline::spawn`]; the returned [`IngestHandle`]s are the only way
/// producers reach it.
pub struct Pipeline {
    receiver: mpsc::Receiver<Event>,
    hot: Arc<HotStore>,
    counters: Arc<Counters>,
    batch_size: usize,
    batch_interval: Duration,
}

impl Pipeline {
    pub fn new(
        hot: Arc<HotStore>,
        counters: Arc<Counters>,
        buffer_size: usize,
        batch_size: usize,
        batch_interval: Duration,
    ) -> (IngestHandle, Pipeline) {
        let (sender, receiver) = mpsc::channel(buffer_size);
        (
            IngestHandle {
                sender,
                counters: Arc::clone(&counters),
            },
            Pipeline {
                receiver,
                hot,
                counters,
                batch_size,
                batch_interval,
            },
        )
    }

    /// Run the batcher loop until `cancel` fires, then drain and flush any
    /// remainder before returning (spec §4.2: "the commit for the final
    /// batch must complete before the database handle is released").
    pub async fn run(mut self, cancel: CancellationToken) {
        let mut batch: Vec<Event> = Vec::with_capacity(self.batch_size);
        let mut tick = tokio::time::interval(self.batch_interval);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                maybe_event = self.receiver.recv() => {
                    match maybe_event {
                        Some(event) => {
                            batch.push(event);
                            if batch.len() >= self.batch_size {
                                self.flush(&mut batch).await;
                            }
                        }
                        None => break,
                    }
                }
                _ = tick.tick() => {
                    if !batch.is_empty() {
                        self.flush(&mut batch).await;
                    }
                }
            }
        }

        // Drain whatever producers already queued, non-blocking.
        while let Ok(event) = self.receiver.try_recv() {
            batch.push(event);
        }
        if !batch.is_empty() {
            self.flush(&mut batch).await;
        }
    }

    /// Flush writes one transaction using the insert-ignore semantic. On
    /// failure the transaction rolls back inside `insert_batch` and the
    /// batch is retained (not cleared) for the next attempt.
    async fn flush(&self, batch: &mut Vec<Event>) {
        let hot = Arc::clone(&self.hot);
        let events = batch.clone();
        let result = tokio::task::spawn_blocking(move || hot.insert_batch(&events)).await;

        match result {
            Ok(Ok(())) => {
                for _ in 0..batch.len() {
                    self.counters.event_ingested();
                }
                batch.clear();
            }
            Ok(Err(err)) => {
                log::warn!("ingest flush failed, batch retained for retry: {err}");
                self.counters.flush_failure();
            }
            Err(join_err) => {
                log::warn!("ingest flush task panicked: {join_err}");
                self.counters.flush_failure();
            }
        }
    }
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

    #[tokio::test]
    async fn flush_on_batch_size_then_drains_on_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let hot = Arc::new(HotStore::open(&dir.path().join("events.db")).unwrap());
        let counters = Arc::new(Counters::new());
        let (handle, pipeline) = Pipeline::new(
            Arc::clone(&hot),
            Arc::clone(&counters),
            100,
            2,
            Duration::from_secs(3600),
        );

        let cancel = CancellationToken::new();
        let run_cancel = cancel.clone();
        let runner = tokio::spawn(pipeline.run(run_cancel));

        for i in 0..5 {
            handle.append(sample_event(&i.to_string(), 1000 + i)).unwrap();
        }
        // Allow the size-triggered flushes (2 full batches of 2) to land.
        tokio::time::sleep(Duration::from_millis(50)).await;

        cancel.cancel();
        runner.await.unwrap();

        assert_eq!(hot.live_row_count().unwrap(), 5);
    }

    #[test]
    fn producer_overflow_fails_fast() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let dir = tempfile::tempdir().unwrap();
            let hot = Arc::new(HotStore::open(&dir.path().join("events.db")).unwrap());
            let counters = Arc::new(Counters::new());
            let (handle, _pipeline) =
                Pipeline::new(hot, counters, 1, 1_000, Duration::from_secs(3600));

            handle.append(sample_event("1", 1)).unwrap();
            let err = handle.append(sample_event("2", 2)).unwrap_err();
            assert!(matches!(err, IngestError::Full));
        });
    }
}
