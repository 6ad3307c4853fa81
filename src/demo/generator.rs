//! Synthetic event generator for exercising the pipeline and scheduler
//! without a real orchestrator watch client attached.

use rand::Rng;

use crate::event::{Event, EventSource, ObjectMeta, ObjectReference};

const REASONS: &[&str] = &["Scheduled", "Pulled", "Created", "Started", "Killing", "BackOff"];
const COMPONENTS: &[&str] = &["default-scheduler", "kubelet", "replicaset-controller"];

/// Generates `count` events with `lastTimestamp` monotonically increasing
/// by one second starting at `start_unix`, and distinct `resourceVersion`
/// values starting at `start_revision` (spec §8 scenario E1).
pub fn generate(count: usize, start_unix: i64, start_revision: u64) -> Vec<Event> {
    let mut rng = rand::rng();
    (0..count)
        .map(|i| {
            let ts = start_unix + i as i64;
            let revision = start_revision + i as u64;
            let reason = REASONS[rng.random_range(0..REASONS.len())];
            let component = COMPONENTS[rng.random_range(0..COMPONENTS.len())];
            let pod = format!("pod-{}", rng.random_range(0..1000));
            let last_timestamp = chrono::DateTime::from_timestamp(ts, 0)
                .unwrap()
                .to_rfc3339();

            Event {
                metadata: ObjectMeta {
                    name: format!("{pod}.{revision:x}"),
                    namespace: "default".to_string(),
                    uid: format!("uid-{revision}"),
                    resource_version: revision.to_string(),
                    creation_timestamp: last_timestamp.clone(),
                },
                involved_object: ObjectReference {
                    kind: "Pod".to_string(),
                    namespace: "default".to_string(),
                    name: pod,
                    uid: format!("uid-{revision}"),
                    api_version: "v1".to_string(),
                    resource_version: revision.to_string(),
                    field_path: String::new(),
                },
                reason: reason.to_string(),
                message: format!("{reason} event for revision {revision}"),
                source: EventSource {
                    component: component.to_string(),
                    host: String::new(),
                },
                first_timestamp: last_timestamp.clone(),
                last_timestamp,
                event_time: String::new(),
                count: 1,
                type_: "Normal".to_string(),
                action: String::new(),
                reporting_component: component.to_string(),
                reporting_instance: String::new(),
                kind: "Event".to_string(),
                api_version: "v1".to_string(),
                series: None,
                related: None,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_distinct_monotonic_events() {
        let events = generate(100, 1_700_000_000, 0);
        assert_eq!(events.len(), 100);
        let mut revisions: Vec<&str> = events.iter().map(|e| e.revision()).collect();
        revisions.sort();
        revisions.dedup();
        assert_eq!(revisions.len(), 100);

        for (i, event) in events.iter().enumerate() {
            assert_eq!(
                event.last_timestamp_unix(),
                Some(1_700_000_000 + i as i64)
            );
        }
    }
}
