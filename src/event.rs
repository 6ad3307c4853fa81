//! The cluster event record ingested from the orchestrator watch stream (spec.md §3).

use serde::{Deserialize, Serialize};

/// Object reference embedded in an event (`involvedObject`, `related`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectReference {
    pub kind: String,
    pub namespace: String,
    pub name: String,
    pub uid: String,
    #[serde(rename = "apiVersion", default)]
    pub api_version: String,
    #[serde(rename = "resourceVersion", default)]
    pub resource_version: String,
    #[serde(rename = "fieldPath", default)]
    pub field_path: String,
}

/// `metadata` composite field. `resource_version` is the monotonic revision
/// token used as the ingestion uniqueness key (§3 invariant 1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectMeta {
    pub name: String,
    pub namespace: String,
    pub uid: String,
    #[serde(rename = "resourceVersion")]
    pub resource_version: String,
    #[serde(rename = "creationTimestamp", default)]
    pub creation_timestamp: String,
}

/// `source` composite field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventSource {
    #[serde(default)]
    pub component: String,
    #[serde(default)]
    pub host: String,
}

/// `series` composite field: present when the orchestrator collapses repeats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSeries {
    pub count: i64,
    #[serde(rename = "lastObservedTime")]
    pub last_observed_time: String,
}

/// A single cluster event, mirroring the shape described in spec.md §3.
///
/// `last_timestamp` is the authoritative event time used by the planner and
/// by cold file-name min/max encoding; `event_time` is present but treated
/// as unreliable, per spec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub metadata: ObjectMeta,
    #[serde(rename = "involvedObject")]
    pub involved_object: ObjectReference,
    pub reason: String,
    pub message: String,
    pub source: EventSource,
    #[serde(rename = "firstTimestamp")]
    pub first_timestamp: String,
    #[serde(rename = "lastTimestamp")]
    pub last_timestamp: String,
    #[serde(rename = "eventTime", default)]
    pub event_time: String,
    #[serde(default = "default_count")]
    pub count: i64,
    #[serde(rename = "type", default)]
    pub type_: String,
    #[serde(default)]
    pub action: String,
    #[serde(rename = "reportingComponent", default)]
    pub reporting_component: String,
    #[serde(rename = "reportingInstance", default)]
    pub reporting_instance: String,
    #[serde(default)]
    pub kind: String,
    #[serde(rename = "apiVersion", default)]
    pub api_version: String,
    pub series: Option<EventSeries>,
    pub related: Option<ObjectReference>,
}

fn default_count() -> i64 {
    1
}

impl Event {
    /// The revision token used as the unique ingestion key.
    pub fn revision(&self) -> &str {
        &self.metadata.resource_version
    }

    /// `lastTimestamp` parsed to Unix seconds, falling back to `firstTimestamp`
    /// and then `eventTime` if `lastTimestamp` is empty or unparseable.
    /// This is the authoritative event time for planning and file naming.
    pub fn last_timestamp_unix(&self) -> Option<i64> {
        parse_rfc3339_unix(&self.last_timestamp)
            .or_else(|| parse_rfc3339_unix(&self.first_timestamp))
            .or_else(|| parse_rfc3339_unix(&self.event_time))
    }
}

fn parse_rfc3339_unix(s: &str) -> Option<i64> {
    if s.is_empty() {
        return None;
    }
    chrono::DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.timestamp())
}
