//! Event model shared by every event source.
//!
//! An event source is an append-only log. Events that belong together (the
//! begin and end of one session, the start and finish of one capture) share a
//! `group_id` and are handed out together as an [`EventGroup`].

use crate::session::SessionType;
use serde::{Deserialize, Serialize};

/// Identifier of a device or file-backed stream.
pub type StreamId = i64;

/// Kinds of event groups an event source can be asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Session,
    HeapDump,
    CpuTrace,
    MemoryAllocations,
    NativeHeap,
    Agent,
}

/// Payload of a session begin event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStarted {
    pub session_id: i64,
    pub stream_id: StreamId,
    pub pid: i32,
    pub session_type: SessionType,
    pub start_timestamp_epoch_ms: i64,
    pub session_name: String,
    #[serde(default)]
    pub process_abi: String,
    /// Whether the process can host the in-process profiling agent.
    #[serde(default)]
    pub jvmti_enabled: bool,
}

/// Time bounds of a capture. `end_timestamp` is `None` while it is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CaptureInfo {
    pub start_timestamp: i64,
    pub end_timestamp: Option<i64>,
}

impl CaptureInfo {
    pub fn new(start_timestamp: i64, end_timestamp: Option<i64>) -> Self {
        Self {
            start_timestamp,
            end_timestamp,
        }
    }

    pub fn is_ongoing(&self) -> bool {
        self.end_timestamp.is_none()
    }
}

/// Typed payload of an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventData {
    SessionStarted(SessionStarted),
    SessionEnded,
    HeapDump(CaptureInfo),
    CpuTrace {
        info: CaptureInfo,
        /// Set when the capture was started from outside the profiler
        /// (e.g. by the app itself through an API call).
        #[serde(default)]
        triggered_remotely: bool,
    },
    Allocations {
        info: CaptureInfo,
        #[serde(default)]
        legacy: bool,
    },
    NativeHeap(CaptureInfo),
    AgentStatus {
        attached: bool,
    },
}

/// A single timestamped entry of the event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub stream_id: StreamId,
    pub pid: i32,
    pub group_id: i64,
    pub kind: EventKind,
    /// Device time in nanoseconds.
    pub timestamp: i64,
    #[serde(default)]
    pub is_ended: bool,
    pub data: EventData,
}

impl Event {
    /// Builds the begin event of a session group.
    pub fn session_started(timestamp: i64, started: SessionStarted) -> Self {
        Self {
            stream_id: started.stream_id,
            pid: started.pid,
            group_id: started.session_id,
            kind: EventKind::Session,
            timestamp,
            is_ended: false,
            data: EventData::SessionStarted(started),
        }
    }

    /// Builds the end event of a session group.
    pub fn session_ended(stream_id: StreamId, pid: i32, session_id: i64, timestamp: i64) -> Self {
        Self {
            stream_id,
            pid,
            group_id: session_id,
            kind: EventKind::Session,
            timestamp,
            is_ended: true,
            data: EventData::SessionEnded,
        }
    }
}

/// All events sharing one group id, in append order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventGroup {
    pub group_id: i64,
    pub events: Vec<Event>,
}

impl EventGroup {
    pub fn new(group_id: i64, events: Vec<Event>) -> Self {
        Self { group_id, events }
    }

    pub fn first(&self) -> Option<&Event> {
        self.events.first()
    }

    pub fn last(&self) -> Option<&Event> {
        self.events.last()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// The session begin payload, if this is a session group.
    pub fn session_started(&self) -> Option<&SessionStarted> {
        match self.first().map(|e| &e.data) {
            Some(EventData::SessionStarted(started)) => Some(started),
            _ => None,
        }
    }
}

/// Filter passed to [`EventSource::query_groups`](super::EventSource::query_groups).
///
/// `None` stream / pid match everything. A group matches the time range when
/// it overlaps `[from_timestamp, to_timestamp]`; groups whose last event is
/// not an end event are treated as extending to infinity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupQuery {
    pub kind: EventKind,
    pub stream_id: Option<StreamId>,
    pub pid: Option<i32>,
    pub from_timestamp: i64,
    pub to_timestamp: i64,
}

impl GroupQuery {
    /// Every group of `kind`, across all streams.
    pub fn all(kind: EventKind) -> Self {
        Self {
            kind,
            stream_id: None,
            pid: None,
            from_timestamp: i64::MIN,
            to_timestamp: i64::MAX,
        }
    }

    /// Groups of `kind` produced by one process during `[from, to]`.
    pub fn scoped(kind: EventKind, stream_id: StreamId, pid: i32, from: i64, to: i64) -> Self {
        Self {
            kind,
            stream_id: Some(stream_id),
            pid: Some(pid),
            from_timestamp: from,
            to_timestamp: to,
        }
    }

    pub fn matches(&self, group: &EventGroup) -> bool {
        let (Some(first), Some(last)) = (group.first(), group.last()) else {
            return false;
        };
        if first.kind != self.kind {
            return false;
        }
        if self.stream_id.is_some_and(|s| s != first.stream_id) {
            return false;
        }
        if self.pid.is_some_and(|p| p != first.pid) {
            return false;
        }
        let group_end = if last.is_ended { last.timestamp } else { i64::MAX };
        first.timestamp <= self.to_timestamp && group_end >= self.from_timestamp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn heap_dump_group(pid: i32, from: i64, to: Option<i64>) -> EventGroup {
        let mut events = vec![Event {
            stream_id: 1,
            pid,
            group_id: from,
            kind: EventKind::HeapDump,
            timestamp: from,
            is_ended: false,
            data: EventData::HeapDump(CaptureInfo::new(from, None)),
        }];
        if let Some(to) = to {
            events.push(Event {
                timestamp: to,
                is_ended: true,
                data: EventData::HeapDump(CaptureInfo::new(from, Some(to))),
                ..events[0].clone()
            });
        }
        EventGroup::new(from, events)
    }

    #[test]
    fn scoped_query_filters_by_pid_and_range() {
        let query = GroupQuery::scoped(EventKind::HeapDump, 1, 10, 100, 200);
        assert!(query.matches(&heap_dump_group(10, 150, Some(160))));
        assert!(!query.matches(&heap_dump_group(11, 150, Some(160))));
        assert!(!query.matches(&heap_dump_group(10, 20, Some(30))));
        assert!(!query.matches(&heap_dump_group(10, 250, Some(260))));
    }

    #[test]
    fn open_group_extends_to_infinity() {
        let query = GroupQuery::scoped(EventKind::HeapDump, 1, 10, 100, 200);
        assert!(query.matches(&heap_dump_group(10, 50, None)));
    }

    #[test]
    fn kind_mismatch_never_matches() {
        let query = GroupQuery::all(EventKind::CpuTrace);
        assert!(!query.matches(&heap_dump_group(10, 50, Some(60))));
        assert!(!query.matches(&EventGroup::new(1, Vec::new())));
    }
}
