//! Imported sessions.
//!
//! Historical data is turned into a private event stream bracketed by a
//! synthetic begin/end pair, so the catalog reconciles it exactly like live
//! data.

use crate::error::Result;
use crate::event::{Event, ImportedStream, SessionStarted};
use crate::session::SessionType;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use uuid::Uuid;

/// Namespace for deriving imported session ids.
const IMPORT_NAMESPACE: Uuid = Uuid::from_u128(0x6f1c_2a4e_9b3d_4e57_8a61_c0d2_e3f4_a5b6);

/// Everything needed to synthesize an imported session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedSession {
    pub name: String,
    pub session_type: SessionType,
    pub start_timestamp_ns: i64,
    pub end_timestamp_ns: i64,
    pub start_timestamp_epoch_ms: i64,
    /// Opaque capture payloads keyed by capture start time.
    pub payloads: HashMap<i64, Vec<u8>>,
    /// Raw events to replay inside the session; stream and pid are rewritten.
    pub events: Vec<Event>,
}

/// Loads a file of one format into an [`ImportedSession`].
#[async_trait]
pub trait ImportHandler: Send + Sync {
    async fn load(&self, path: &Path) -> Result<ImportedSession>;
}

/// Session id of an import.
///
/// Stable for the same name, capture time and import time; importing the
/// same file again later yields a new id.
pub fn imported_session_id(name: &str, start_timestamp_ns: i64, import_epoch_ms: i64) -> i64 {
    let uuid = Uuid::new_v5(
        &IMPORT_NAMESPACE,
        format!("{name}:{start_timestamp_ns}:{import_epoch_ms}").as_bytes(),
    );
    let (high, _) = uuid.as_u64_pair();
    // Positive and non-zero; zero is the "no session" id.
    ((high >> 1) as i64).max(1)
}

impl ImportedSession {
    /// Builds the private stream for this import.
    ///
    /// Stream id and session id are the same value; imported streams have no
    /// process, so every event is rewritten to pid 0.
    pub fn into_stream(self) -> ImportedStream {
        let session_id = imported_session_id(
            &self.name,
            self.start_timestamp_ns,
            self.start_timestamp_epoch_ms,
        );
        let pid = 0;

        let mut events = Vec::with_capacity(self.events.len() + 2);
        events.push(Event::session_started(
            self.start_timestamp_ns,
            SessionStarted {
                session_id,
                stream_id: session_id,
                pid,
                session_type: self.session_type,
                start_timestamp_epoch_ms: self.start_timestamp_epoch_ms,
                session_name: self.name.clone(),
                process_abi: String::new(),
                jvmti_enabled: false,
            },
        ));
        events.extend(self.events.into_iter().map(|event| Event {
            stream_id: session_id,
            pid,
            ..event
        }));
        events.push(Event::session_ended(
            session_id,
            pid,
            session_id,
            self.end_timestamp_ns,
        ));

        ImportedStream {
            stream_id: session_id,
            name: self.name,
            events,
            payloads: self.payloads,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{CaptureInfo, EventData, EventKind};

    #[test]
    fn session_id_is_stable_and_positive() {
        let a = imported_session_id("demo", 100, 5_000);
        assert_eq!(a, imported_session_id("demo", 100, 5_000));
        assert_ne!(a, imported_session_id("demo", 101, 5_000));
        assert_ne!(a, imported_session_id("demo", 100, 5_001));
        assert!(a > 0);
    }

    #[test]
    fn stream_brackets_raw_events() {
        let heap_dump = Event {
            stream_id: 99,
            pid: 1234,
            group_id: 150,
            kind: EventKind::HeapDump,
            timestamp: 150,
            is_ended: true,
            data: EventData::HeapDump(CaptureInfo::new(150, Some(151))),
        };
        let stream = ImportedSession {
            name: "dump.hprof".to_string(),
            session_type: SessionType::MemoryCapture,
            start_timestamp_ns: 100,
            end_timestamp_ns: 200,
            start_timestamp_epoch_ms: 1_700_000_000_000,
            payloads: HashMap::from([(150, vec![1, 2, 3])]),
            events: vec![heap_dump],
        }
        .into_stream();

        assert_eq!(stream.events.len(), 3);
        assert!(stream.events.iter().all(|e| e.stream_id == stream.stream_id && e.pid == 0));
        assert_eq!(stream.events[0].timestamp, 100);
        assert!(matches!(
            &stream.events[0].data,
            EventData::SessionStarted(s) if s.session_id == stream.stream_id
                && s.start_timestamp_epoch_ms == 1_700_000_000_000
        ));
        assert_eq!(stream.events[2].timestamp, 200);
        assert!(stream.events[2].is_ended);
        assert_eq!(stream.payloads[&150], vec![1, 2, 3]);
    }
}
