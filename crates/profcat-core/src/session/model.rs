//! Session entity and metadata.

use serde::{Deserialize, Serialize};

/// End timestamp of a session that has not been observed ending yet.
pub const ONGOING_END_TIMESTAMP: i64 = i64::MAX;

/// How a session came into existence.
///
/// `Full` sessions are recorded live and materialize progressively. Every
/// other type is imported from a file and only shows up once both its begin
/// and end events are present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionType {
    #[default]
    Full,
    MemoryCapture,
    CpuCapture,
}

impl SessionType {
    pub fn is_imported(self) -> bool {
        self != SessionType::Full
    }
}

/// One profiling run, reconciled from its begin/end event pair.
///
/// The default value (id 0) stands for "no session".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Session {
    pub session_id: i64,
    pub stream_id: i64,
    pub pid: i32,
    /// Device time in nanoseconds.
    pub start_timestamp: i64,
    /// Device time in nanoseconds, [`ONGOING_END_TIMESTAMP`] while alive.
    pub end_timestamp: i64,
}

impl Session {
    pub fn is_alive(&self) -> bool {
        self.end_timestamp == ONGOING_END_TIMESTAMP
    }

    pub fn is_default(&self) -> bool {
        *self == Session::default()
    }

    /// Returns a copy closed at `end_timestamp`.
    pub fn closed_at(&self, end_timestamp: i64) -> Self {
        Self {
            end_timestamp,
            ..*self
        }
    }
}

/// Descriptive data attached to a session when it is first seen.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub session_id: i64,
    pub session_type: SessionType,
    /// Wall-clock start (or import time for imported sessions).
    pub start_timestamp_epoch_ms: i64,
    pub process_abi: String,
    pub session_name: String,
    /// Whether the profiled process can host the in-process agent.
    pub jvmti_enabled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_session_is_not_alive() {
        let session = Session::default();
        assert!(session.is_default());
        assert!(!session.is_alive());
    }

    #[test]
    fn closing_keeps_identity() {
        let open = Session {
            session_id: 7,
            stream_id: 1,
            pid: 10,
            start_timestamp: 100,
            end_timestamp: ONGOING_END_TIMESTAMP,
        };
        assert!(open.is_alive());
        let closed = open.closed_at(150);
        assert_eq!(closed.session_id, 7);
        assert_eq!(closed.end_timestamp, 150);
        assert!(!closed.is_alive());
    }

    #[test]
    fn only_full_sessions_are_live() {
        assert!(!SessionType::Full.is_imported());
        assert!(SessionType::MemoryCapture.is_imported());
        assert!(SessionType::CpuCapture.is_imported());
    }
}
