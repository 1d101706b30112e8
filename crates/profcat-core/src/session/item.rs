use super::model::{Session, SessionMetadata};
use crate::artifact::Artifact;

/// Stateful wrapper around one session.
///
/// Owns the reconciled [`Session`] and its [`SessionMetadata`] together with
/// state derived between reconciliation passes: how long the session has been
/// running, whether it is still waiting for the profiling agent, and the
/// artifacts fetched for it on the last pass.
#[derive(Debug, Clone)]
pub struct SessionItem {
    session: Session,
    metadata: SessionMetadata,
    duration_ns: i64,
    waiting_for_agent: bool,
    child_artifacts: Vec<Artifact>,
}

impl SessionItem {
    pub fn new(session: Session, metadata: SessionMetadata) -> Self {
        let waiting_for_agent = session.is_alive() && metadata.jvmti_enabled;
        let duration_ns = if session.is_alive() {
            0
        } else {
            session.end_timestamp - session.start_timestamp
        };
        Self {
            session,
            metadata,
            duration_ns,
            waiting_for_agent,
            child_artifacts: Vec::new(),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn metadata(&self) -> &SessionMetadata {
        &self.metadata
    }

    pub fn session_id(&self) -> i64 {
        self.session.session_id
    }

    pub fn name(&self) -> &str {
        &self.metadata.session_name
    }

    pub fn is_alive(&self) -> bool {
        self.session.is_alive()
    }

    pub fn is_imported(&self) -> bool {
        self.metadata.session_type.is_imported()
    }

    pub fn duration_ns(&self) -> i64 {
        self.duration_ns
    }

    pub fn waiting_for_agent(&self) -> bool {
        self.waiting_for_agent
    }

    /// Closes the session at `end_timestamp`.
    ///
    /// Returns `false` if the session was already closed: the alive → closed
    /// transition happens once and is never reversed.
    pub fn close(&mut self, end_timestamp: i64) -> bool {
        if !self.session.is_alive() {
            return false;
        }
        self.session = self.session.closed_at(end_timestamp);
        self.duration_ns = end_timestamp - self.session.start_timestamp;
        self.waiting_for_agent = false;
        true
    }

    /// Advances the running duration. Returns whether anything changed.
    pub fn tick(&mut self, elapsed_ns: i64) -> bool {
        if !self.session.is_alive() || elapsed_ns <= 0 {
            return false;
        }
        self.duration_ns += elapsed_ns;
        true
    }

    /// Records the latest agent status. Returns whether the waiting flag flipped.
    pub fn set_agent_attached(&mut self, attached: bool) -> bool {
        let waiting = self.session.is_alive() && self.metadata.jvmti_enabled && !attached;
        let changed = waiting != self.waiting_for_agent;
        self.waiting_for_agent = waiting;
        changed
    }

    pub fn child_artifacts(&self) -> &[Artifact] {
        &self.child_artifacts
    }

    pub fn set_child_artifacts(&mut self, artifacts: Vec<Artifact>) {
        self.child_artifacts = artifacts;
    }

    /// For imported sessions, the single child shown in place of the session row.
    pub fn summary_artifact(&self) -> Option<&Artifact> {
        if self.is_imported() {
            self.child_artifacts.first()
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{ONGOING_END_TIMESTAMP, SessionType};

    fn live_item(jvmti_enabled: bool) -> SessionItem {
        SessionItem::new(
            Session {
                session_id: 1,
                stream_id: 1,
                pid: 10,
                start_timestamp: 100,
                end_timestamp: ONGOING_END_TIMESTAMP,
            },
            SessionMetadata {
                session_id: 1,
                jvmti_enabled,
                ..Default::default()
            },
        )
    }

    #[test]
    fn tick_accumulates_only_while_alive() {
        let mut item = live_item(false);
        assert!(item.tick(50));
        assert!(item.tick(25));
        assert_eq!(item.duration_ns(), 75);

        assert!(item.close(400));
        assert_eq!(item.duration_ns(), 300);
        assert!(!item.tick(50));
        assert_eq!(item.duration_ns(), 300);
    }

    #[test]
    fn close_is_one_way() {
        let mut item = live_item(false);
        assert!(item.close(200));
        assert!(!item.close(300));
        assert_eq!(item.session().end_timestamp, 200);
    }

    #[test]
    fn agent_wait_tracks_attachment() {
        let mut item = live_item(true);
        assert!(item.waiting_for_agent());
        assert!(item.set_agent_attached(true));
        assert!(!item.waiting_for_agent());
        assert!(!item.set_agent_attached(true));

        let mut no_agent = live_item(false);
        assert!(!no_agent.waiting_for_agent());
        assert!(!no_agent.set_agent_attached(false));
    }

    #[test]
    fn summary_only_for_imported_sessions() {
        let artifact = Artifact {
            session_id: 1,
            name: "Heap Dump".to_string(),
            timestamp_ns: 0,
            is_ongoing: false,
            triggered_remotely: false,
            identity: crate::artifact::ArtifactIdentity {
                kind: crate::artifact::ArtifactKind::HeapDump,
                stream_id: 1,
                pid: 0,
                group_id: 1,
                info: crate::event::CaptureInfo::new(100, Some(101)),
            },
        };

        let mut live = live_item(false);
        live.set_child_artifacts(vec![artifact.clone()]);
        assert!(live.summary_artifact().is_none());

        let mut imported = SessionItem::new(
            Session {
                session_id: 2,
                stream_id: 2,
                pid: 0,
                start_timestamp: 100,
                end_timestamp: 200,
            },
            SessionMetadata {
                session_id: 2,
                session_type: SessionType::MemoryCapture,
                ..Default::default()
            },
        );
        imported.set_child_artifacts(vec![artifact.clone()]);
        assert_eq!(imported.summary_artifact(), Some(&artifact));
        assert_eq!(imported.duration_ns(), 100);
    }
}
