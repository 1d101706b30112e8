//! Artifact fetchers, one per artifact kind.
//!
//! A fetcher turns the event groups a session produced into artifacts. It is
//! a pure function of the session and its metadata apart from the round-trip
//! to the event source it was built with.

use super::model::{Artifact, ArtifactIdentity, ArtifactKind};
use crate::error::Result;
use crate::event::{CaptureInfo, EventData, EventGroup, EventKind, EventSource, GroupQuery};
use crate::session::{Session, SessionMetadata};
use async_trait::async_trait;
use std::sync::Arc;

/// Produces the artifacts of one kind that belong to a session.
#[async_trait]
pub trait ArtifactFetcher: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    async fn fetch(&self, session: &Session, metadata: &SessionMetadata) -> Result<Vec<Artifact>>;
}

/// Returns the fetchers for every built-in artifact kind.
pub fn default_fetchers(source: Arc<dyn EventSource>) -> Vec<Arc<dyn ArtifactFetcher>> {
    vec![
        Arc::new(HeapDumpFetcher::new(source.clone())),
        Arc::new(CpuCaptureFetcher::new(source.clone())),
        Arc::new(AllocationRecordFetcher::new(source.clone())),
        Arc::new(LegacyAllocationRecordFetcher::new(source.clone())),
        Arc::new(NativeAllocationFetcher::new(source)),
    ]
}

async fn session_groups(
    source: &dyn EventSource,
    kind: EventKind,
    session: &Session,
) -> Result<Vec<EventGroup>> {
    source
        .query_groups(GroupQuery::scoped(
            kind,
            session.stream_id,
            session.pid,
            session.start_timestamp,
            session.end_timestamp,
        ))
        .await
}

/// Maps each group's latest payload through `extract` into an artifact.
fn collect_artifacts<F>(session: &Session, groups: &[EventGroup], extract: F) -> Vec<Artifact>
where
    F: Fn(&EventData) -> Option<(ArtifactKind, CaptureInfo, bool)>,
{
    groups
        .iter()
        .filter_map(|group| {
            let last = group.last()?;
            let (kind, info, triggered_remotely) = extract(&last.data)?;
            Some(Artifact {
                session_id: session.session_id,
                name: kind.display_name().to_string(),
                timestamp_ns: info.start_timestamp - session.start_timestamp,
                is_ongoing: info.is_ongoing(),
                triggered_remotely,
                identity: ArtifactIdentity {
                    kind,
                    stream_id: last.stream_id,
                    pid: last.pid,
                    group_id: group.group_id,
                    info,
                },
            })
        })
        .collect()
}

/// Heap dumps.
pub struct HeapDumpFetcher {
    source: Arc<dyn EventSource>,
}

impl HeapDumpFetcher {
    pub fn new(source: Arc<dyn EventSource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl ArtifactFetcher for HeapDumpFetcher {
    fn name(&self) -> &'static str {
        "heap_dump"
    }

    async fn fetch(&self, session: &Session, _metadata: &SessionMetadata) -> Result<Vec<Artifact>> {
        let groups = session_groups(self.source.as_ref(), EventKind::HeapDump, session).await?;
        Ok(collect_artifacts(session, &groups, |data| match data {
            EventData::HeapDump(info) => Some((ArtifactKind::HeapDump, *info, false)),
            _ => None,
        }))
    }
}

/// CPU traces.
pub struct CpuCaptureFetcher {
    source: Arc<dyn EventSource>,
}

impl CpuCaptureFetcher {
    pub fn new(source: Arc<dyn EventSource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl ArtifactFetcher for CpuCaptureFetcher {
    fn name(&self) -> &'static str {
        "cpu_capture"
    }

    async fn fetch(&self, session: &Session, _metadata: &SessionMetadata) -> Result<Vec<Artifact>> {
        let groups = session_groups(self.source.as_ref(), EventKind::CpuTrace, session).await?;
        Ok(collect_artifacts(session, &groups, |data| match data {
            EventData::CpuTrace {
                info,
                triggered_remotely,
            } => Some((ArtifactKind::CpuCapture, *info, *triggered_remotely)),
            _ => None,
        }))
    }
}

/// Live Java allocation records.
pub struct AllocationRecordFetcher {
    source: Arc<dyn EventSource>,
}

impl AllocationRecordFetcher {
    pub fn new(source: Arc<dyn EventSource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl ArtifactFetcher for AllocationRecordFetcher {
    fn name(&self) -> &'static str {
        "allocation_record"
    }

    async fn fetch(&self, session: &Session, _metadata: &SessionMetadata) -> Result<Vec<Artifact>> {
        let groups =
            session_groups(self.source.as_ref(), EventKind::MemoryAllocations, session).await?;
        Ok(collect_artifacts(session, &groups, |data| match data {
            EventData::Allocations {
                info,
                legacy: false,
            } => Some((ArtifactKind::AllocationRecord, *info, false)),
            _ => None,
        }))
    }
}

/// Legacy allocation tracking records.
///
/// Legacy tracking only exists on processes without the agent, so nothing is
/// returned for an agent-enabled session.
pub struct LegacyAllocationRecordFetcher {
    source: Arc<dyn EventSource>,
}

impl LegacyAllocationRecordFetcher {
    pub fn new(source: Arc<dyn EventSource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl ArtifactFetcher for LegacyAllocationRecordFetcher {
    fn name(&self) -> &'static str {
        "legacy_allocation_record"
    }

    async fn fetch(&self, session: &Session, metadata: &SessionMetadata) -> Result<Vec<Artifact>> {
        if metadata.jvmti_enabled {
            return Ok(Vec::new());
        }
        let groups =
            session_groups(self.source.as_ref(), EventKind::MemoryAllocations, session).await?;
        Ok(collect_artifacts(session, &groups, |data| match data {
            EventData::Allocations { info, legacy: true } => {
                Some((ArtifactKind::LegacyAllocationRecord, *info, false))
            }
            _ => None,
        }))
    }
}

/// Native (heapprofd) allocation recordings.
pub struct NativeAllocationFetcher {
    source: Arc<dyn EventSource>,
}

impl NativeAllocationFetcher {
    pub fn new(source: Arc<dyn EventSource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl ArtifactFetcher for NativeAllocationFetcher {
    fn name(&self) -> &'static str {
        "native_allocation"
    }

    async fn fetch(&self, session: &Session, _metadata: &SessionMetadata) -> Result<Vec<Artifact>> {
        let groups = session_groups(self.source.as_ref(), EventKind::NativeHeap, session).await?;
        Ok(collect_artifacts(session, &groups, |data| match data {
            EventData::NativeHeap(info) => Some((ArtifactKind::NativeAllocationRecord, *info, false)),
            _ => None,
        }))
    }
}
