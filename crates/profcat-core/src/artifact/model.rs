//! Artifact domain model.

use crate::event::{CaptureInfo, StreamId};
use serde::{Deserialize, Serialize};

/// The kinds of child data products a session can own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    HeapDump,
    CpuCapture,
    AllocationRecord,
    LegacyAllocationRecord,
    NativeAllocationRecord,
}

impl ArtifactKind {
    pub fn display_name(self) -> &'static str {
        match self {
            ArtifactKind::HeapDump => "Heap Dump",
            ArtifactKind::CpuCapture => "CPU Trace",
            ArtifactKind::AllocationRecord => "Allocation Records",
            ArtifactKind::LegacyAllocationRecord => "Allocation Records (legacy)",
            ArtifactKind::NativeAllocationRecord => "Native Allocations",
        }
    }
}

/// Equality key of the record an artifact was built from.
///
/// Two artifacts from different reconciliation passes are "the same" exactly
/// when their identities are equal. A capture that finishes changes its
/// `info`, and therefore its identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactIdentity {
    pub kind: ArtifactKind,
    pub stream_id: StreamId,
    pub pid: i32,
    pub group_id: i64,
    pub info: CaptureInfo,
}

/// One selectable child entity of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub session_id: i64,
    pub name: String,
    /// Capture start relative to the owning session's start.
    pub timestamp_ns: i64,
    pub is_ongoing: bool,
    /// Started outside the profiler, so it should not steal selection.
    pub triggered_remotely: bool,
    pub identity: ArtifactIdentity,
}

impl Artifact {
    pub fn kind(&self) -> ArtifactKind {
        self.identity.kind
    }
}
