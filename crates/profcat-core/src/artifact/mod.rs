//! Session artifacts and the fetchers that produce them.

mod fetcher;
mod model;

pub use fetcher::{
    AllocationRecordFetcher, ArtifactFetcher, CpuCaptureFetcher, HeapDumpFetcher,
    LegacyAllocationRecordFetcher, NativeAllocationFetcher, default_fetchers,
};
pub use model::{Artifact, ArtifactIdentity, ArtifactKind};
