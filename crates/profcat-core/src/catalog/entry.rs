//! Rows of the flattened, display-ordered catalog view.

use crate::artifact::{Artifact, ArtifactIdentity};
use crate::session::{Session, SessionItem, SessionMetadata};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Identity used to diff two published lists and to address selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "row", rename_all = "snake_case")]
pub enum EntryIdentity {
    Session {
        session: Session,
        summary: Option<ArtifactIdentity>,
    },
    Artifact(ArtifactIdentity),
}

/// One row of the published list: a session header or one of its artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "row", rename_all = "snake_case")]
pub enum CatalogEntry {
    Session {
        session: Session,
        metadata: SessionMetadata,
        /// Imported sessions show their single summarizing child in place.
        summary: Option<Artifact>,
    },
    Artifact {
        artifact: Artifact,
        owner: Session,
        owner_epoch_ms: i64,
    },
}

impl CatalogEntry {
    pub fn identity(&self) -> EntryIdentity {
        match self {
            CatalogEntry::Session {
                session, summary, ..
            } => EntryIdentity::Session {
                session: *session,
                summary: summary.as_ref().map(|a| a.identity),
            },
            CatalogEntry::Artifact { artifact, .. } => EntryIdentity::Artifact(artifact.identity),
        }
    }

    /// The session this row belongs to (itself for a header row).
    pub fn session(&self) -> &Session {
        match self {
            CatalogEntry::Session { session, .. } => session,
            CatalogEntry::Artifact { owner, .. } => owner,
        }
    }

    pub fn is_session(&self) -> bool {
        matches!(self, CatalogEntry::Session { .. })
    }

    pub fn is_imported_session(&self) -> bool {
        matches!(self, CatalogEntry::Session { metadata, .. } if metadata.session_type.is_imported())
    }

    fn epoch_ms(&self) -> i64 {
        match self {
            CatalogEntry::Session { metadata, .. } => metadata.start_timestamp_epoch_ms,
            CatalogEntry::Artifact { owner_epoch_ms, .. } => *owner_epoch_ms,
        }
    }

    fn timestamp_ns(&self) -> i64 {
        match self {
            CatalogEntry::Session { .. } => 0,
            CatalogEntry::Artifact { artifact, .. } => artifact.timestamp_ns,
        }
    }
}

/// Display order of catalog rows.
///
/// Newer sessions first (start epoch descending, then session id descending),
/// each session's header before its children, children newest first. Rows
/// comparing equal keep their relative order under a stable sort.
pub fn compare_entries(a: &CatalogEntry, b: &CatalogEntry) -> Ordering {
    b.epoch_ms()
        .cmp(&a.epoch_ms())
        .then_with(|| b.session().session_id.cmp(&a.session().session_id))
        .then_with(|| b.is_session().cmp(&a.is_session()))
        .then_with(|| b.timestamp_ns().cmp(&a.timestamp_ns()))
}

/// Flattens items into rows and sorts them with [`compare_entries`].
///
/// Live (`Full`) sessions contribute their children as rows of their own;
/// imported sessions keep them nested.
pub fn flatten_items<'a>(items: impl IntoIterator<Item = &'a SessionItem>) -> Vec<CatalogEntry> {
    let mut entries = Vec::new();
    for item in items {
        entries.push(CatalogEntry::Session {
            session: *item.session(),
            metadata: item.metadata().clone(),
            summary: item.summary_artifact().cloned(),
        });
        if item.is_imported() {
            continue;
        }
        entries.extend(item.child_artifacts().iter().map(|artifact| CatalogEntry::Artifact {
            artifact: artifact.clone(),
            owner: *item.session(),
            owner_epoch_ms: item.metadata().start_timestamp_epoch_ms,
        }));
    }
    entries.sort_by(compare_entries);
    entries
}

/// Whether two lists hold the same rows in the same order.
pub fn same_identities(a: &[CatalogEntry], b: &[CatalogEntry]) -> bool {
    a.len() == b.len()
        && a
            .iter()
            .zip(b.iter())
            .all(|(x, y)| x.identity() == y.identity())
}
