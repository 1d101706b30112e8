//! Implicit selection inference.
//!
//! Runs after a reconciliation pass republished the list. Looks at the rows
//! that are new compared to the previous list and decides whether one of
//! them should take the selection. These are display heuristics; when none
//! fires the current selection is left alone.

use super::entry::{CatalogEntry, EntryIdentity};
use crate::artifact::ArtifactIdentity;
use crate::session::Session;
use std::collections::HashSet;

/// What the user currently has selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Selection {
    pub session: Session,
    pub artifact: Option<EntryIdentity>,
}

/// A selection the catalog should apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InferredSelection {
    Session(Session),
    Artifact {
        owner: Session,
        identity: ArtifactIdentity,
    },
}

/// Infers a new selection from the rows added between `previous` and `current`.
///
/// In order:
/// 1. exactly one new header row is alive: select that session;
/// 2. exactly one new child row, owned by a closed session and not
///    triggered remotely: select that artifact;
/// 3. one or more new imported session headers: select the first one.
///
/// Candidates are considered in `current` order. Returns `None` when nothing
/// fires or when the inferred selection is already selected.
pub fn infer_selection(
    previous: &[CatalogEntry],
    current: &[CatalogEntry],
    selection: &Selection,
) -> Option<InferredSelection> {
    let known: HashSet<EntryIdentity> = previous.iter().map(CatalogEntry::identity).collect();
    let added: Vec<&CatalogEntry> = current
        .iter()
        .filter(|entry| !known.contains(&entry.identity()))
        .collect();
    if added.is_empty() {
        return None;
    }

    let inferred = single_new_live_session(&added)
        .or_else(|| single_new_finished_artifact(&added))
        .or_else(|| first_new_imported_session(&added))?;

    let unchanged = match inferred {
        InferredSelection::Session(session) => {
            selection.session == session
                && matches!(selection.artifact, None | Some(EntryIdentity::Session { .. }))
        }
        InferredSelection::Artifact { owner, identity } => {
            selection.session == owner
                && selection.artifact == Some(EntryIdentity::Artifact(identity))
        }
    };
    (!unchanged).then_some(inferred)
}

fn single_new_live_session(added: &[&CatalogEntry]) -> Option<InferredSelection> {
    let mut live = added
        .iter()
        .filter(|e| e.is_session() && e.session().is_alive());
    let first = live.next()?;
    if live.next().is_some() {
        return None;
    }
    Some(InferredSelection::Session(*first.session()))
}

fn single_new_finished_artifact(added: &[&CatalogEntry]) -> Option<InferredSelection> {
    let mut children = added.iter().filter(|e| !e.is_session());
    let first = children.next()?;
    if children.next().is_some() {
        return None;
    }
    match first {
        CatalogEntry::Artifact {
            artifact, owner, ..
        } if !owner.is_alive() && !artifact.triggered_remotely => {
            Some(InferredSelection::Artifact {
                owner: *owner,
                identity: artifact.identity,
            })
        }
        _ => None,
    }
}

fn first_new_imported_session(added: &[&CatalogEntry]) -> Option<InferredSelection> {
    added
        .iter()
        .find(|e| e.is_imported_session())
        .map(|e| InferredSelection::Session(*e.session()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::{Artifact, ArtifactKind};
    use crate::event::CaptureInfo;
    use crate::session::{ONGOING_END_TIMESTAMP, SessionMetadata, SessionType};

    fn session(id: i64, alive: bool) -> Session {
        Session {
            session_id: id,
            stream_id: 1,
            pid: 10,
            start_timestamp: 0,
            end_timestamp: if alive { ONGOING_END_TIMESTAMP } else { 100 },
        }
    }

    fn header(session: Session, session_type: SessionType, epoch: i64) -> CatalogEntry {
        CatalogEntry::Session {
            session,
            metadata: SessionMetadata {
                session_id: session.session_id,
                session_type,
                start_timestamp_epoch_ms: epoch,
                ..Default::default()
            },
            summary: None,
        }
    }

    fn child(owner: Session, group_id: i64, triggered_remotely: bool) -> CatalogEntry {
        CatalogEntry::Artifact {
            artifact: Artifact {
                session_id: owner.session_id,
                name: "CPU Trace".to_string(),
                timestamp_ns: group_id,
                is_ongoing: false,
                triggered_remotely,
                identity: ArtifactIdentity {
                    kind: ArtifactKind::CpuCapture,
                    stream_id: owner.stream_id,
                    pid: owner.pid,
                    group_id,
                    info: CaptureInfo::new(group_id, Some(group_id + 1)),
                },
            },
            owner,
            owner_epoch_ms: 0,
        }
    }

    #[test]
    fn new_live_session_is_selected() {
        let live = session(2, true);
        let previous = vec![header(session(1, false), SessionType::Full, 1)];
        let current = vec![header(live, SessionType::Full, 2), previous[0].clone()];
        assert_eq!(
            infer_selection(&previous, &current, &Selection::default()),
            Some(InferredSelection::Session(live))
        );
    }

    #[test]
    fn finished_capture_in_closed_session_is_selected() {
        let owner = session(1, false);
        let previous = vec![header(owner, SessionType::Full, 1)];
        let current = vec![previous[0].clone(), child(owner, 7, false)];
        assert!(matches!(
            infer_selection(&previous, &current, &Selection::default()),
            Some(InferredSelection::Artifact { identity, .. }) if identity.group_id == 7
        ));
    }

    #[test]
    fn remote_or_live_captures_do_not_steal_selection() {
        let closed = session(1, false);
        let previous = vec![header(closed, SessionType::Full, 1)];
        let remote = vec![previous[0].clone(), child(closed, 7, true)];
        assert_eq!(infer_selection(&previous, &remote, &Selection::default()), None);

        let live = session(2, true);
        let previous = vec![header(live, SessionType::Full, 1)];
        let current = vec![previous[0].clone(), child(live, 7, false)];
        assert_eq!(infer_selection(&previous, &current, &Selection::default()), None);
    }

    #[test]
    fn two_new_children_leave_selection_alone() {
        let owner = session(1, false);
        let previous = vec![header(owner, SessionType::Full, 1)];
        let current = vec![previous[0].clone(), child(owner, 8, false), child(owner, 7, false)];
        assert_eq!(infer_selection(&previous, &current, &Selection::default()), None);
    }

    #[test]
    fn first_displayed_imported_session_wins() {
        let newer = session(1, false);
        let older = session(3, false);
        let current = vec![
            header(newer, SessionType::MemoryCapture, 200),
            header(older, SessionType::MemoryCapture, 100),
        ];
        assert_eq!(
            infer_selection(&[], &current, &Selection::default()),
            Some(InferredSelection::Session(newer))
        );
    }

    #[test]
    fn already_selected_is_not_reported() {
        let live = session(2, true);
        let current = vec![header(live, SessionType::Full, 2)];
        let selection = Selection {
            session: live,
            artifact: None,
        };
        assert_eq!(infer_selection(&[], &current, &selection), None);
    }

    #[test]
    fn unchanged_list_infers_nothing() {
        let current = vec![header(session(1, true), SessionType::Full, 1)];
        assert_eq!(infer_selection(&current, &current, &Selection::default()), None);
    }
}
