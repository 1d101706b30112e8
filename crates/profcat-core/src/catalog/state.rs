use super::entry::{CatalogEntry, EntryIdentity};
use super::selection::Selection;
use crate::session::{Session, SessionItem};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Last time range a consumer looked at for one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewRange {
    pub min_ns: i64,
    pub max_ns: i64,
}

/// Everything the catalog owns. Only touched under the manager's write lock.
#[derive(Debug, Default)]
pub(crate) struct CatalogState {
    pub(crate) items: BTreeMap<i64, SessionItem>,
    pub(crate) ordered: Vec<CatalogEntry>,
    pub(crate) selected: Session,
    pub(crate) selected_artifact: Option<EntryIdentity>,
    pub(crate) profiling: Session,
    pub(crate) view_ranges: HashMap<i64, ViewRange>,
    /// Ids removed by an explicit delete, kept until their group leaves the log.
    pub(crate) deleted: HashSet<i64>,
}

impl CatalogState {
    pub(crate) fn selection(&self) -> Selection {
        Selection {
            session: self.selected,
            artifact: self.selected_artifact,
        }
    }

    /// Points the selection at `session`. Returns whether the session changed.
    pub(crate) fn select_session(&mut self, session: Session) -> bool {
        if self.selected == session {
            return false;
        }
        if self.selected.session_id != session.session_id {
            self.selected_artifact = None;
        }
        self.selected = session;
        true
    }

    /// Sets the profiling session. Returns whether it changed.
    pub(crate) fn set_profiling(&mut self, session: Session) -> bool {
        if self.profiling == session {
            return false;
        }
        self.profiling = session;
        true
    }

    pub(crate) fn find_entry(&self, identity: &EntryIdentity) -> Option<&CatalogEntry> {
        self.ordered.iter().find(|entry| entry.identity() == *identity)
    }
}
