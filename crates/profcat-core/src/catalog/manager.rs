use super::aspect::{AspectPublisher, PendingAspects, SessionAspect};
use super::entry::{CatalogEntry, EntryIdentity, flatten_items, same_identities};
use super::import::{ImportHandler, ImportedSession};
use super::selection::{InferredSelection, infer_selection};
use super::state::{CatalogState, ViewRange};
use crate::artifact::{ArtifactFetcher, default_fetchers};
use crate::device::{Device, NoopProcessHost, Process, ProcessHost, agent_supported, build_session_name};
use crate::event::{
    BeginSessionRequest, Command, EventData, EventGroup, EventKind, EventSource, GroupQuery,
};
use crate::session::{ONGOING_END_TIMESTAMP, Session, SessionItem, SessionMetadata};
use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{RwLock, broadcast};

/// The session catalog of one profiling connection.
///
/// `SessionsManager` is responsible for:
/// - Reconciling session event groups into [`SessionItem`]s
/// - Aggregating every item's artifacts into one display-ordered list
/// - Tracking the selected session, selected artifact and profiling session
/// - Dispatching begin / end / delete commands and registering imports
///
/// All catalog state lives behind a single write lock: every public
/// operation is one atomic transition, and only one reconciliation pass
/// runs at a time. Commands are fire-and-forget; their effect is observed on
/// a later [`reconcile`](Self::reconcile).
pub struct SessionsManager {
    source: Arc<dyn EventSource>,
    host: Arc<dyn ProcessHost>,
    fetchers: RwLock<Vec<Arc<dyn ArtifactFetcher>>>,
    import_handlers: RwLock<HashMap<String, Arc<dyn ImportHandler>>>,
    state: RwLock<CatalogState>,
    aspects: AspectPublisher,
}

impl SessionsManager {
    /// Creates a catalog over `source` with the built-in artifact fetchers.
    pub fn new(source: Arc<dyn EventSource>) -> Self {
        let fetchers = default_fetchers(source.clone());
        Self {
            source,
            host: Arc::new(NoopProcessHost),
            fetchers: RwLock::new(fetchers),
            import_handlers: RwLock::new(HashMap::new()),
            state: RwLock::new(CatalogState::default()),
            aspects: AspectPublisher::new(),
        }
    }

    /// Replaces the artifact fetchers.
    pub fn with_fetchers(mut self, fetchers: Vec<Arc<dyn ArtifactFetcher>>) -> Self {
        self.fetchers = RwLock::new(fetchers);
        self
    }

    /// Sets the device/process layer used to stop a deleted profiling session.
    pub fn with_process_host(mut self, host: Arc<dyn ProcessHost>) -> Self {
        self.host = host;
        self
    }

    /// Subscribes to change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionAspect> {
        self.aspects.subscribe()
    }

    pub async fn register_fetcher(&self, fetcher: Arc<dyn ArtifactFetcher>) {
        self.fetchers.write().await.push(fetcher);
    }

    // ============================================================================
    // Reconciliation
    // ============================================================================

    /// Re-derives the catalog from the event source.
    ///
    /// Publishes [`SessionAspect::SessionsChanged`] only when the ordered list
    /// differs (by row identity) from the previous one. A failing event
    /// source leaves the catalog untouched.
    pub async fn reconcile(&self) {
        let mut groups = match self
            .source
            .query_groups(GroupQuery::all(EventKind::Session))
            .await
        {
            Ok(groups) => groups,
            Err(e) => {
                tracing::warn!("Session query failed, keeping current catalog: {}", e);
                return;
            }
        };
        sort_for_processing(&mut groups);

        let fetchers = self.fetchers.read().await.clone();
        let mut state = self.state.write().await;
        let mut pending = PendingAspects::default();
        let mut auto_selected = false;

        let mut seen = HashSet::new();
        for group in &groups {
            if !seen.insert(group.group_id) {
                tracing::debug!(group_id = group.group_id, "Skipping duplicate session group");
                continue;
            }
            apply_group(&mut state, group, &mut auto_selected, &mut pending);
        }
        // A tombstone is only needed while its group is still in the log
        state.deleted.retain(|id| seen.contains(id));

        self.refresh_agent_status(&mut state, &mut pending).await;
        refresh_children(&mut state, &fetchers).await;

        let ordered = flatten_items(state.items.values());
        if !same_identities(&state.ordered, &ordered) {
            let previous = std::mem::replace(&mut state.ordered, ordered);
            pending.mark(SessionAspect::SessionsChanged);
            tracing::debug!(
                rows = state.ordered.len(),
                sessions = state.items.len(),
                "Catalog republished"
            );
            retarget_selected_header(&mut state);
            if let Some(inferred) = infer_selection(&previous, &state.ordered, &state.selection()) {
                apply_inferred(&mut state, inferred, &mut pending);
            }
        }

        drop(state);
        self.publish(pending);
    }

    async fn refresh_agent_status(&self, state: &mut CatalogState, pending: &mut PendingAspects) {
        let waiting = state
            .items
            .values_mut()
            .filter(|item| item.is_alive() && item.metadata().jvmti_enabled);
        for item in waiting {
            let session = *item.session();
            let query = GroupQuery::scoped(
                EventKind::Agent,
                session.stream_id,
                session.pid,
                session.start_timestamp,
                session.end_timestamp,
            );
            match self.source.query_groups(query).await {
                Ok(groups) => {
                    let attached = groups
                        .iter()
                        .flat_map(|group| group.events.iter())
                        .max_by_key(|event| event.timestamp)
                        .is_some_and(|event| {
                            matches!(event.data, EventData::AgentStatus { attached: true })
                        });
                    if item.set_agent_attached(attached) {
                        pending.mark(SessionAspect::ItemsUpdated);
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        session_id = session.session_id,
                        "Agent status query failed: {}",
                        e
                    );
                }
            }
        }
    }

    /// Advances the running duration of every live session.
    pub async fn tick(&self, elapsed_ns: i64) {
        let mut state = self.state.write().await;
        let mut changed = false;
        for item in state.items.values_mut() {
            changed |= item.tick(elapsed_ns);
        }
        drop(state);

        if changed {
            let mut pending = PendingAspects::default();
            pending.mark(SessionAspect::ItemsUpdated);
            self.publish(pending);
        }
    }

    // ============================================================================
    // Mutations
    // ============================================================================

    /// Asks the event source to begin profiling `process` on `stream_id`.
    ///
    /// Does not create a session item; it appears on a later reconciliation.
    /// Calling this while a session is profiling, or for an offline device or
    /// dead process, is a contract violation.
    pub async fn begin_session(&self, stream_id: i64, device: &Device, process: &Process) {
        let state = self.state.write().await;
        let violation = if !state.profiling.is_default() {
            Some("a session is already profiling")
        } else if !device.is_online() {
            Some("device is not online")
        } else if !process.is_alive() {
            Some("process is not alive")
        } else {
            None
        };

        if let Some(reason) = violation {
            drop(state);
            tracing::warn!(stream_id, pid = process.pid, "Refusing to begin session: {}", reason);
            debug_assert!(false, "begin_session contract violated: {reason}");
            return;
        }

        let request = BeginSessionRequest {
            stream_id,
            pid: process.pid,
            session_name: build_session_name(device, process),
            start_timestamp_epoch_ms: chrono::Utc::now().timestamp_millis(),
            process_abi: process.abi_cpu_arch.clone(),
            jvmti_enabled: agent_supported(device, process),
        };
        tracing::info!(stream_id, pid = process.pid, "Beginning session");
        self.source.dispatch(Command::BeginSession(request));
    }

    /// Ends the profiling session, if any.
    ///
    /// The profiling session is cleared locally before the end command is
    /// dispatched.
    pub async fn end_current_session(&self) {
        let mut state = self.state.write().await;
        if state.profiling.is_default() {
            return;
        }
        let session = state.profiling;
        state.set_profiling(Session::default());
        drop(state);

        tracing::info!(session_id = session.session_id, "Ending session");
        self.source.dispatch(Command::EndSession {
            stream_id: session.stream_id,
            pid: session.pid,
            session_id: session.session_id,
        });

        let mut pending = PendingAspects::default();
        pending.mark(SessionAspect::ProfilingSessionChanged);
        self.publish(pending);
    }

    /// Deletes `session` and its events, then reconciles.
    ///
    /// A profiling session is stopped through the process host first. If the
    /// session was selected, the selection resets to the default session.
    pub async fn delete_session(&self, session: &Session) {
        let mut state = self.state.write().await;
        let Some(known) = state.items.get(&session.session_id).map(|item| *item.session()) else {
            drop(state);
            tracing::warn!(session_id = session.session_id, "Refusing to delete unknown session");
            debug_assert!(false, "delete_session called for unknown session {}", session.session_id);
            return;
        };

        let mut pending = PendingAspects::default();
        if state.profiling.session_id == known.session_id {
            self.host.stop_profiling(&known);
            state.set_profiling(Session::default());
            pending.mark(SessionAspect::ProfilingSessionChanged);
        }
        if state.selected.session_id == known.session_id {
            state.select_session(Session::default());
            state.selected_artifact = None;
            pending.mark(SessionAspect::SelectedSessionChanged);
        }

        self.source.dispatch(Command::DeleteEvents {
            stream_id: known.stream_id,
            pid: known.pid,
            group_id: known.session_id,
            kind: EventKind::Session,
            from_timestamp: known.start_timestamp,
            to_timestamp: known.end_timestamp,
        });

        state.items.remove(&known.session_id);
        state.view_ranges.remove(&known.session_id);
        state.deleted.insert(known.session_id);
        drop(state);

        tracing::info!(session_id = known.session_id, "Deleted session");
        self.publish(pending);
        self.reconcile().await;
    }

    /// Synthesizes and registers the private stream of an imported session.
    ///
    /// Returns `false` if the backing stream could not be allocated; nothing
    /// is registered in that case.
    pub async fn create_imported_session(&self, import: ImportedSession) -> bool {
        let name = import.name.clone();
        let stream = import.into_stream();
        let stream_id = stream.stream_id;
        match self.source.register_stream(stream).await {
            Ok(()) => {
                // Stream and session ids are equal for imports
                self.state.write().await.deleted.remove(&stream_id);
                tracing::info!(stream_id, name = %name, "Registered imported session");
                true
            }
            Err(e) => {
                tracing::warn!(name = %name, "Failed to allocate imported stream: {}", e);
                false
            }
        }
    }

    /// Registers the handler for files with `extension` (case-insensitive).
    pub async fn register_import_handler(&self, extension: &str, handler: Arc<dyn ImportHandler>) {
        let key = normalize_extension(extension);
        self.import_handlers.write().await.insert(key, handler);
    }

    /// Imports `path` through the handler registered for its extension.
    ///
    /// Returns `false` when no handler matches or the import fails.
    pub async fn import_session_from_file(&self, path: &Path) -> bool {
        let Some(extension) = path.extension().and_then(|e| e.to_str()) else {
            tracing::warn!(path = %path.display(), "Cannot import a file without extension");
            return false;
        };
        let handler = self
            .import_handlers
            .read()
            .await
            .get(&normalize_extension(extension))
            .cloned();
        let Some(handler) = handler else {
            tracing::warn!(path = %path.display(), "No import handler for .{}", extension);
            return false;
        };

        match handler.load(path).await {
            Ok(import) => self.create_imported_session(import).await,
            Err(e) => {
                tracing::warn!(path = %path.display(), "Import failed: {}", e);
                false
            }
        }
    }

    // ============================================================================
    // Selection
    // ============================================================================

    /// Selects `session`, or clears the selection with the default session.
    ///
    /// Selecting a session the catalog does not know is a contract violation.
    pub async fn set_session(&self, session: Session) {
        let mut state = self.state.write().await;
        let target = if session.is_default() {
            Session::default()
        } else {
            match state.items.get(&session.session_id) {
                Some(item) => *item.session(),
                None => {
                    drop(state);
                    tracing::warn!(session_id = session.session_id, "Refusing to select unknown session");
                    debug_assert!(false, "set_session called for unknown session {}", session.session_id);
                    return;
                }
            }
        };

        let mut pending = PendingAspects::default();
        if state.select_session(target) {
            pending.mark(SessionAspect::SelectedSessionChanged);
        }
        state.selected_artifact = header_identity(&state.ordered, target.session_id);
        drop(state);
        self.publish(pending);
    }

    /// Selects the session with `session_id`. Returns `false` if it is unknown.
    pub async fn set_session_by_id(&self, session_id: i64) -> bool {
        let session = self
            .state
            .read()
            .await
            .items
            .get(&session_id)
            .map(|item| *item.session());
        match session {
            Some(session) => {
                self.set_session(session).await;
                true
            }
            None => false,
        }
    }

    /// Selects the row with `identity`.
    ///
    /// Returns whether the selection actually changed; re-selecting the
    /// current row or an unknown identity returns `false`.
    pub async fn select_artifact(&self, identity: &EntryIdentity) -> bool {
        let mut state = self.state.write().await;
        if state.selected_artifact.as_ref() == Some(identity) {
            return false;
        }
        let Some(owner) = state.find_entry(identity).map(|entry| *entry.session()) else {
            tracing::debug!(?identity, "Ignoring selection of a row not in the catalog");
            return false;
        };

        let mut pending = PendingAspects::default();
        if state.select_session(owner) {
            pending.mark(SessionAspect::SelectedSessionChanged);
        }
        state.selected_artifact = Some(*identity);
        drop(state);
        self.publish(pending);
        true
    }

    // ============================================================================
    // Queries
    // ============================================================================

    pub async fn selected_session(&self) -> Session {
        self.state.read().await.selected
    }

    pub async fn selected_session_metadata(&self) -> Option<SessionMetadata> {
        let state = self.state.read().await;
        state
            .items
            .get(&state.selected.session_id)
            .map(|item| item.metadata().clone())
    }

    pub async fn selected_artifact(&self) -> Option<EntryIdentity> {
        self.state.read().await.selected_artifact
    }

    pub async fn profiling_session(&self) -> Session {
        self.state.read().await.profiling
    }

    /// Whether the selected session is still recording.
    pub async fn is_session_alive(&self) -> bool {
        self.state.read().await.selected.is_alive()
    }

    /// The display-ordered rows published by the last changing reconciliation.
    pub async fn ordered_artifacts(&self) -> Vec<CatalogEntry> {
        self.state.read().await.ordered.clone()
    }

    pub async fn session_item(&self, session_id: i64) -> Option<SessionItem> {
        self.state.read().await.items.get(&session_id).cloned()
    }

    /// All items, ordered by session id.
    pub async fn session_items(&self) -> Vec<SessionItem> {
        self.state.read().await.items.values().cloned().collect()
    }

    // ============================================================================
    // View range cache
    // ============================================================================

    /// Remembers the range last shown for a known session.
    pub async fn remember_view_range(&self, session_id: i64, range: ViewRange) {
        let mut state = self.state.write().await;
        if state.items.contains_key(&session_id) {
            state.view_ranges.insert(session_id, range);
        }
    }

    pub async fn view_range(&self, session_id: i64) -> Option<ViewRange> {
        self.state.read().await.view_ranges.get(&session_id).copied()
    }

    fn publish(&self, pending: PendingAspects) {
        if !pending.is_empty() {
            self.aspects.publish(pending);
        }
    }
}

/// Orders groups so complete (two-event) groups come before open ones, each
/// by ascending start epoch; the newest live session is processed last.
fn sort_for_processing(groups: &mut [EventGroup]) {
    groups.sort_by_key(|group| {
        let epoch = group
            .session_started()
            .map(|started| started.start_timestamp_epoch_ms)
            .unwrap_or_default();
        (Reverse(group.len().min(2)), epoch)
    });
}

fn apply_group(
    state: &mut CatalogState,
    group: &EventGroup,
    auto_selected: &mut bool,
    pending: &mut PendingAspects,
) {
    let (Some(started), Some(begin)) = (group.session_started(), group.first()) else {
        tracing::debug!(group_id = group.group_id, "Ignoring session group without a begin event");
        return;
    };
    let session_id = group.group_id;
    if session_id == 0 || state.deleted.contains(&session_id) {
        return;
    }
    if started.session_type.is_imported() && group.len() < 2 {
        return;
    }
    let end_timestamp = group.events.get(1).map(|event| event.timestamp);

    if let Some(item) = state.items.get_mut(&session_id) {
        let Some(end_timestamp) = end_timestamp else {
            return;
        };
        if !item.close(end_timestamp) {
            return;
        }
        let closed = *item.session();
        let was_live = !item.is_imported();
        tracing::info!(session_id, end_timestamp, "Session ended");

        if was_live {
            pending.mark(SessionAspect::OngoingSessionNewlyEnded);
        }
        if state.profiling.session_id == session_id && state.set_profiling(Session::default()) {
            pending.mark(SessionAspect::ProfilingSessionChanged);
        }
        if state.selected.session_id == session_id && state.select_session(closed) {
            pending.mark(SessionAspect::SelectedSessionChanged);
        }
        return;
    }

    let mut session = Session {
        session_id,
        stream_id: started.stream_id,
        pid: started.pid,
        start_timestamp: begin.timestamp,
        end_timestamp: ONGOING_END_TIMESTAMP,
    };
    if let Some(end_timestamp) = end_timestamp {
        session = session.closed_at(end_timestamp);
    }
    let metadata = SessionMetadata {
        session_id,
        session_type: started.session_type,
        start_timestamp_epoch_ms: started.start_timestamp_epoch_ms,
        process_abi: started.process_abi.clone(),
        session_name: started.session_name.clone(),
        jvmti_enabled: started.jvmti_enabled,
    };
    tracing::info!(
        session_id,
        alive = session.is_alive(),
        session_type = ?metadata.session_type,
        "Session discovered"
    );
    state.items.insert(session_id, SessionItem::new(session, metadata));

    let should_select = if session.is_alive() {
        if state.set_profiling(session) {
            pending.mark(SessionAspect::ProfilingSessionChanged);
        }
        true
    } else {
        !started.session_type.is_imported() && (state.selected.is_default() || *auto_selected)
    };
    if should_select {
        *auto_selected = true;
        if state.select_session(session) {
            pending.mark(SessionAspect::SelectedSessionChanged);
        }
    }
}

async fn refresh_children(state: &mut CatalogState, fetchers: &[Arc<dyn ArtifactFetcher>]) {
    for item in state.items.values_mut() {
        let session = *item.session();
        let metadata = item.metadata().clone();
        let mut children = Vec::new();
        let mut complete = true;
        for fetcher in fetchers {
            match fetcher.fetch(&session, &metadata).await {
                Ok(mut artifacts) => children.append(&mut artifacts),
                Err(e) => {
                    tracing::warn!(
                        session_id = session.session_id,
                        fetcher = fetcher.name(),
                        "Artifact fetch failed, keeping previous children: {}",
                        e
                    );
                    complete = false;
                    break;
                }
            }
        }
        if complete {
            item.set_child_artifacts(children);
        }
    }
}

fn apply_inferred(state: &mut CatalogState, inferred: InferredSelection, pending: &mut PendingAspects) {
    match inferred {
        InferredSelection::Session(session) => {
            tracing::debug!(session_id = session.session_id, "Auto-selecting session");
            if state.select_session(session) {
                pending.mark(SessionAspect::SelectedSessionChanged);
            }
            state.selected_artifact = header_identity(&state.ordered, session.session_id);
        }
        InferredSelection::Artifact { owner, identity } => {
            tracing::debug!(session_id = owner.session_id, group_id = identity.group_id, "Auto-selecting artifact");
            if state.select_session(owner) {
                pending.mark(SessionAspect::SelectedSessionChanged);
            }
            state.selected_artifact = Some(EntryIdentity::Artifact(identity));
        }
    }
}

/// Keeps a selected session header pointing at the row currently published
/// for the selected session, e.g. after the session closed.
fn retarget_selected_header(state: &mut CatalogState) {
    if state.selected.is_default() {
        return;
    }
    let stale = match &state.selected_artifact {
        None => true,
        Some(identity @ EntryIdentity::Session { .. }) => state.find_entry(identity).is_none(),
        Some(EntryIdentity::Artifact(_)) => false,
    };
    if stale {
        state.selected_artifact = header_identity(&state.ordered, state.selected.session_id);
    }
}

fn header_identity(ordered: &[CatalogEntry], session_id: i64) -> Option<EntryIdentity> {
    ordered
        .iter()
        .find(|entry| entry.is_session() && entry.session().session_id == session_id)
        .map(CatalogEntry::identity)
}

fn normalize_extension(extension: &str) -> String {
    extension.trim_start_matches('.').to_ascii_lowercase()
}
