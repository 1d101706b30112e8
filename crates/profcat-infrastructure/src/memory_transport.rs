//! In-process event source.
//!
//! `MemoryTransport` keeps the event log in memory and applies dispatched
//! commands on a background worker, standing in for a device transport.
//! Imported streams are optionally spooled to disk and reloaded on open.

use crate::storage::StreamSpool;
use async_trait::async_trait;
use profcat_core::error::{CatalogError, Result};
use profcat_core::event::{
    BeginSessionRequest, Command, Event, EventData, EventGroup, EventKind, EventSource, GroupQuery,
    ImportedStream, SessionStarted, StreamId,
};
use profcat_core::session::SessionType;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{RwLock, mpsc, oneshot};

enum WorkerMessage {
    Apply(Command),
    Flush(oneshot::Sender<()>),
}

#[derive(Debug, Default)]
struct EventLog {
    events: Vec<Event>,
    payloads: HashMap<(StreamId, i64), Vec<u8>>,
    imported_streams: HashSet<StreamId>,
    next_session_id: i64,
}

impl EventLog {
    fn append_stream(&mut self, stream: ImportedStream) {
        for (timestamp, bytes) in stream.payloads {
            self.payloads.insert((stream.stream_id, timestamp), bytes);
        }
        self.imported_streams.insert(stream.stream_id);
        self.events.extend(stream.events);
    }

    fn groups(&self, query: &GroupQuery) -> Vec<EventGroup> {
        let mut index: HashMap<(StreamId, i64), usize> = HashMap::new();
        let mut groups: Vec<EventGroup> = Vec::new();
        for event in self.events.iter().filter(|e| e.kind == query.kind) {
            let key = (event.stream_id, event.group_id);
            match index.get(&key) {
                Some(&position) => groups[position].events.push(event.clone()),
                None => {
                    index.insert(key, groups.len());
                    groups.push(EventGroup::new(event.group_id, vec![event.clone()]));
                }
            }
        }
        groups.retain(|group| query.matches(group));
        groups
    }

    fn session_is_open(&self, stream_id: StreamId, session_id: i64) -> bool {
        let mut events = self.events.iter().filter(|e| {
            e.kind == EventKind::Session && e.stream_id == stream_id && e.group_id == session_id
        });
        matches!(events.next(), Some(first) if !first.is_ended) && events.next().is_none()
    }

    fn begin(&mut self, request: BeginSessionRequest, timestamp: i64) -> i64 {
        self.next_session_id += 1;
        let session_id = self.next_session_id;
        self.events.push(Event::session_started(
            timestamp,
            SessionStarted {
                session_id,
                stream_id: request.stream_id,
                pid: request.pid,
                session_type: SessionType::Full,
                start_timestamp_epoch_ms: request.start_timestamp_epoch_ms,
                session_name: request.session_name,
                process_abi: request.process_abi,
                jvmti_enabled: request.jvmti_enabled,
            },
        ));
        session_id
    }

    /// Removes the matching events. Returns how many were removed.
    fn delete(
        &mut self,
        stream_id: StreamId,
        group_id: i64,
        kind: EventKind,
        from_timestamp: i64,
        to_timestamp: i64,
    ) -> usize {
        let before = self.events.len();
        self.events.retain(|e| {
            !(e.stream_id == stream_id
                && e.group_id == group_id
                && e.kind == kind
                && e.timestamp >= from_timestamp
                && e.timestamp <= to_timestamp)
        });
        before - self.events.len()
    }
}

/// Device time in nanoseconds.
fn now_ns() -> i64 {
    chrono::Utc::now()
        .timestamp_nanos_opt()
        .unwrap_or(i64::MAX - 1)
}

/// An [`EventSource`] over an in-memory log.
///
/// Must be created inside a Tokio runtime: the command worker is spawned on
/// construction and runs until the transport is dropped.
pub struct MemoryTransport {
    log: Arc<RwLock<EventLog>>,
    commands: mpsc::UnboundedSender<WorkerMessage>,
    spool: Option<StreamSpool>,
}

impl MemoryTransport {
    /// A transport with no persistence.
    pub fn new() -> Self {
        Self::with_log(EventLog::default(), None)
    }

    /// A transport whose imported streams are spooled under `dir`.
    ///
    /// Streams spooled by earlier runs are loaded back into the log.
    pub async fn open(dir: PathBuf) -> Result<Self> {
        let spool = StreamSpool::new(dir);
        let mut log = EventLog::default();
        let streams = spool.read_all().await?;
        tracing::info!(
            path = %spool.root().display(),
            streams = streams.len(),
            "Opened stream spool"
        );
        for stream in streams {
            log.append_stream(stream);
        }
        Ok(Self::with_log(log, Some(spool)))
    }

    fn with_log(log: EventLog, spool: Option<StreamSpool>) -> Self {
        let log = Arc::new(RwLock::new(log));
        let (commands, receiver) = mpsc::unbounded_channel();
        tokio::spawn(run_worker(log.clone(), spool.clone(), receiver));
        Self {
            log,
            commands,
            spool,
        }
    }

    /// Appends an event as if the device had reported it.
    pub async fn record(&self, event: Event) {
        self.log.write().await.events.push(event);
    }

    /// Current device time of this transport.
    pub fn device_time_ns(&self) -> i64 {
        now_ns()
    }

    /// Waits until every command dispatched so far has been applied.
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.commands.send(WorkerMessage::Flush(done)).is_err() {
            return;
        }
        let _ = wait.await;
    }

    /// Payload stored for the capture starting at `timestamp` on `stream_id`.
    pub async fn payload(&self, stream_id: StreamId, timestamp: i64) -> Option<Vec<u8>> {
        self.log
            .read()
            .await
            .payloads
            .get(&(stream_id, timestamp))
            .cloned()
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

async fn run_worker(
    log: Arc<RwLock<EventLog>>,
    spool: Option<StreamSpool>,
    mut receiver: mpsc::UnboundedReceiver<WorkerMessage>,
) {
    while let Some(message) = receiver.recv().await {
        match message {
            WorkerMessage::Apply(command) => apply(&log, spool.as_ref(), command).await,
            WorkerMessage::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
    tracing::debug!("Transport worker stopped");
}

async fn apply(log: &RwLock<EventLog>, spool: Option<&StreamSpool>, command: Command) {
    match command {
        Command::BeginSession(request) => {
            let (stream_id, pid) = (request.stream_id, request.pid);
            let session_id = log.write().await.begin(request, now_ns());
            tracing::info!(stream_id, pid, session_id, "Session started");
        }
        Command::EndSession {
            stream_id,
            pid,
            session_id,
        } => {
            let mut log = log.write().await;
            if !log.session_is_open(stream_id, session_id) {
                tracing::warn!(stream_id, session_id, "Ignoring end of a session that is not open");
                return;
            }
            log.events
                .push(Event::session_ended(stream_id, pid, session_id, now_ns()));
            tracing::info!(stream_id, pid, session_id, "Session ended");
        }
        Command::DeleteEvents {
            stream_id,
            group_id,
            kind,
            from_timestamp,
            to_timestamp,
            ..
        } => {
            let (removed, imported) = {
                let mut log = log.write().await;
                let removed = log.delete(stream_id, group_id, kind, from_timestamp, to_timestamp);
                let imported = kind == EventKind::Session && log.imported_streams.remove(&stream_id);
                if imported {
                    log.events.retain(|e| e.stream_id != stream_id);
                    log.payloads.retain(|(stream, _), _| *stream != stream_id);
                }
                (removed, imported)
            };
            tracing::info!(stream_id, group_id, removed, "Deleted events");

            if let (true, Some(spool)) = (imported, spool) {
                if let Err(e) = spool.remove(stream_id).await {
                    tracing::warn!(stream_id, "Failed to remove spooled stream: {}", e);
                }
            }
        }
    }
}

#[async_trait]
impl EventSource for MemoryTransport {
    async fn query_groups(&self, query: GroupQuery) -> Result<Vec<EventGroup>> {
        Ok(self.log.read().await.groups(&query))
    }

    fn dispatch(&self, command: Command) {
        if self.commands.send(WorkerMessage::Apply(command)).is_err() {
            tracing::error!("Transport worker is gone, dropping command");
        }
    }

    async fn register_stream(&self, stream: ImportedStream) -> Result<()> {
        if self.log.read().await.imported_streams.contains(&stream.stream_id) {
            tracing::debug!(stream_id = stream.stream_id, "Stream already registered");
            return Ok(());
        }
        if !stream
            .events
            .first()
            .is_some_and(|e| matches!(e.data, EventData::SessionStarted(_)))
        {
            return Err(CatalogError::transport(format!(
                "stream {} does not start with a session",
                stream.stream_id
            )));
        }

        if let Some(spool) = &self.spool {
            spool.write(&stream).await?;
        }
        self.log.write().await.append_stream(stream);
        Ok(())
    }
}
