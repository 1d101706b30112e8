//! Event source trait.
//!
//! Defines the interface between the catalog and the transport that records
//! profiling events, decoupling the catalog from any particular pipeline
//! (a device daemon, an in-memory log, a set of spooled files).

use super::model::{Event, EventGroup, EventKind, GroupQuery, StreamId};
use crate::error::Result;
use crate::session::SessionType;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Parameters of a begin-session request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeginSessionRequest {
    pub stream_id: StreamId,
    pub pid: i32,
    pub session_name: String,
    pub start_timestamp_epoch_ms: i64,
    pub process_abi: String,
    pub jvmti_enabled: bool,
}

/// Commands the catalog hands to the event source.
///
/// The catalog never waits for their effect: it shows up (or not) on a later
/// reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    BeginSession(BeginSessionRequest),
    EndSession {
        stream_id: StreamId,
        pid: i32,
        session_id: i64,
    },
    DeleteEvents {
        stream_id: StreamId,
        pid: i32,
        group_id: i64,
        kind: EventKind,
        from_timestamp: i64,
        to_timestamp: i64,
    },
}

/// A private, self-contained stream synthesized for an imported session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedStream {
    pub stream_id: StreamId,
    pub name: String,
    /// Events in append order, including the synthetic begin/end pair.
    pub events: Vec<Event>,
    /// Opaque payloads referenced by the events, keyed by capture start time.
    pub payloads: HashMap<i64, Vec<u8>>,
}

/// An append-only, queryable log of profiling events.
///
/// # Implementation Notes
///
/// - `query_groups` is the only call the catalog awaits during reconciliation.
/// - `dispatch` must return without waiting for the command to run.
/// - `register_stream` must either make the whole stream visible to later
///   queries or fail without leaving any of it behind.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Returns every group matching `query`, events in append order.
    async fn query_groups(&self, query: GroupQuery) -> Result<Vec<EventGroup>>;

    /// Queues `command` for execution. Failures are the transport's to log.
    fn dispatch(&self, command: Command);

    /// Allocates the backing storage for an imported stream and registers it.
    async fn register_stream(&self, stream: ImportedStream) -> Result<()>;
}
