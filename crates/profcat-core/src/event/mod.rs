//! Event log domain module.
//!
//! # Module Structure
//!
//! - `model`: Events, groups and group queries
//! - `source`: The `EventSource` trait and the commands dispatched through it

mod model;
mod source;

pub use model::{
    CaptureInfo, Event, EventData, EventGroup, EventKind, GroupQuery, SessionStarted, StreamId,
};
pub use source::{BeginSessionRequest, Command, EventSource, ImportedStream};
