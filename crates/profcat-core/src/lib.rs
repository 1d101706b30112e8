//! Session catalog and artifact aggregation for a profiler.
//!
//! Turns the session and capture event groups of an [`event::EventSource`]
//! into one display-ordered list of sessions and their artifacts, and tracks
//! which session is selected and which one is profiling.

pub mod artifact;
pub mod catalog;
pub mod config;
pub mod device;
pub mod error;
pub mod event;
pub mod session;

pub use catalog::{SessionAspect, SessionsManager};
pub use error::{CatalogError, Result};
