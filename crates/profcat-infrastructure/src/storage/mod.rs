//! File-backed storage.
//!
//! - `atomic_toml`: Crash-safe typed TOML documents with file locking
//! - `config_storage`: `config.toml`
//! - `spool`: Imported streams persisted between runs

pub mod atomic_toml;
pub mod config_storage;
pub mod spool;

pub use atomic_toml::{AtomicTomlFile, write_atomic};
pub use config_storage::ConfigStorage;
pub use spool::StreamSpool;
