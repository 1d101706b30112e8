//! Infrastructure for the profiling catalog: an in-process event source,
//! file import handlers and file-backed storage.

pub mod import_handlers;
pub mod memory_transport;
pub mod paths;
pub mod storage;

pub use import_handlers::{HprofImportHandler, TraceImportHandler, register_default_handlers};
pub use memory_transport::MemoryTransport;
pub use paths::ProfcatPaths;
pub use storage::{ConfigStorage, StreamSpool};
