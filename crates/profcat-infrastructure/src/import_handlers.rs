//! File import handlers for heap dumps and CPU traces.

use async_trait::async_trait;
use profcat_core::SessionsManager;
use profcat_core::catalog::{ImportHandler, ImportedSession};
use profcat_core::config::CatalogConfig;
use profcat_core::error::{CatalogError, Result};
use profcat_core::event::{CaptureInfo, Event, EventData, EventKind};
use profcat_core::session::SessionType;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::UNIX_EPOCH;

/// Raw file contents plus the timestamps an import is anchored on.
struct LoadedFile {
    name: String,
    bytes: Vec<u8>,
    /// Last modification time, used as the capture time in nanoseconds.
    timestamp_ns: i64,
}

async fn load_file(path: &Path) -> Result<LoadedFile> {
    let bytes = tokio::fs::read(path).await?;
    if bytes.is_empty() {
        return Err(CatalogError::io(format!("{} is empty", path.display())));
    }
    let modified = tokio::fs::metadata(path).await?.modified()?;
    let timestamp_ns = modified
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_nanos()).unwrap_or(i64::MAX - 1))
        .unwrap_or_default();
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    Ok(LoadedFile {
        name,
        bytes,
        timestamp_ns,
    })
}

/// Wraps one finished capture into a single-capture imported session.
fn single_capture_session(
    file: LoadedFile,
    session_type: SessionType,
    kind: EventKind,
    data: EventData,
) -> ImportedSession {
    let start = file.timestamp_ns;
    ImportedSession {
        name: file.name,
        session_type,
        start_timestamp_ns: start,
        end_timestamp_ns: start + 1,
        start_timestamp_epoch_ms: chrono::Utc::now().timestamp_millis(),
        payloads: HashMap::from([(start, file.bytes)]),
        events: vec![Event {
            stream_id: 0,
            pid: 0,
            group_id: start,
            kind,
            timestamp: start,
            is_ended: true,
            data,
        }],
    }
}

/// Imports `.hprof` heap dumps as memory capture sessions.
#[derive(Debug, Default, Clone, Copy)]
pub struct HprofImportHandler;

#[async_trait]
impl ImportHandler for HprofImportHandler {
    async fn load(&self, path: &Path) -> Result<ImportedSession> {
        let file = load_file(path).await?;
        let start = file.timestamp_ns;
        tracing::debug!(path = %path.display(), bytes = file.bytes.len(), "Loaded heap dump");
        Ok(single_capture_session(
            file,
            SessionType::MemoryCapture,
            EventKind::HeapDump,
            EventData::HeapDump(CaptureInfo::new(start, Some(start + 1))),
        ))
    }
}

/// Imports `.trace` files as CPU capture sessions.
#[derive(Debug, Default, Clone, Copy)]
pub struct TraceImportHandler;

#[async_trait]
impl ImportHandler for TraceImportHandler {
    async fn load(&self, path: &Path) -> Result<ImportedSession> {
        let file = load_file(path).await?;
        let start = file.timestamp_ns;
        tracing::debug!(path = %path.display(), bytes = file.bytes.len(), "Loaded CPU trace");
        Ok(single_capture_session(
            file,
            SessionType::CpuCapture,
            EventKind::CpuTrace,
            EventData::CpuTrace {
                info: CaptureInfo::new(start, Some(start + 1)),
                triggered_remotely: false,
            },
        ))
    }
}

/// Registers the built-in handlers for every extension enabled in `config`.
pub async fn register_default_handlers(manager: &SessionsManager, config: &CatalogConfig) {
    let builtin: [(&str, Arc<dyn ImportHandler>); 2] = [
        ("hprof", Arc::new(HprofImportHandler)),
        ("trace", Arc::new(TraceImportHandler)),
    ];
    for (extension, handler) in builtin {
        if config.import_enabled(extension) {
            manager.register_import_handler(extension, handler).await;
        } else {
            tracing::debug!(extension, "Import handler disabled by config");
        }
    }
}
