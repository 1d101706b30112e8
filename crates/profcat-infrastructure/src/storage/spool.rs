//! On-disk spool of imported streams.
//!
//! Each stream lives in its own directory, `<root>/<stream_id>/`, holding a
//! TOML manifest, the events as JSON lines and one file per payload. A stream
//! is staged in a hidden directory and renamed into place, so a stream is
//! either fully spooled or absent.

use profcat_core::error::{CatalogError, Result};
use profcat_core::event::{Event, ImportedStream, StreamId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;

const MANIFEST_FILE: &str = "manifest.toml";
const EVENTS_FILE: &str = "events.jsonl";
const PAYLOAD_DIR: &str = "payloads";

#[derive(Debug, Serialize, Deserialize)]
struct StreamManifest {
    stream_id: StreamId,
    name: String,
    event_count: usize,
    /// Capture start timestamps that have a payload file.
    payloads: Vec<i64>,
}

/// Directory-backed store of [`ImportedStream`]s.
#[derive(Debug, Clone)]
pub struct StreamSpool {
    root: PathBuf,
}

impl StreamSpool {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn stream_dir(&self, stream_id: StreamId) -> PathBuf {
        self.root.join(stream_id.to_string())
    }

    pub async fn contains(&self, stream_id: StreamId) -> bool {
        fs::try_exists(self.stream_dir(stream_id).join(MANIFEST_FILE))
            .await
            .unwrap_or(false)
    }

    /// Writes `stream`. On error nothing is left behind under its final name.
    pub async fn write(&self, stream: &ImportedStream) -> Result<()> {
        fs::create_dir_all(&self.root).await?;

        let staging = self.root.join(format!(".{}.partial", stream.stream_id));
        if fs::try_exists(&staging).await.unwrap_or(false) {
            fs::remove_dir_all(&staging).await?;
        }

        if let Err(e) = self.stage(&staging, stream).await {
            let _ = fs::remove_dir_all(&staging).await;
            return Err(e);
        }

        let target = self.stream_dir(stream.stream_id);
        if fs::try_exists(&target).await.unwrap_or(false) {
            fs::remove_dir_all(&target).await?;
        }
        fs::rename(&staging, &target).await?;
        tracing::debug!(stream_id = stream.stream_id, path = %target.display(), "Spooled stream");
        Ok(())
    }

    async fn stage(&self, dir: &Path, stream: &ImportedStream) -> Result<()> {
        let payload_dir = dir.join(PAYLOAD_DIR);
        fs::create_dir_all(&payload_dir).await?;

        let mut lines = String::new();
        for event in &stream.events {
            lines.push_str(&serde_json::to_string(event)?);
            lines.push('\n');
        }
        fs::write(dir.join(EVENTS_FILE), lines).await?;

        let mut payload_keys: Vec<i64> = stream.payloads.keys().copied().collect();
        payload_keys.sort_unstable();
        for key in &payload_keys {
            fs::write(payload_dir.join(format!("{key}.bin")), &stream.payloads[key]).await?;
        }

        let manifest = StreamManifest {
            stream_id: stream.stream_id,
            name: stream.name.clone(),
            event_count: stream.events.len(),
            payloads: payload_keys,
        };
        fs::write(dir.join(MANIFEST_FILE), toml::to_string_pretty(&manifest)?).await?;
        Ok(())
    }

    /// Reads one stream back.
    pub async fn read(&self, stream_id: StreamId) -> Result<ImportedStream> {
        let dir = self.stream_dir(stream_id);
        let manifest_text = fs::read_to_string(dir.join(MANIFEST_FILE))
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => CatalogError::not_found("stream", stream_id.to_string()),
                _ => e.into(),
            })?;
        let manifest: StreamManifest = toml::from_str(&manifest_text)?;

        let lines = fs::read_to_string(dir.join(EVENTS_FILE)).await?;
        let events = lines
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(serde_json::from_str::<Event>)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        if events.len() != manifest.event_count {
            return Err(CatalogError::io(format!(
                "stream {} has {} events, manifest says {}",
                stream_id,
                events.len(),
                manifest.event_count
            )));
        }

        let mut payloads = HashMap::new();
        for key in manifest.payloads {
            let bytes = fs::read(dir.join(PAYLOAD_DIR).join(format!("{key}.bin"))).await?;
            payloads.insert(key, bytes);
        }

        Ok(ImportedStream {
            stream_id: manifest.stream_id,
            name: manifest.name,
            events,
            payloads,
        })
    }

    /// Reads every complete stream. Unreadable ones are logged and skipped.
    pub async fn read_all(&self) -> Result<Vec<ImportedStream>> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut streams = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name();
            let Some(stream_id) = file_name.to_str().and_then(|name| name.parse::<StreamId>().ok())
            else {
                continue;
            };
            match self.read(stream_id).await {
                Ok(stream) => streams.push(stream),
                Err(e) => tracing::warn!(stream_id, "Skipping unreadable spooled stream: {}", e),
            }
        }
        streams.sort_by_key(|stream| stream.stream_id);
        Ok(streams)
    }

    pub async fn remove(&self, stream_id: StreamId) -> Result<()> {
        let dir = self.stream_dir(stream_id);
        match fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use profcat_core::catalog::ImportedSession;
    use profcat_core::event::{CaptureInfo, EventData, EventKind};
    use profcat_core::session::SessionType;
    use tempfile::TempDir;

    fn stream(name: &str) -> ImportedStream {
        ImportedSession {
            name: name.to_string(),
            session_type: SessionType::MemoryCapture,
            start_timestamp_ns: 1_000,
            end_timestamp_ns: 1_001,
            start_timestamp_epoch_ms: 1_700_000_000_000,
            payloads: HashMap::from([(1_000, b"JAVA PROFILE 1.0.2".to_vec())]),
            events: vec![Event {
                stream_id: 0,
                pid: 0,
                group_id: 1_000,
                kind: EventKind::HeapDump,
                timestamp: 1_000,
                is_ended: true,
                data: EventData::HeapDump(CaptureInfo::new(1_000, Some(1_001))),
            }],
        }
        .into_stream()
    }

    #[tokio::test]
    async fn test_write_then_read_all() {
        let temp_dir = TempDir::new().unwrap();
        let spool = StreamSpool::new(temp_dir.path().join("streams"));
        let original = stream("dump.hprof");

        spool.write(&original).await.unwrap();
        assert!(spool.contains(original.stream_id).await);

        let streams = spool.read_all().await.unwrap();
        assert_eq!(streams, vec![original.clone()]);
        assert!(!temp_dir
            .path()
            .join("streams")
            .join(format!(".{}.partial", original.stream_id))
            .exists());
    }

    #[tokio::test]
    async fn test_missing_root_reads_empty() {
        let temp_dir = TempDir::new().unwrap();
        let spool = StreamSpool::new(temp_dir.path().join("absent"));
        assert!(spool.read_all().await.unwrap().is_empty());
        assert!(spool.read(7).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_truncated_stream_is_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let spool = StreamSpool::new(temp_dir.path().to_path_buf());
        let good = stream("good.hprof");
        let bad = stream("bad.hprof");
        spool.write(&good).await.unwrap();
        spool.write(&bad).await.unwrap();

        let events = temp_dir
            .path()
            .join(bad.stream_id.to_string())
            .join(EVENTS_FILE);
        std::fs::write(&events, "").unwrap();

        let streams = spool.read_all().await.unwrap();
        assert_eq!(streams.len(), 1);
        assert_eq!(streams[0].stream_id, good.stream_id);
    }

    #[tokio::test]
    async fn test_write_fails_when_root_is_a_file() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("streams");
        std::fs::write(&root, "not a directory").unwrap();

        let spool = StreamSpool::new(root);
        assert!(spool.write(&stream("dump.hprof")).await.is_err());
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let spool = StreamSpool::new(temp_dir.path().to_path_buf());
        let original = stream("dump.hprof");
        spool.write(&original).await.unwrap();

        spool.remove(original.stream_id).await.unwrap();
        spool.remove(original.stream_id).await.unwrap();
        assert!(!spool.contains(original.stream_id).await);
    }
}
