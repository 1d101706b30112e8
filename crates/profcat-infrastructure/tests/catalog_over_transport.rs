//! The catalog driven by a real `MemoryTransport`: commands are applied
//! asynchronously and only show up after a flush and a reconciliation.

use profcat_core::SessionsManager;
use profcat_core::catalog::{CatalogEntry, SessionAspect};
use profcat_core::config::CatalogConfig;
use profcat_core::device::{Device, DeviceState, ExposureLevel, Process, ProcessState};
use profcat_core::event::{CaptureInfo, Event, EventData, EventKind};
use profcat_core::session::SessionType;
use profcat_infrastructure::{MemoryTransport, register_default_handlers};
use std::sync::Arc;
use tempfile::TempDir;

fn device() -> Device {
    Device {
        device_id: 1,
        model: "Pixel 8".to_string(),
        state: DeviceState::Online,
        feature_level: 34,
    }
}

fn process() -> Process {
    Process {
        pid: 4242,
        device_id: 1,
        name: "com.example.app".to_string(),
        state: ProcessState::Alive,
        abi_cpu_arch: "arm64".to_string(),
        exposure_level: ExposureLevel::Profileable,
    }
}

#[tokio::test]
async fn live_session_lifecycle() {
    let transport = Arc::new(MemoryTransport::new());
    let manager = SessionsManager::new(transport.clone());
    let mut aspects = manager.subscribe();

    manager.begin_session(1, &device(), &process()).await;
    transport.flush().await;
    manager.reconcile().await;

    let live = manager.profiling_session().await;
    assert!(live.is_alive());
    assert_eq!(manager.selected_session().await, live);

    let dump_start = transport.device_time_ns();
    transport
        .record(Event {
            stream_id: 1,
            pid: 4242,
            group_id: 1,
            kind: EventKind::HeapDump,
            timestamp: dump_start,
            is_ended: true,
            data: EventData::HeapDump(CaptureInfo::new(dump_start, Some(dump_start + 10))),
        })
        .await;

    manager.end_current_session().await;
    transport.flush().await;
    manager.reconcile().await;

    let ordered = manager.ordered_artifacts().await;
    assert_eq!(ordered.len(), 2);
    assert!(!ordered[0].session().is_alive());
    match &ordered[1] {
        CatalogEntry::Artifact { artifact, owner, .. } => {
            assert_eq!(owner.session_id, live.session_id);
            assert_eq!(artifact.timestamp_ns, dump_start - live.start_timestamp);
        }
        other => panic!("unexpected row {other:?}"),
    }

    let mut seen = Vec::new();
    while let Ok(aspect) = aspects.try_recv() {
        seen.push(aspect);
    }
    assert!(seen.contains(&SessionAspect::OngoingSessionNewlyEnded));

    manager.delete_session(ordered[0].session()).await;
    transport.flush().await;
    manager.reconcile().await;
    assert!(manager.ordered_artifacts().await.is_empty());
    assert!(manager.selected_session().await.is_default());
}

#[tokio::test]
async fn imports_are_spooled_and_restored() {
    let temp_dir = TempDir::new().unwrap();
    let spool = temp_dir.path().join("streams");
    let dump = temp_dir.path().join("leak.hprof");
    std::fs::write(&dump, b"JAVA PROFILE 1.0.2\0payload").unwrap();

    let imported_id = {
        let transport = Arc::new(MemoryTransport::open(spool.clone()).await.unwrap());
        let manager = SessionsManager::new(transport.clone());
        register_default_handlers(&manager, &CatalogConfig::default()).await;

        assert!(manager.import_session_from_file(&dump).await);
        assert!(!manager.import_session_from_file(&temp_dir.path().join("notes.txt")).await);
        manager.reconcile().await;

        let metadata = manager.selected_session_metadata().await.unwrap();
        assert_eq!(metadata.session_type, SessionType::MemoryCapture);
        assert_eq!(metadata.session_name, "leak.hprof");
        manager.selected_session().await.session_id
    };

    let transport = Arc::new(MemoryTransport::open(spool).await.unwrap());
    let manager = SessionsManager::new(transport.clone());
    manager.reconcile().await;

    let ordered = manager.ordered_artifacts().await;
    assert_eq!(ordered.len(), 1);
    assert_eq!(ordered[0].session().session_id, imported_id);
    match &ordered[0] {
        CatalogEntry::Session { summary, .. } => {
            let summary = summary.as_ref().unwrap();
            let payload = transport
                .payload(imported_id, summary.identity.info.start_timestamp)
                .await
                .unwrap();
            assert!(payload.starts_with(b"JAVA PROFILE"));
        }
        other => panic!("unexpected row {other:?}"),
    }
}

#[tokio::test]
async fn disabled_extension_is_not_imported() {
    let temp_dir = TempDir::new().unwrap();
    let trace = temp_dir.path().join("startup.trace");
    std::fs::write(&trace, b"trace").unwrap();

    let transport = Arc::new(MemoryTransport::new());
    let manager = SessionsManager::new(transport);
    let config = CatalogConfig {
        import_extensions: vec!["hprof".to_string()],
        ..CatalogConfig::default()
    };
    register_default_handlers(&manager, &config).await;

    assert!(!manager.import_session_from_file(&trace).await);
}
