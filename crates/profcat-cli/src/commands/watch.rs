use super::catalog::print_rows;
use super::context::CliContext;
use anyhow::Result;
use profcat_core::SessionAspect;
use profcat_core::SessionsManager;
use profcat_core::device::{Device, DeviceState, ExposureLevel, Process, ProcessState};
use profcat_core::event::{CaptureInfo, Event, EventData, EventKind};
use profcat_infrastructure::MemoryTransport;
use std::time::{Duration, Instant};
use tokio::sync::broadcast::error::RecvError;

const MIN_INTERVAL_MS: u64 = 10;
const DEMO_STREAM_ID: i64 = 1;
/// Ticks between synthetic heap dumps in demo mode.
const DEMO_DUMP_EVERY: u64 = 20;

fn demo_device() -> Device {
    Device {
        device_id: DEMO_STREAM_ID,
        model: "Emulator".to_string(),
        state: DeviceState::Online,
        feature_level: 34,
    }
}

fn demo_process() -> Process {
    Process {
        pid: std::process::id() as i32,
        device_id: DEMO_STREAM_ID,
        name: "profcat-demo".to_string(),
        state: ProcessState::Alive,
        abi_cpu_arch: std::env::consts::ARCH.to_string(),
        exposure_level: ExposureLevel::Profileable,
    }
}

pub async fn run(ctx: &CliContext, interval_ms: Option<u64>, demo: bool) -> Result<()> {
    let (transport, manager) = ctx.open_catalog().await?;
    let mut aspects = manager.subscribe();

    if demo {
        manager
            .begin_session(DEMO_STREAM_ID, &demo_device(), &demo_process())
            .await;
    }

    let period = Duration::from_millis(
        interval_ms
            .unwrap_or(ctx.config.poll_interval_ms)
            .max(MIN_INTERVAL_MS),
    );
    tracing::info!(interval_ms = period.as_millis() as u64, demo, "Watching catalog");
    println!("👀 Watching (Ctrl-C to stop)");

    let mut ticker = tokio::time::interval(period);
    let mut last_tick = Instant::now();
    let mut ticks: u64 = 0;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                ticks += 1;
                if demo && ticks % DEMO_DUMP_EVERY == 0 {
                    record_demo_dump(&transport, &manager).await;
                }
                manager.reconcile().await;
                let now = Instant::now();
                let elapsed = now.duration_since(last_tick).as_nanos();
                manager.tick(i64::try_from(elapsed).unwrap_or(i64::MAX)).await;
                last_tick = now;
            }
            aspect = aspects.recv() => match aspect {
                Ok(aspect) => report(&manager, aspect).await,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Dropped catalog notifications");
                }
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    if demo {
        manager.end_current_session().await;
        transport.flush().await;
        manager.reconcile().await;
        println!("⏹  Demo session ended");
    }
    Ok(())
}

/// Appends a finished heap dump to the demo session.
async fn record_demo_dump(transport: &MemoryTransport, manager: &SessionsManager) {
    let session = manager.profiling_session().await;
    if session.is_default() {
        return;
    }
    let start = transport.device_time_ns();
    transport
        .record(Event {
            stream_id: session.stream_id,
            pid: session.pid,
            group_id: start,
            kind: EventKind::HeapDump,
            timestamp: start,
            is_ended: true,
            data: EventData::HeapDump(CaptureInfo::new(start, Some(start + 1))),
        })
        .await;
}

async fn report(manager: &SessionsManager, aspect: SessionAspect) {
    match aspect {
        SessionAspect::SessionsChanged => {
            println!("── catalog ──");
            print_rows(manager, &manager.ordered_artifacts().await).await;
        }
        SessionAspect::SelectedSessionChanged => {
            let selected = manager.selected_session().await;
            println!("→ selected session {}", selected.session_id);
        }
        SessionAspect::ProfilingSessionChanged => {
            let profiling = manager.profiling_session().await;
            if profiling.is_default() {
                println!("→ profiling stopped");
            } else {
                println!("→ profiling session {}", profiling.session_id);
            }
        }
        SessionAspect::OngoingSessionNewlyEnded => println!("→ a live session ended"),
        SessionAspect::ItemsUpdated => tracing::trace!("Items updated"),
    }
}
