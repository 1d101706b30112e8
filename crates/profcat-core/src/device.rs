//! Device and process handles the catalog needs to begin and stop sessions.

use crate::session::Session;
use serde::{Deserialize, Serialize};

/// API level from which debuggable processes can host the profiling agent.
pub const AGENT_MIN_FEATURE_LEVEL: i32 = 26;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceState {
    #[default]
    Unspecified,
    Online,
    Disconnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessState {
    #[default]
    Unspecified,
    Alive,
    Dead,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExposureLevel {
    #[default]
    Release,
    Profileable,
    Debuggable,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Device {
    pub device_id: i64,
    pub model: String,
    pub state: DeviceState,
    pub feature_level: i32,
}

impl Device {
    pub fn is_online(&self) -> bool {
        self.state == DeviceState::Online
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Process {
    pub pid: i32,
    pub device_id: i64,
    pub name: String,
    pub state: ProcessState,
    pub abi_cpu_arch: String,
    pub exposure_level: ExposureLevel,
}

impl Process {
    pub fn is_alive(&self) -> bool {
        self.state == ProcessState::Alive
    }
}

/// Display name of a live session: `"<process> (<device>)"`.
pub fn build_session_name(device: &Device, process: &Process) -> String {
    format!("{} ({})", process.name, device.model)
}

/// Whether a session on this device/process pair can use the agent.
pub fn agent_supported(device: &Device, process: &Process) -> bool {
    process.exposure_level == ExposureLevel::Debuggable
        && device.feature_level >= AGENT_MIN_FEATURE_LEVEL
}

/// The device/process layer that owns the resources of a live session.
///
/// Deleting the profiling session stops it here rather than through a plain
/// end command so the agent and any device-side recording are torn down.
pub trait ProcessHost: Send + Sync {
    fn stop_profiling(&self, session: &Session);
}

/// A host with nothing to release.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProcessHost;

impl ProcessHost for NoopProcessHost {
    fn stop_profiling(&self, _session: &Session) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_requires_debuggable_on_recent_devices() {
        let device = Device {
            feature_level: 26,
            ..Default::default()
        };
        let mut process = Process {
            exposure_level: ExposureLevel::Debuggable,
            ..Default::default()
        };
        assert!(agent_supported(&device, &process));

        process.exposure_level = ExposureLevel::Profileable;
        assert!(!agent_supported(&device, &process));

        let old_device = Device {
            feature_level: 25,
            ..Default::default()
        };
        process.exposure_level = ExposureLevel::Debuggable;
        assert!(!agent_supported(&old_device, &process));
    }

    #[test]
    fn session_name_combines_process_and_device() {
        let device = Device {
            model: "Pixel".to_string(),
            ..Default::default()
        };
        let process = Process {
            name: "com.example".to_string(),
            ..Default::default()
        };
        assert_eq!(build_session_name(&device, &process), "com.example (Pixel)");
    }
}
