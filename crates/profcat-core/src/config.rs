use serde::{Deserialize, Serialize};
use std::path::PathBuf;

fn default_poll_interval_ms() -> u64 {
    250
}

fn default_log_filter() -> String {
    "info".to_string()
}

fn default_import_extensions() -> Vec<String> {
    vec!["hprof".to_string(), "trace".to_string()]
}

/// Runtime configuration of a catalog host.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct CatalogConfig {
    /// Interval between reconciliation passes when polling.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Directory holding file-backed streams. Platform data dir when unset.
    #[serde(default)]
    pub spool_dir: Option<PathBuf>,
    /// `tracing` filter directive used when `RUST_LOG` is not set.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
    /// File extensions whose import handlers get registered.
    #[serde(default = "default_import_extensions")]
    pub import_extensions: Vec<String>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            spool_dir: None,
            log_filter: default_log_filter(),
            import_extensions: default_import_extensions(),
        }
    }
}

impl CatalogConfig {
    pub fn import_enabled(&self, extension: &str) -> bool {
        self.import_extensions
            .iter()
            .any(|e| e.eq_ignore_ascii_case(extension))
    }
}
