//! Platform paths for profcat configuration and spooled streams.
//!
//! # Directory Structure
//!
//! ```text
//! ~/.config/profcat/           # Config directory
//! └── config.toml              # CatalogConfig
//!
//! ~/.local/share/profcat/      # Data directory
//! └── streams/                 # Spooled imported streams
//!     └── <stream_id>/
//!         ├── manifest.toml
//!         ├── events.jsonl
//!         └── payloads/
//! ```

use anyhow::{Context, Result};
use std::path::PathBuf;

const APP_DIR: &str = "profcat";

pub struct ProfcatPaths;

impl ProfcatPaths {
    pub fn config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR))
            .context("Cannot determine the platform config directory")
    }

    pub fn data_dir() -> Result<PathBuf> {
        dirs::data_dir()
            .map(|dir| dir.join(APP_DIR))
            .context("Cannot determine the platform data directory")
    }

    /// Path of `config.toml`.
    pub fn config_file() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Default spool directory for imported streams.
    pub fn spool_dir() -> Result<PathBuf> {
        Ok(Self::data_dir()?.join("streams"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_are_namespaced() {
        // Headless CI may not expose a home directory; only check when it does.
        if let Ok(config) = ProfcatPaths::config_file() {
            assert!(config.ends_with("profcat/config.toml"));
        }
        if let Ok(spool) = ProfcatPaths::spool_dir() {
            assert!(spool.ends_with("profcat/streams"));
        }
    }
}
