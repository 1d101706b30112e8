use anyhow::Result;
use profcat_core::SessionsManager;
use profcat_core::config::CatalogConfig;
use profcat_infrastructure::{ConfigStorage, MemoryTransport, register_default_handlers};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Settings shared by every command.
pub struct CliContext {
    pub storage: ConfigStorage,
    pub config: CatalogConfig,
    pub spool_dir: PathBuf,
}

impl CliContext {
    pub fn load(config_path: Option<PathBuf>, spool_override: Option<PathBuf>) -> Result<Self> {
        let storage = match config_path {
            Some(path) => ConfigStorage::new(path),
            None => ConfigStorage::default_location()?,
        };
        let config = storage.load()?;
        let spool_dir = match spool_override {
            Some(dir) => dir,
            None => ConfigStorage::spool_dir(&config)?,
        };
        Ok(Self {
            storage,
            config,
            spool_dir,
        })
    }

    /// Opens the spooled transport and a catalog over it, reconciled once.
    pub async fn open_catalog(&self) -> Result<(Arc<MemoryTransport>, SessionsManager)> {
        let transport = Arc::new(MemoryTransport::open(self.spool_dir.clone()).await?);
        let manager = SessionsManager::new(transport.clone());
        register_default_handlers(&manager, &self.config).await;
        manager.reconcile().await;
        Ok((transport, manager))
    }
}

/// Logs go to stderr; `RUST_LOG` wins over the configured filter.
pub fn init_logging(default_filter: &str, json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}
