pub mod apps;
pub mod run;
pub mod setup;
pub mod status;
pub mod utils;

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;

use nazr::config::{self, AppConfig};
use nazr::limits::crypto::Sealer;
use nazr::limits::snapshot::load_snapshot;
use nazr::limits::{AppManager, BlockSignal, Clock, ControlChannel, LocalStore, PackageId};

/// The `--config` path, or the platform default
pub fn resolve_config_path(path: Option<PathBuf>) -> Result<PathBuf> {
    match path {
        Some(path) => Ok(path),
        None => config::get_config_path(),
    }
}

/// Configuration plus the paths derived from it, shared by every command
pub struct AppContext {
    pub config: AppConfig,
    pub config_path: PathBuf,
}

impl AppContext {
    /// Load the config at `path`, or the default location when none is given
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = resolve_config_path(path)?;
        let config = config::load_or_default(&config_path)?;

        Ok(Self {
            config,
            config_path,
        })
    }

    pub fn open_store(&self, clock: Arc<dyn Clock>) -> Result<Arc<LocalStore>> {
        let sealer = if self.config.store.encrypt {
            Some(Sealer::load_or_create(&self.config.key_path()?)?)
        } else {
            None
        };

        let path = self.config.preferences_path()?;
        let store = LocalStore::open(&path, sealer, clock)
            .with_context(|| format!("Failed to open preferences at {}", path.display()))?;

        Ok(Arc::new(store))
    }

    /// App manager for one-shot commands
    ///
    /// Starts from the block the running monitor last reported and forwards
    /// cleared blocks to it through the control file.
    pub fn manager(&self, clock: Arc<dyn Clock>) -> Result<AppManager> {
        let signal = BlockSignal::with_blocked(self.reported_block()?);
        let control = ControlChannel::new(self.config.control_path()?);

        Ok(AppManager::new(self.open_store(clock)?, signal).with_control(control))
    }

    /// Package the monitor snapshot says is blocked
    fn reported_block(&self) -> Result<Option<PackageId>> {
        let path = self.config.snapshot_path()?;
        match load_snapshot(&path) {
            Ok(snapshot) => Ok(snapshot.and_then(|s| s.blocked)),
            Err(e) => {
                warn!("Ignoring unreadable monitor snapshot: {:#}", e);
                Ok(None)
            }
        }
    }
}
