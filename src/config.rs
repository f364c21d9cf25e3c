use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::limits::catalog::{AppCatalog, AppEntry};
use crate::limits::monitor::{MonitorSettings, DEFAULT_SHELL_PREFIX};
use crate::limits::package::PackageId;

/// Example configuration written by `nazr init`
pub const EXAMPLE_CONFIG: &str = include_str!("../example-config.yaml");

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub monitor: MonitorConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Known apps, for display names and search
    #[serde(default)]
    pub apps: Vec<AppEntry>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MonitorConfig {
    /// Seconds between usage re-checks of a watched app
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Package id of this application
    #[serde(default = "default_own_package")]
    pub own_package: String,

    /// Package prefixes of the system shell, never restricted
    #[serde(default = "default_shell_prefixes")]
    pub shell_prefixes: Vec<String>,

    /// Durations offered for a temporary unlock from the blocking screen
    #[serde(default = "default_unlock_choices")]
    pub unlock_choices_minutes: Vec<u32>,
}

fn default_poll_interval() -> u64 {
    5
}

fn default_own_package() -> String {
    "nazr".to_string()
}

fn default_shell_prefixes() -> Vec<String> {
    vec![DEFAULT_SHELL_PREFIX.to_string()]
}

fn default_unlock_choices() -> Vec<u32> {
    vec![5, 15]
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            own_package: default_own_package(),
            shell_prefixes: default_shell_prefixes(),
            unlock_choices_minutes: default_unlock_choices(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    /// Directory for preferences, usage and monitor state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    /// Encrypt the preference file at rest
    #[serde(default = "default_true")]
    pub encrypt: bool,
}

fn default_true() -> bool {
    true
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            encrypt: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl AppConfig {
    pub fn monitor_settings(&self) -> MonitorSettings {
        MonitorSettings {
            own_package: PackageId::new(self.monitor.own_package.clone()),
            shell_prefixes: self.monitor.shell_prefixes.clone(),
            poll_interval: Duration::from_secs(self.monitor.poll_interval_secs),
        }
    }

    pub fn catalog(&self) -> AppCatalog {
        AppCatalog::new(self.apps.clone())
    }

    pub fn data_dir(&self) -> Result<PathBuf> {
        match &self.store.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => default_data_dir(),
        }
    }

    pub fn preferences_path(&self) -> Result<PathBuf> {
        let name = if self.store.encrypt {
            "preferences.bin"
        } else {
            "preferences.json"
        };
        Ok(self.data_dir()?.join(name))
    }

    pub fn key_path(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join("store.key"))
    }

    pub fn usage_path(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join("usage.json"))
    }

    pub fn snapshot_path(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join("monitor.json"))
    }

    /// Unlock requests from one-shot commands to the running monitor
    pub fn control_path(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join("control.json"))
    }
}

fn project_dirs() -> Result<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "", "nazr")
        .context("Could not determine home directory for nazr")
}

/// Get the platform-specific config file path
pub fn get_config_path() -> Result<PathBuf> {
    Ok(project_dirs()?.config_dir().join("nazr.yaml"))
}

/// Get the platform-specific data directory
pub fn default_data_dir() -> Result<PathBuf> {
    Ok(project_dirs()?.data_local_dir().to_path_buf())
}

/// Load configuration from YAML file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: AppConfig = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse YAML config file: {}", path.display()))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load configuration, falling back to defaults when the file does not exist
pub fn load_or_default(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        tracing::debug!("No config at {}, using defaults", path.display());
        return Ok(AppConfig::default());
    }

    load_config(path)
}

/// Validate configuration
pub fn validate_config(config: &AppConfig) -> Result<()> {
    if config.monitor.poll_interval_secs == 0 {
        anyhow::bail!("monitor.poll_interval_secs must be greater than zero");
    }

    if config.monitor.own_package.trim().is_empty() {
        anyhow::bail!("monitor.own_package cannot be empty");
    }

    if config.monitor.unlock_choices_minutes.is_empty() {
        anyhow::bail!("monitor.unlock_choices_minutes must offer at least one duration");
    }

    if config.monitor.unlock_choices_minutes.contains(&0) {
        anyhow::bail!("monitor.unlock_choices_minutes cannot contain 0");
    }

    if config.monitor.shell_prefixes.iter().any(|p| p.is_empty()) {
        anyhow::bail!("monitor.shell_prefixes cannot contain an empty prefix");
    }

    let mut packages = HashSet::new();
    for app in &config.apps {
        if app.package.as_str().is_empty() {
            anyhow::bail!("App '{}' has an empty package id", app.name);
        }
        if !packages.insert(&app.package) {
            anyhow::bail!("Duplicate app package: {}", app.package);
        }
    }

    Ok(())
}
