use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::limits::monitor::MonitoringState;
use crate::limits::package::PackageId;
use crate::platform::common::atomic_write;

/// Current snapshot file version
const SNAPSHOT_VERSION: &str = "1.0";

/// Last known monitor state, written by the running service for `nazr status`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MonitorSnapshot {
    pub version: String,
    pub blocked: Option<PackageId>,
    pub watched: Option<PackageId>,
    pub updated_at: DateTime<Utc>,
}

impl MonitorSnapshot {
    pub fn new(
        state: &MonitoringState,
        blocked: Option<PackageId>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            version: SNAPSHOT_VERSION.to_string(),
            blocked,
            watched: state.watched.clone(),
            updated_at,
        }
    }
}

/// Load the snapshot, if the service has written one
pub fn load_snapshot(path: &Path) -> Result<Option<MonitorSnapshot>> {
    if !path.exists() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read monitor snapshot: {}", path.display()))?;

    let snapshot: MonitorSnapshot = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse monitor snapshot: {}", path.display()))?;

    if snapshot.version != SNAPSHOT_VERSION {
        anyhow::bail!(
            "Monitor snapshot version mismatch (expected {}, got {})",
            SNAPSHOT_VERSION,
            snapshot.version
        );
    }

    Ok(Some(snapshot))
}

pub fn save_snapshot(path: &Path, snapshot: &MonitorSnapshot) -> Result<()> {
    let content =
        serde_json::to_string_pretty(snapshot).context("Failed to serialize monitor snapshot")?;

    atomic_write(path, content.as_bytes())
        .with_context(|| format!("Failed to write monitor snapshot: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_snapshot() {
        let temp_dir = tempdir().unwrap();
        assert_eq!(load_snapshot(&temp_dir.path().join("monitor.json")).unwrap(), None);
    }

    #[test]
    fn test_save_and_load_snapshot() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("monitor.json");

        let state = MonitoringState {
            watched: None,
            blocking_active: true,
        };
        let snapshot =
            MonitorSnapshot::new(&state, Some(PackageId::from("com.example.a")), Utc::now());
        save_snapshot(&path, &snapshot).unwrap();

        let loaded = load_snapshot(&path).unwrap().unwrap();
        assert_eq!(loaded, snapshot);
    }
}
