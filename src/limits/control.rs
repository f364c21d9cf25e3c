//! Unlock requests from one-shot commands to a running monitor.
//!
//! `nazr unlock` and `nazr unblock` run in their own process, so they cannot
//! touch the monitor's [`BlockSignal`](crate::limits::signal::BlockSignal)
//! directly. They append a request to `control.json` in the data directory; the
//! monitor takes pending requests every [`CONTROL_CHECK_INTERVAL`] and clears
//! the block when a request names the blocked package.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

use crate::limits::package::PackageId;
use crate::platform::common::atomic_write;

/// Current control file version
const CONTROL_VERSION: &str = "1.0";

/// How often the monitor looks for new requests
pub const CONTROL_CHECK_INTERVAL: Duration = Duration::from_secs(1);

/// Ask the monitor to dismiss the blocking screen for `package`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct UnlockRequest {
    pub package: PackageId,
    pub requested_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Serialize)]
struct ControlFile {
    version: String,
    requests: Vec<UnlockRequest>,
}

impl Default for ControlFile {
    fn default() -> Self {
        Self {
            version: CONTROL_VERSION.to_string(),
            requests: Vec::new(),
        }
    }
}

/// File-backed queue of [`UnlockRequest`]s
#[derive(Debug, Clone)]
pub struct ControlChannel {
    path: PathBuf,
}

impl ControlChannel {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Queue a request for the monitor
    pub fn request_unlock(&self, package: &PackageId, now: DateTime<Utc>) -> Result<()> {
        let mut file = load_control(&self.path)?;
        file.requests.push(UnlockRequest {
            package: package.clone(),
            requested_at: now,
        });
        save_control(&self.path, &file)
    }

    /// Remove and return every pending request
    pub fn take_requests(&self) -> Result<Vec<UnlockRequest>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        // Move the file aside first so a request written meanwhile lands in a new file
        let taken = self.path.with_extension("taken");
        std::fs::rename(&self.path, &taken)
            .with_context(|| format!("Failed to claim control file: {}", self.path.display()))?;

        let file = load_control(&taken);
        std::fs::remove_file(&taken)
            .with_context(|| format!("Failed to remove control file: {}", taken.display()))?;

        Ok(file?.requests)
    }

    /// Drop requests left over from before the monitor started
    pub fn discard_pending(&self) -> Result<usize> {
        Ok(self.take_requests()?.len())
    }
}

fn load_control(path: &Path) -> Result<ControlFile> {
    if !path.exists() {
        return Ok(ControlFile::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read control file: {}", path.display()))?;

    let file: ControlFile = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse control file: {}", path.display()))?;

    if file.version != CONTROL_VERSION {
        warn!(
            "Control file version mismatch (expected {}, got {}); dropping its requests",
            CONTROL_VERSION, file.version
        );
        return Ok(ControlFile::default());
    }

    Ok(file)
}

fn save_control(path: &Path, file: &ControlFile) -> Result<()> {
    let content = serde_json::to_string_pretty(file).context("Failed to serialize control file")?;

    atomic_write(path, content.as_bytes())
        .with_context(|| format!("Failed to write control file: {}", path.display()))
}
