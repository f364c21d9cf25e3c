//! Fakes shared by the unit tests of this module.

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::limits::package::PackageId;
use crate::limits::usage::UsageQuery;

/// Reports the same usage for every package
pub struct FixedUsage {
    minutes: Mutex<Option<u64>>,
    failing: AtomicBool,
}

impl FixedUsage {
    pub fn new(minutes: Option<u64>) -> Self {
        Self {
            minutes: Mutex::new(minutes),
            failing: AtomicBool::new(false),
        }
    }

    pub fn set(&self, minutes: Option<u64>) {
        *self.minutes.lock().unwrap() = minutes;
    }

    pub fn fail(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl UsageQuery for FixedUsage {
    fn aggregate_foreground_minutes(
        &self,
        _package: &PackageId,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> Result<Option<u64>> {
        if self.failing.load(Ordering::SeqCst) {
            anyhow::bail!("usage service unavailable");
        }
        Ok(*self.minutes.lock().unwrap())
    }
}
