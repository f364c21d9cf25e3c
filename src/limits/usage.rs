use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info};

use crate::limits::clock::{self, Clock};
use crate::limits::package::PackageId;
use crate::platform::common::atomic_write;

/// Current usage file version
const USAGE_VERSION: &str = "1.0";

/// Aggregated foreground time per package
pub trait UsageQuery: Send + Sync {
    /// Whole minutes `package` spent in the foreground within `[start, end)`
    ///
    /// `Ok(None)` means there is no data for the package.
    fn aggregate_foreground_minutes(
        &self,
        package: &PackageId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Option<u64>>;
}

/// A finished foreground session
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Session {
    pub package: PackageId,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// The session for whatever is in the foreground right now
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct OpenSession {
    pub package: PackageId,
    pub start: DateTime<Utc>,
}

/// Foreground sessions for one local day
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DayUsage {
    pub version: String,
    pub date: NaiveDate,
    pub sessions: Vec<Session>,
    pub open: Option<OpenSession>,
}

impl DayUsage {
    fn new(date: NaiveDate) -> Self {
        Self {
            version: USAGE_VERSION.to_string(),
            date,
            sessions: Vec::new(),
            open: None,
        }
    }

    /// Start a new day, carrying the open session over from local midnight
    fn roll_over(&mut self, now: DateTime<Utc>) {
        let today = clock::local_date(now);
        if self.date == today {
            return;
        }

        info!("Starting usage tracking for {}", today);
        let midnight = clock::start_of_local_day(now);
        let carried = self.open.take().map(|open| OpenSession {
            package: open.package,
            start: open.start.max(midnight),
        });

        *self = DayUsage::new(today);
        self.open = carried;
    }

    /// Seconds `package` was in the foreground within `[start, end)`, or
    /// `None` if it never was today
    fn foreground_seconds(
        &self,
        package: &PackageId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Option<i64> {
        let open = self
            .open
            .as_ref()
            .filter(|open| &open.package == package)
            .map(|open| (open.start, end));

        let mut spans = self
            .sessions
            .iter()
            .filter(|session| &session.package == package)
            .map(|session| (session.start, session.end))
            .chain(open)
            .peekable();

        spans.peek()?;

        Some(
            spans
                .map(|(from, to)| (to.min(end) - from.max(start)).num_seconds().max(0))
                .sum(),
        )
    }
}

/// Usage data built from the foreground changes the monitor observes
pub struct UsageLedger {
    day: Mutex<DayUsage>,
    path: Option<PathBuf>,
    clock: Arc<dyn Clock>,
}

impl UsageLedger {
    pub fn in_memory(clock: Arc<dyn Clock>) -> Self {
        let today = clock::local_date(clock.now());
        Self {
            day: Mutex::new(DayUsage::new(today)),
            path: None,
            clock,
        }
    }

    /// Load today's usage from `path`, starting fresh on a new day
    pub fn open(path: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Result<Self> {
        let path = path.into();
        let now = clock.now();

        let mut day = load_usage(&path)?.unwrap_or_else(|| DayUsage::new(clock::local_date(now)));

        // Whatever was open when the last run stopped ended at an unknown time
        if let Some(open) = day.open.take() {
            debug!("Discarding unfinished session for {}", open.package);
        }
        day.roll_over(now);

        Ok(Self {
            day: Mutex::new(day),
            path: Some(path),
            clock,
        })
    }

    /// Close the running session and open one for the new foreground package
    pub fn record_foreground(&self, package: Option<&PackageId>) -> Result<()> {
        let now = self.clock.now();
        let mut day = self.day.lock().unwrap_or_else(PoisonError::into_inner);
        day.roll_over(now);

        if day.open.as_ref().map(|open| &open.package) == package {
            return Ok(());
        }

        if let Some(open) = day.open.take() {
            if now > open.start {
                day.sessions.push(Session {
                    package: open.package,
                    start: open.start,
                    end: now,
                });
            }
        }

        day.open = package.map(|package| OpenSession {
            package: package.clone(),
            start: now,
        });

        match &self.path {
            Some(path) => save_usage(path, &day),
            None => Ok(()),
        }
    }

    /// Seconds in the foreground today, per package
    pub fn today_totals(&self) -> BTreeMap<PackageId, i64> {
        let now = self.clock.now();
        let mut day = self.day.lock().unwrap_or_else(PoisonError::into_inner);
        day.roll_over(now);

        let start = clock::start_of_local_day(now);
        let mut packages: Vec<&PackageId> = day.sessions.iter().map(|s| &s.package).collect();
        packages.extend(day.open.as_ref().map(|open| &open.package));

        packages
            .into_iter()
            .filter_map(|package| {
                day.foreground_seconds(package, start, now)
                    .map(|seconds| (package.clone(), seconds))
            })
            .collect()
    }
}

impl UsageQuery for UsageLedger {
    fn aggregate_foreground_minutes(
        &self,
        package: &PackageId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Option<u64>> {
        let mut day = self.day.lock().unwrap_or_else(PoisonError::into_inner);
        day.roll_over(self.clock.now());

        Ok(day
            .foreground_seconds(package, start, end)
            .map(|seconds| (seconds / 60) as u64))
    }
}

/// Load usage from file
pub fn load_usage(path: &Path) -> Result<Option<DayUsage>> {
    if !path.exists() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read usage file: {}", path.display()))?;

    let day: DayUsage = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse usage file: {}", path.display()))?;

    if day.version != USAGE_VERSION {
        tracing::warn!(
            "Usage file version mismatch (expected {}, got {}). Starting fresh.",
            USAGE_VERSION,
            day.version
        );
        return Ok(None);
    }

    Ok(Some(day))
}

/// Save usage to file
fn save_usage(path: &Path, day: &DayUsage) -> Result<()> {
    let content = serde_json::to_string_pretty(day)
        .context("Failed to serialize usage")?;

    atomic_write(path, content.as_bytes())
        .with_context(|| format!("Failed to write usage file: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limits::clock::ManualClock;
    use chrono::{Duration, TimeZone};
    use tempfile::tempdir;

    fn make_clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 11, 16, 12, 0, 0).unwrap(),
        ))
    }

    fn pkg(id: &str) -> PackageId {
        PackageId::from(id)
    }

    #[test]
    fn test_unknown_package_has_no_data() {
        let clock = make_clock();
        let ledger = UsageLedger::in_memory(clock.clone());
        let now = clock.now();

        let minutes = ledger
            .aggregate_foreground_minutes(&pkg("com.example.a"), now - Duration::hours(1), now)
            .unwrap();
        assert_eq!(minutes, None);
    }

    #[test]
    fn test_open_session_counts_up_to_window_end() {
        let clock = make_clock();
        let ledger = UsageLedger::in_memory(clock.clone());
        let start = clock.now();

        ledger.record_foreground(Some(&pkg("com.example.a"))).unwrap();
        clock.advance(Duration::minutes(10));

        let minutes = ledger
            .aggregate_foreground_minutes(&pkg("com.example.a"), start, clock.now())
            .unwrap();
        assert_eq!(minutes, Some(10));
    }

    #[test]
    fn test_switching_apps_closes_session() {
        let clock = make_clock();
        let ledger = UsageLedger::in_memory(clock.clone());
        let start = clock.now();

        ledger.record_foreground(Some(&pkg("com.example.a"))).unwrap();
        clock.advance(Duration::minutes(10));
        ledger.record_foreground(Some(&pkg("com.example.b"))).unwrap();
        clock.advance(Duration::minutes(5));
        ledger.record_foreground(None).unwrap();
        clock.advance(Duration::minutes(30));

        let now = clock.now();
        assert_eq!(
            ledger.aggregate_foreground_minutes(&pkg("com.example.a"), start, now).unwrap(),
            Some(10)
        );
        assert_eq!(
            ledger.aggregate_foreground_minutes(&pkg("com.example.b"), start, now).unwrap(),
            Some(5)
        );
    }

    #[test]
    fn test_repeated_event_for_same_app_keeps_session() {
        let clock = make_clock();
        let ledger = UsageLedger::in_memory(clock.clone());
        let start = clock.now();

        ledger.record_foreground(Some(&pkg("com.example.a"))).unwrap();
        clock.advance(Duration::minutes(3));
        ledger.record_foreground(Some(&pkg("com.example.a"))).unwrap();
        clock.advance(Duration::minutes(3));

        assert_eq!(
            ledger
                .aggregate_foreground_minutes(&pkg("com.example.a"), start, clock.now())
                .unwrap(),
            Some(6)
        );
    }

    #[test]
    fn test_window_clips_sessions() {
        let clock = make_clock();
        let ledger = UsageLedger::in_memory(clock.clone());
        let start = clock.now();

        ledger.record_foreground(Some(&pkg("com.example.a"))).unwrap();
        clock.advance(Duration::minutes(20));
        ledger.record_foreground(None).unwrap();

        let minutes = ledger
            .aggregate_foreground_minutes(
                &pkg("com.example.a"),
                start + Duration::minutes(5),
                start + Duration::minutes(12),
            )
            .unwrap();
        assert_eq!(minutes, Some(7));
    }

    #[test]
    fn test_new_day_resets_totals() {
        let clock = make_clock();
        let ledger = UsageLedger::in_memory(clock.clone());

        ledger.record_foreground(Some(&pkg("com.example.a"))).unwrap();
        clock.advance(Duration::minutes(10));
        ledger.record_foreground(None).unwrap();
        assert_eq!(ledger.today_totals().get(&pkg("com.example.a")), Some(&600));

        clock.advance(Duration::days(2));
        assert!(ledger.today_totals().is_empty());
    }

    #[test]
    fn test_ledger_persists_finished_sessions() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("usage.json");
        let clock = make_clock();
        let start = clock.now();

        let ledger = UsageLedger::open(&path, clock.clone()).unwrap();
        ledger.record_foreground(Some(&pkg("com.example.a"))).unwrap();
        clock.advance(Duration::minutes(8));
        ledger.record_foreground(Some(&pkg("com.example.b"))).unwrap();
        drop(ledger);

        let reopened = UsageLedger::open(&path, clock.clone()).unwrap();
        clock.advance(Duration::minutes(2));
        let now = clock.now();

        assert_eq!(
            reopened.aggregate_foreground_minutes(&pkg("com.example.a"), start, now).unwrap(),
            Some(8)
        );
        // The unfinished session from the previous run is dropped
        assert_eq!(
            reopened.aggregate_foreground_minutes(&pkg("com.example.b"), start, now).unwrap(),
            None
        );
    }
}
