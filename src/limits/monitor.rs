//! Foreground-app enforcement.
//!
//! [`Enforcer`] is the synchronous decision core: it is fed foreground changes and
//! poll ticks one at a time and answers with a [`Directive`] telling the driver what
//! to do with its poll task. Timing lives in [`crate::limits::service`].

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::limits::clock::{self, Clock};
use crate::limits::package::{PackageId, UNSET_LIMIT};
use crate::limits::signal::BlockSignal;
use crate::limits::store::PreferenceStore;
use crate::limits::usage::UsageQuery;

/// Default interval between usage re-checks of a watched package
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Package prefix of the Android system shell
pub const DEFAULT_SHELL_PREFIX: &str = "com.android.systemui";

#[derive(Debug, Clone)]
pub struct MonitorSettings {
    /// Package of this application; its interstitial must not count as leaving the block
    pub own_package: PackageId,
    /// Packages starting with any of these never get restricted
    pub shell_prefixes: Vec<String>,
    pub poll_interval: Duration,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            own_package: PackageId::from("nazr"),
            shell_prefixes: vec![DEFAULT_SHELL_PREFIX.to_string()],
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// What the enforcer currently tracks
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MonitoringState {
    pub watched: Option<PackageId>,
    pub blocking_active: bool,
}

/// Instruction for the driver after each decision
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// Leave the current poll task as it is
    Keep,
    /// Cancel any poll task
    StopPolling,
    /// Replace any poll task with one for this package
    StartPolling(PackageId),
    /// A block was raised for this package; no poll task should run
    Blocked(PackageId),
}

pub struct Enforcer {
    store: Arc<dyn PreferenceStore>,
    usage: Arc<dyn UsageQuery>,
    clock: Arc<dyn Clock>,
    signal: BlockSignal,
    settings: MonitorSettings,
    watched: Option<PackageId>,
}

impl Enforcer {
    pub fn new(
        store: Arc<dyn PreferenceStore>,
        usage: Arc<dyn UsageQuery>,
        clock: Arc<dyn Clock>,
        signal: BlockSignal,
        settings: MonitorSettings,
    ) -> Self {
        Self {
            store,
            usage,
            clock,
            signal,
            settings,
            watched: None,
        }
    }

    pub fn state(&self) -> MonitoringState {
        MonitoringState {
            watched: self.watched.clone(),
            blocking_active: self.signal.is_active(),
        }
    }

    pub fn settings(&self) -> &MonitorSettings {
        &self.settings
    }

    pub fn signal(&self) -> &BlockSignal {
        &self.signal
    }

    /// Handle a change of the foreground application
    pub fn on_foreground_changed(&mut self, package: Option<&PackageId>) -> Directive {
        if package != Some(&self.settings.own_package) {
            if let Some(previous) = self.signal.clear() {
                info!("Left the blocking screen for {}", previous);
            }
        }

        match package {
            Some(package) if !self.is_exempt(package) => self.evaluate(package),
            _ => {
                debug!("Foreground is not a user app: {:?}", package.map(PackageId::as_str));
                self.stop_watching()
            }
        }
    }

    /// Handle a poll tick for `package`
    pub fn on_poll_tick(&mut self, package: &PackageId) -> Directive {
        if self.watched.as_ref() != Some(package) {
            debug!("Ignoring stale poll tick for {}", package);
            return Directive::Keep;
        }

        if self.signal.is_active() {
            return self.stop_watching();
        }

        debug!("Re-checking usage of {}", package);
        self.evaluate(package)
    }

    fn is_exempt(&self, package: &PackageId) -> bool {
        package == &self.settings.own_package
            || self
                .settings
                .shell_prefixes
                .iter()
                .any(|prefix| package.as_str().starts_with(prefix.as_str()))
    }

    fn evaluate(&mut self, package: &PackageId) -> Directive {
        let restricted = match self.store.load_restricted_apps() {
            Ok(apps) => apps.contains(package),
            Err(e) => {
                warn!("Failed to load restricted apps: {:#}", e);
                return self.stop_watching();
            }
        };

        if !restricted {
            return self.stop_watching();
        }

        match self.store.is_temporarily_unblocked(package) {
            Ok(false) => {}
            Ok(true) => {
                debug!("{} is temporarily unblocked", package);
                return self.stop_watching();
            }
            Err(e) => {
                warn!("Failed to read temporary unblock for {}: {:#}", package, e);
                return self.stop_watching();
            }
        }

        if self.limit_exceeded(package) {
            self.watched = None;
            return if self.signal.try_raise(package) {
                Directive::Blocked(package.clone())
            } else {
                Directive::StopPolling
            };
        }

        if self.watched.as_ref() == Some(package) {
            return Directive::Keep;
        }

        debug!("Watching {}", package);
        self.watched = Some(package.clone());
        Directive::StartPolling(package.clone())
    }

    /// Usage since the start of the local day against the stored limit
    ///
    /// Missing or failing usage data counts as within the limit.
    fn limit_exceeded(&self, package: &PackageId) -> bool {
        let limit = match self.store.load_limit(package) {
            Ok(limit) => limit,
            Err(e) => {
                warn!("Failed to load limit for {}: {:#}", package, e);
                return false;
            }
        };

        if limit <= UNSET_LIMIT {
            return false;
        }

        let now = self.clock.now();
        let start = clock::start_of_local_day(now);

        match self.usage.aggregate_foreground_minutes(package, start, now) {
            Ok(Some(minutes)) => {
                debug!("{} used {} of {} minutes today", package, minutes, limit);
                i64::try_from(minutes).unwrap_or(i64::MAX) > limit
            }
            Ok(None) => false,
            Err(e) => {
                warn!("Usage query failed for {}: {:#}", package, e);
                false
            }
        }
    }

    fn stop_watching(&mut self) -> Directive {
        if let Some(previous) = self.watched.take() {
            debug!("Stopped watching {}", previous);
        }
        Directive::StopPolling
    }
}
