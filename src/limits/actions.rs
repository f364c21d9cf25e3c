use anyhow::Result;
use chrono::Utc;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::info;

use crate::limits::control::ControlChannel;
use crate::limits::error::ActionError;
use crate::limits::package::{PackageId, UNSET_LIMIT};
use crate::limits::passcode::PasscodeGate;
use crate::limits::signal::BlockSignal;
use crate::limits::store::PreferenceStore;

/// Parse a usage limit entered by the user
///
/// Blank input clears the limit. Anything other than a non-negative whole number
/// of minutes is rejected.
pub fn parse_limit(input: &str) -> Result<i64, ActionError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(UNSET_LIMIT);
    }

    match trimmed.parse::<i64>() {
        Ok(minutes) if minutes >= 0 => Ok(minutes),
        _ => Err(ActionError::InvalidLimit(trimmed.to_string())),
    }
}

/// User actions on restricted apps, limits, the passcode and the blocking screen
pub struct AppManager {
    store: Arc<dyn PreferenceStore>,
    gate: PasscodeGate,
    signal: BlockSignal,
    control: Option<ControlChannel>,
}

impl AppManager {
    pub fn new(store: Arc<dyn PreferenceStore>, signal: BlockSignal) -> Self {
        Self {
            gate: PasscodeGate::new(store.clone()),
            store,
            signal,
            control: None,
        }
    }

    /// Also forward every cleared block to a monitor running in another process
    pub fn with_control(mut self, control: ControlChannel) -> Self {
        self.control = Some(control);
        self
    }

    pub fn gate(&self) -> &PasscodeGate {
        &self.gate
    }

    pub fn restricted_apps(&self) -> Result<BTreeSet<PackageId>> {
        self.store.load_restricted_apps()
    }

    /// Restrict `package`; returns false if it already was
    pub fn activate(&self, package: &PackageId) -> Result<bool, ActionError> {
        let mut apps = self.store.load_restricted_apps()?;
        if !apps.insert(package.clone()) {
            return Ok(false);
        }

        self.store.save_restricted_apps(&apps)?;
        info!("Restricted {}", package);
        Ok(true)
    }

    /// Lift the restriction on `package`; returns false if it was not restricted
    pub fn deactivate(
        &self,
        package: &PackageId,
        passcode: Option<&str>,
    ) -> Result<bool, ActionError> {
        let mut apps = self.store.load_restricted_apps()?;
        if !apps.contains(package) {
            return Ok(false);
        }

        self.gate.authorize(passcode)?;

        apps.remove(package);
        self.store.save_restricted_apps(&apps)?;
        info!("Removed restriction on {}", package);
        Ok(true)
    }

    /// Store the daily limit typed by the user, returning the stored value
    pub fn set_limit(
        &self,
        package: &PackageId,
        input: &str,
        passcode: Option<&str>,
    ) -> Result<i64, ActionError> {
        let minutes = parse_limit(input)?;
        self.gate.authorize(passcode)?;

        self.store.save_limit(package, minutes)?;
        if minutes == UNSET_LIMIT {
            info!("Cleared usage limit for {}", package);
        } else {
            info!("Usage limit for {} set to {} minutes", package, minutes);
        }
        Ok(minutes)
    }

    pub fn change_passcode(
        &self,
        current: Option<&str>,
        new: &str,
        confirm: &str,
    ) -> Result<(), ActionError> {
        self.gate.change(current, new, confirm)
    }

    /// Dismiss the blocking screen for the rest of this episode
    pub fn unlock(&self, passcode: Option<&str>) -> Result<PackageId, ActionError> {
        let package = self.signal.blocked_package().ok_or(ActionError::NotBlocked)?;

        self.gate.authorize(passcode)?;
        self.release(&package)?;
        Ok(package)
    }

    /// Dismiss the blocking screen and exempt the blocked app for `minutes`
    pub fn temporary_unlock(
        &self,
        passcode: Option<&str>,
        minutes: u32,
    ) -> Result<PackageId, ActionError> {
        let package = self.signal.blocked_package().ok_or(ActionError::NotBlocked)?;

        self.gate.authorize(passcode)?;
        self.store.set_temporary_unblock(&package, minutes)?;
        info!("Temporarily unblocked {} for {} minutes", package, minutes);

        self.release(&package)?;
        Ok(package)
    }

    /// Exempt any restricted app for `minutes`, whether or not it is blocked now
    pub fn grant_temporary_unblock(
        &self,
        package: &PackageId,
        minutes: u32,
        passcode: Option<&str>,
    ) -> Result<(), ActionError> {
        self.gate.authorize(passcode)?;
        self.store.set_temporary_unblock(package, minutes)?;
        info!("Temporarily unblocked {} for {} minutes", package, minutes);

        if self.signal.blocked_package().as_ref() == Some(package) {
            self.release(package)?;
        }
        Ok(())
    }

    fn release(&self, package: &PackageId) -> Result<()> {
        self.signal.clear();
        if let Some(control) = &self.control {
            control.request_unlock(package, Utc::now())?;
        }
        Ok(())
    }
}
