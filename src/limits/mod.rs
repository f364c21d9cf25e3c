//! Daily usage limits for restricted apps.
//!
//! Foreground changes flow from an observer into the [`MonitorService`], which runs
//! the [`Enforcer`] and raises the shared [`BlockSignal`] when a restricted app is
//! over its budget. The presentation side ([`AppManager`], [`Console`]) edits
//! preferences and clears the signal again, directly or through a
//! [`ControlChannel`] when it runs in another process.

pub mod actions;
pub mod catalog;
pub mod clock;
pub mod console;
pub mod control;
pub mod crypto;
pub mod error;
pub mod monitor;
pub mod observer;
pub mod package;
pub mod passcode;
pub mod screen;
pub mod service;
pub mod signal;
pub mod snapshot;
pub mod store;
pub mod usage;

#[cfg(test)]
pub(crate) mod testing;

pub use actions::{parse_limit, AppManager};
pub use catalog::{AppCatalog, AppEntry};
pub use clock::{Clock, ManualClock, SystemClock};
pub use console::{Console, ConsoleCommand};
pub use control::ControlChannel;
pub use error::ActionError;
pub use monitor::{Directive, Enforcer, MonitorSettings, MonitoringState};
pub use package::{PackageId, UNSET_LIMIT};
pub use passcode::PasscodeGate;
pub use screen::Screen;
pub use service::{MonitorHandle, MonitorService};
pub use signal::BlockSignal;
pub use store::{LocalStore, PreferenceStore};
pub use usage::{UsageLedger, UsageQuery};
