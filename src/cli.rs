use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// nazr - daily time limits for distracting apps
///
/// Restrict apps, give each a daily budget in minutes, and get interrupted
/// once the budget is spent. A passcode protects the restrictions.
#[derive(Parser, Debug)]
#[command(name = "nazr")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file (defaults to the platform config directory)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write an example configuration file
    Init {
        /// Overwrite an existing configuration
        #[arg(long)]
        force: bool,
    },
    /// List known apps with their restriction and limit
    Apps {
        /// Only show apps whose name contains this text
        #[arg(short, long)]
        search: Option<String>,
    },
    /// Restrict an app
    Activate {
        package: String,
    },
    /// Lift the restriction on an app
    Deactivate {
        package: String,

        #[arg(short, long)]
        passcode: Option<String>,
    },
    /// Set the daily limit of an app in minutes (empty to clear)
    Limit {
        package: String,

        #[arg(allow_hyphen_values = true)]
        minutes: String,

        #[arg(short, long)]
        passcode: Option<String>,
    },
    /// Set or change the passcode
    Passcode {
        /// New passcode
        #[arg(long = "new")]
        new_passcode: String,

        /// New passcode again
        #[arg(long)]
        confirm: String,

        /// Current passcode, if one is set
        #[arg(long)]
        current: Option<String>,
    },
    /// Dismiss the blocking screen of the running monitor
    Unlock {
        #[arg(short, long)]
        passcode: Option<String>,
    },
    /// Exempt an app from its limit for a while
    Unblock {
        package: String,

        minutes: u32,

        #[arg(short, long)]
        passcode: Option<String>,
    },
    /// Show today's foreground time per app
    Usage {
        package: Option<String>,
    },
    /// Show the state of the running monitor
    Status,
    /// Run the monitor in the foreground
    Run {
        /// Where foreground changes come from
        #[arg(long, value_enum, default_value_t = ObserverKind::Stdin)]
        observer: ObserverKind,

        /// Don't raise desktop notifications when an app is blocked
        #[arg(long)]
        no_notify: bool,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObserverKind {
    /// Read `fg <package>` and control lines from stdin
    Stdin,
    /// Sample the desktop's active window
    Desktop,
}
