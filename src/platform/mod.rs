//! Platform-specific foreground detection and blocking notices

pub mod common;

#[cfg(target_os = "windows")]
pub mod windows;

#[cfg(target_os = "macos")]
pub mod macos;

#[cfg(target_os = "linux")]
pub mod linux;

use anyhow::Result;

/// Identify the application currently in the foreground
///
/// Returns `None` when nothing is focused (desktop, lock screen).
pub fn foreground_app() -> Result<Option<String>> {
    #[cfg(target_os = "windows")]
    {
        windows::foreground_app()
    }

    #[cfg(target_os = "macos")]
    {
        macos::foreground_app()
    }

    #[cfg(target_os = "linux")]
    {
        linux::foreground_app()
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
    {
        anyhow::bail!("Unsupported operating system for foreground detection")
    }
}

/// Show the blocking interstitial for an app whose budget is spent
pub fn show_blocking_notice(app_name: &str) -> Result<()> {
    #[cfg(target_os = "windows")]
    {
        windows::show_blocking_notice(app_name)
    }

    #[cfg(target_os = "macos")]
    {
        macos::show_blocking_notice(app_name)
    }

    #[cfg(target_os = "linux")]
    {
        linux::show_blocking_notice(app_name)
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
    {
        tracing::warn!("Time limit reached for {}", app_name);
        Ok(())
    }
}

/// Body text shared by every platform's notice
pub(crate) fn blocking_message(app_name: &str) -> String {
    format!(
        "Time limit reached for {}! Enter your passcode in nazr to unlock it.",
        app_name
    )
}
