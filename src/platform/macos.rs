use anyhow::{Context, Result};
use std::process::Command;

/// Bundle identifier of the frontmost application
pub fn foreground_app() -> Result<Option<String>> {
    let output = Command::new("osascript")
        .arg("-e")
        .arg("tell application \"System Events\" to get bundle identifier of first application process whose frontmost is true")
        .output()
        .context("Failed to run osascript")?;

    if !output.status.success() {
        return Ok(None);
    }

    let bundle_id = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if bundle_id.is_empty() || bundle_id == "missing value" {
        return Ok(None);
    }

    Ok(Some(bundle_id))
}

/// Show the blocking notice through Notification Center
pub fn show_blocking_notice(app_name: &str) -> Result<()> {
    let script = format!(
        "display notification {} with title \"Time Limit Reached\" sound name \"Glass\"",
        applescript_string(&super::blocking_message(app_name))
    );

    let output = Command::new("osascript")
        .arg("-e")
        .arg(&script)
        .output()
        .context("Failed to run osascript")?;

    if !output.status.success() {
        anyhow::bail!(
            "osascript failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(())
}

/// Quote `text` as an AppleScript string literal
fn applescript_string(text: &str) -> String {
    format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
}
