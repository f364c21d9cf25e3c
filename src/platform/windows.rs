use anyhow::{Context, Result};
use std::process::Command;
use tracing::warn;

/// Asks user32 for the foreground window's process and prints its name
const FOREGROUND_SCRIPT: &str = r#"
Add-Type -Name Win -Namespace Nazr -MemberDefinition '
[DllImport("user32.dll")] public static extern IntPtr GetForegroundWindow();
[DllImport("user32.dll")] public static extern uint GetWindowThreadProcessId(IntPtr hWnd, out uint pid);'
$procId = 0
[void][Nazr.Win]::GetWindowThreadProcessId([Nazr.Win]::GetForegroundWindow(), [ref]$procId)
if ($procId -ne 0) { (Get-Process -Id $procId).ProcessName }
"#;

/// Process name of the foreground window
pub fn foreground_app() -> Result<Option<String>> {
    let output = Command::new("powershell")
        .args(["-NoProfile", "-NonInteractive", "-Command", FOREGROUND_SCRIPT])
        .output()
        .context("Failed to run powershell")?;

    if !output.status.success() {
        return Ok(None);
    }

    let name = String::from_utf8_lossy(&output.stdout).trim().to_string();
    Ok((!name.is_empty()).then_some(name))
}

/// Show the notice as a message box on the user's session, logging if that fails
pub fn show_blocking_notice(app_name: &str) -> Result<()> {
    let message = super::blocking_message(app_name);

    let shown = Command::new("msg")
        .args(["*", "/TIME:30", &message])
        .status()
        .map(|status| status.success())
        .unwrap_or(false);

    if !shown {
        warn!("Notification: {}", message);
    }
    Ok(())
}
