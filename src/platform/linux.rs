use anyhow::{Context, Result};
use std::process::Command;

/// Name of the process owning the focused X11 window
pub fn foreground_app() -> Result<Option<String>> {
    let output = Command::new("xdotool")
        .args(["getactivewindow", "getwindowpid"])
        .output()
        .context("Failed to run xdotool (is it installed?)")?;

    // xdotool exits non-zero when no window has focus
    if !output.status.success() {
        return Ok(None);
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let Ok(pid) = stdout.trim().parse::<u32>() else {
        return Ok(None);
    };

    process_name(pid)
}

/// Read a process's short name from procfs
fn process_name(pid: u32) -> Result<Option<String>> {
    let comm_path = format!("/proc/{}/comm", pid);
    let comm = match std::fs::read_to_string(&comm_path) {
        Ok(comm) => comm,
        // The process exited between the two lookups
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).with_context(|| format!("Failed to read {}", comm_path)),
    };

    let name = comm.trim();
    Ok((!name.is_empty()).then(|| name.to_string()))
}

/// Show the blocking notice as a critical desktop notification
pub fn show_blocking_notice(app_name: &str) -> Result<()> {
    let message = super::blocking_message(app_name);
    try_command(
        "notify-send",
        &[
            "--urgency=critical",
            "--icon=dialog-warning",
            "Time Limit Reached",
            &message,
        ],
    )
}

/// Try to execute a command, returning Ok if successful
fn try_command(cmd: &str, args: &[&str]) -> Result<()> {
    let output = Command::new(cmd)
        .args(args)
        .output()?;

    if output.status.success() {
        Ok(())
    } else {
        anyhow::bail!("Command failed: {} {:?}", cmd, args)
    }
}
