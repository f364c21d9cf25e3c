//! Line-oriented control channel for `nazr run --observer stdin`.
//!
//! ```text
//! fg com.example.reader     # reader came to the foreground
//! fg -                      # nothing in the foreground
//! unlock 1234               # dismiss the blocking screen
//! extend 1234 15            # dismiss and exempt the blocked app for 15 minutes
//! status
//! ```

use anyhow::{Context, Result};
use std::str::FromStr;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use crate::limits::actions::AppManager;
use crate::limits::catalog::AppCatalog;
use crate::limits::package::PackageId;
use crate::limits::screen::Screen;
use crate::limits::service::MonitorHandle;
use crate::limits::signal::BlockSignal;
use crate::platform;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Foreground(Option<PackageId>),
    Unlock { passcode: Option<String> },
    Extend { passcode: Option<String>, minutes: u32 },
    Status,
}

impl FromStr for ConsoleCommand {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> Result<Self> {
        let mut words = line.split_whitespace();
        let verb = words.next().context("Empty command")?;
        let args: Vec<&str> = words.collect();

        let command = match (verb, args.as_slice()) {
            ("fg", ["-"]) => ConsoleCommand::Foreground(None),
            ("fg", [package]) => ConsoleCommand::Foreground(Some(PackageId::from(*package))),
            ("unlock", []) => ConsoleCommand::Unlock { passcode: None },
            ("unlock", [passcode]) => ConsoleCommand::Unlock {
                passcode: Some(passcode.to_string()),
            },
            ("extend", [minutes]) => ConsoleCommand::Extend {
                passcode: None,
                minutes: parse_minutes(minutes)?,
            },
            ("extend", [passcode, minutes]) => ConsoleCommand::Extend {
                passcode: Some(passcode.to_string()),
                minutes: parse_minutes(minutes)?,
            },
            ("status", []) => ConsoleCommand::Status,
            _ => anyhow::bail!("Unrecognized command: {}", line.trim()),
        };

        Ok(command)
    }
}

fn parse_minutes(value: &str) -> Result<u32> {
    value
        .parse()
        .with_context(|| format!("Invalid number of minutes: {}", value))
}

/// Parse one input line; blank lines and `#` comments yield `None`
pub fn parse_line(line: &str) -> Result<Option<ConsoleCommand>> {
    let line = line.split('#').next().unwrap_or_default().trim();
    if line.is_empty() {
        return Ok(None);
    }
    line.parse().map(Some)
}

/// Executes console commands against the monitor and the user actions
pub struct Console {
    handle: MonitorHandle,
    manager: Arc<AppManager>,
    catalog: Arc<AppCatalog>,
    unlock_choices: Vec<u32>,
}

impl Console {
    pub fn new(
        handle: MonitorHandle,
        manager: Arc<AppManager>,
        catalog: Arc<AppCatalog>,
        unlock_choices: Vec<u32>,
    ) -> Self {
        Self {
            handle,
            manager,
            catalog,
            unlock_choices,
        }
    }

    /// Process lines from `input` until it ends, writing replies to `output`
    pub async fn run<R, W>(&self, input: R, mut output: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = input.lines();

        while let Some(line) = lines.next_line().await.context("Failed to read command")? {
            let reply = match parse_line(&line) {
                Ok(None) => continue,
                Ok(Some(command)) => self.execute(command).await?,
                Err(e) => Some(format!("error: {:#}", e)),
            };

            if let Some(reply) = reply {
                output.write_all(reply.as_bytes()).await?;
                output.write_all(b"\n").await?;
                output.flush().await?;
            }
        }

        debug!("Console input closed");
        Ok(())
    }

    async fn execute(&self, command: ConsoleCommand) -> Result<Option<String>> {
        let result = match command {
            ConsoleCommand::Foreground(package) => {
                self.handle.foreground_changed(package).await?;
                return Ok(None);
            }
            ConsoleCommand::Unlock { passcode } => self
                .manager
                .unlock(passcode.as_deref())
                .map(|package| format!("unlocked {}", self.catalog.display_name(&package))),
            ConsoleCommand::Extend { passcode, minutes } => {
                if !self.unlock_choices.contains(&minutes) {
                    return Ok(Some(format!(
                        "error: choose one of {:?} minutes",
                        self.unlock_choices
                    )));
                }
                self.manager
                    .temporary_unlock(passcode.as_deref(), minutes)
                    .map(|package| {
                        format!(
                            "unblocked {} for {} minutes",
                            self.catalog.display_name(&package),
                            minutes
                        )
                    })
            }
            ConsoleCommand::Status => Ok(self.status()),
        };

        match result {
            Ok(reply) => Ok(Some(reply)),
            Err(e) if e.is_retryable() => Ok(Some(format!("error: {}", e))),
            Err(e) => Err(e.into()),
        }
    }

    fn status(&self) -> String {
        let blocked = self.handle.signal().blocked_package();
        let screen = Screen::AppDashboard.resolve(blocked.as_ref());

        match &screen {
            Screen::Blocking(package) => {
                format!("{}: {}", screen.title(), self.catalog.display_name(package))
            }
            _ => "not blocked".to_string(),
        }
    }
}

/// Switch to the blocking screen whenever a block is raised, and back once it clears
///
/// Prints `blocked <package> (<name>)` and `cleared <package>`; when `notify` is
/// set, raising a block also shows a desktop notification. Runs until aborted.
pub async fn present_blocks(signal: BlockSignal, catalog: Arc<AppCatalog>, notify: bool) {
    let mut blocked = signal.subscribe();
    let mut screen = Screen::AppDashboard;

    while blocked.changed().await.is_ok() {
        let next = screen.resolve(blocked.borrow_and_update().as_ref());
        if next == screen {
            continue;
        }

        match (&screen, &next) {
            (_, Screen::Blocking(package)) => {
                let name = catalog.display_name(package);
                println!("blocked {} ({})", package, name);

                if notify {
                    show_notice(name).await;
                }
            }
            (Screen::Blocking(package), _) => println!("cleared {}", package),
            _ => {}
        }
        screen = next;
    }
}

async fn show_notice(name: String) {
    let result =
        tokio::task::spawn_blocking(move || platform::show_blocking_notice(&name)).await;
    match result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("Failed to show blocking notice: {:#}", e),
        Err(e) => warn!("Blocking notice task failed: {}", e),
    }
}
