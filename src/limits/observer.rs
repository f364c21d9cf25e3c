use anyhow::{Context, Result};
use std::time::Duration;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::limits::package::PackageId;
use crate::limits::service::MonitorHandle;
use crate::platform;

/// Default interval for sampling the desktop foreground window
pub const DESKTOP_SAMPLE_INTERVAL: Duration = Duration::from_secs(1);

/// Report foreground changes of the desktop session to the monitor
///
/// Samples the platform's active window every `every` and forwards only changes.
/// Runs until the monitor stops.
pub async fn watch_desktop(handle: MonitorHandle, every: Duration) -> Result<()> {
    info!("Watching desktop foreground every {}ms", every.as_millis());

    let mut ticker = time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut last: Option<Option<PackageId>> = None;
    let mut failing = false;

    loop {
        ticker.tick().await;

        let sampled = tokio::task::spawn_blocking(platform::foreground_app)
            .await
            .context("Foreground sampler panicked")?;

        let current = match sampled {
            Ok(app) => {
                failing = false;
                app.map(PackageId::from)
            }
            Err(e) => {
                if !failing {
                    warn!("Failed to read foreground app: {:#}", e);
                    failing = true;
                }
                continue;
            }
        };

        if last.as_ref() == Some(&current) {
            continue;
        }

        debug!("Desktop foreground: {:?}", current.as_ref().map(PackageId::as_str));
        handle.foreground_changed(current.clone()).await?;
        last = Some(current);
    }
}
