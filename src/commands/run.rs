use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufReader;
use tracing::{error, info};

use nazr::limits::console::present_blocks;
use nazr::limits::observer::{watch_desktop, DESKTOP_SAMPLE_INTERVAL};
use nazr::limits::{
    AppManager, BlockSignal, Clock, Console, ControlChannel, Enforcer, MonitorService,
    SystemClock, UsageLedger,
};

use crate::cli::ObserverKind;

use super::AppContext;

/// Run the monitor until the observer ends or Ctrl+C
pub fn run_monitor(ctx: &AppContext, observer: ObserverKind, notify: bool) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    let result = runtime.block_on(run_monitor_async(ctx, observer, notify));

    // A pending stdin read would otherwise keep the runtime alive
    runtime.shutdown_timeout(Duration::from_secs(1));
    result
}

async fn run_monitor_async(ctx: &AppContext, observer: ObserverKind, notify: bool) -> Result<()> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = ctx.open_store(clock.clone())?;
    let ledger = Arc::new(UsageLedger::open(ctx.config.usage_path()?, clock.clone())?);
    let catalog = Arc::new(ctx.config.catalog());
    let signal = BlockSignal::new();

    let enforcer = Enforcer::new(
        store.clone(),
        ledger.clone(),
        clock,
        signal.clone(),
        ctx.config.monitor_settings(),
    );
    let (service, handle) = MonitorService::new(enforcer);
    let service = service
        .with_ledger(ledger)
        .with_snapshot(ctx.config.snapshot_path()?)
        .with_control(ControlChannel::new(ctx.config.control_path()?));

    let service_task = tokio::spawn(service.run());
    let presenter_task = tokio::spawn(present_blocks(signal.clone(), catalog.clone(), notify));

    info!("nazr is monitoring ({:?} observer)", observer);
    println!("Monitoring foreground apps. Press Ctrl+C to stop.");

    let observe = async {
        match observer {
            ObserverKind::Stdin => {
                let manager = Arc::new(AppManager::new(store, signal));
                let console = Console::new(
                    handle,
                    manager,
                    catalog,
                    ctx.config.monitor.unlock_choices_minutes.clone(),
                );
                console
                    .run(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
                    .await
            }
            ObserverKind::Desktop => watch_desktop(handle, DESKTOP_SAMPLE_INTERVAL).await,
        }
    };

    tokio::select! {
        result = observe => {
            if let Err(e) = &result {
                error!("Observer failed: {:#}", e);
            }
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    // Every handle is gone once the observer has finished, so the service winds down
    presenter_task.abort();
    match tokio::time::timeout(Duration::from_secs(2), service_task).await {
        Ok(joined) => joined.context("Monitor task panicked")??,
        Err(_) => info!("Monitor did not stop in time"),
    }

    Ok(())
}
