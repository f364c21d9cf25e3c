use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;

use nazr::limits::snapshot::load_snapshot;
use nazr::limits::{PackageId, PreferenceStore, SystemClock, UsageLedger};

use super::utils::{format_duration, format_limit};
use super::AppContext;

/// Show today's recorded foreground time
pub fn show_usage(ctx: &AppContext, package: Option<&str>) -> Result<()> {
    let clock = Arc::new(SystemClock);
    let ledger = UsageLedger::open(ctx.config.usage_path()?, clock.clone())?;
    let store = ctx.open_store(clock)?;
    let catalog = ctx.config.catalog();

    let mut totals: Vec<_> = ledger.today_totals().into_iter().collect();
    if let Some(package) = package {
        let package = PackageId::from(package);
        totals.retain(|(p, _)| p == &package);
    }
    totals.sort_by(|a, b| b.1.cmp(&a.1));

    if totals.is_empty() {
        println!("No usage recorded today.");
        return Ok(());
    }

    println!("{:<24} {:>8} {:>8}", "App", "Used", "Limit");
    for (package, seconds) in totals {
        println!(
            "{:<24} {:>8} {:>8}",
            catalog.display_name(&package),
            format_duration(chrono::Duration::seconds(seconds)),
            format_limit(store.load_limit(&package)?)
        );
    }

    Ok(())
}

/// Show restrictions and the last state written by `nazr run`
pub fn show_status(ctx: &AppContext) -> Result<()> {
    let store = ctx.open_store(Arc::new(SystemClock))?;
    let catalog = ctx.config.catalog();

    println!("nazr status");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Config:      {}", ctx.config_path.display());
    println!(
        "Passcode:    {}",
        if store.load_passcode()?.is_some() { "set" } else { "not set" }
    );

    let restricted = store.load_restricted_apps()?;
    println!();
    println!("Restricted apps: {}", restricted.len());
    for package in &restricted {
        let unblocked = if store.is_temporarily_unblocked(package)? {
            " (temporarily unblocked)"
        } else {
            ""
        };
        println!(
            "  {:<24} {}{}",
            catalog.display_name(package),
            format_limit(store.load_limit(package)?),
            unblocked
        );
    }

    println!();
    match load_snapshot(&ctx.config.snapshot_path()?)? {
        Some(snapshot) => {
            let ago = Utc::now() - snapshot.updated_at;
            println!(
                "Monitor:     last update {} ({} ago)",
                snapshot.updated_at.format("%Y-%m-%d %H:%M:%S %Z"),
                format_duration(ago)
            );
            match &snapshot.blocked {
                Some(package) => println!("Blocked:     {}", catalog.display_name(package)),
                None => println!("Blocked:     none"),
            }
            if let Some(package) = &snapshot.watched {
                println!("Watching:    {}", catalog.display_name(package));
            }
        }
        None => println!("Monitor:     never started (run `nazr run`)"),
    }

    Ok(())
}
