use anyhow::Result;
use std::sync::Arc;

use nazr::limits::{PackageId, PreferenceStore, Screen, SystemClock};

use super::utils::format_limit;
use super::AppContext;

/// List known apps, marking restricted ones
pub fn list_apps(ctx: &AppContext, search: Option<&str>) -> Result<()> {
    let store = ctx.open_store(Arc::new(SystemClock))?;
    let restricted = store.load_restricted_apps()?;
    let catalog = ctx.config.catalog();

    let apps = catalog.search(search.unwrap_or_default());
    if apps.is_empty() {
        println!("No apps match.");
    }

    for app in &apps {
        let marker = if restricted.contains(&app.package) { "x" } else { " " };
        println!(
            "[{}] {:<24} {:<32} {}",
            marker,
            app.name,
            app.package,
            format_limit(store.load_limit(&app.package)?)
        );
    }

    // Restricted apps the catalog doesn't know about
    if search.is_none() {
        for package in restricted.iter().filter(|p| catalog.get(p).is_none()) {
            println!(
                "[x] {:<24} {:<32} {}",
                package,
                package,
                format_limit(store.load_limit(package)?)
            );
        }
    }

    Ok(())
}

pub fn activate(ctx: &AppContext, package: &str) -> Result<()> {
    let manager = ctx.manager(Arc::new(SystemClock))?;
    let package = PackageId::from(package);
    let name = ctx.config.catalog().display_name(&package);

    if manager.activate(&package)? {
        println!("✓ {} is now restricted", name);
    } else {
        println!("{} is already restricted", name);
    }

    match Screen::after_selection(manager.gate().is_configured()?) {
        Screen::PasscodeSettings => {
            println!();
            println!("No passcode is set. Protect your limits with:");
            println!("  nazr passcode --new <PASSCODE> --confirm <PASSCODE>");
        }
        _ => println!("Set a daily limit with: nazr limit {} <MINUTES>", package),
    }

    Ok(())
}

pub fn deactivate(ctx: &AppContext, package: &str, passcode: Option<&str>) -> Result<()> {
    let manager = ctx.manager(Arc::new(SystemClock))?;
    let package = PackageId::from(package);
    let name = ctx.config.catalog().display_name(&package);

    if manager.deactivate(&package, passcode)? {
        println!("✓ {} is no longer restricted", name);
    } else {
        println!("{} was not restricted", name);
    }

    Ok(())
}

pub fn set_limit(
    ctx: &AppContext,
    package: &str,
    minutes: &str,
    passcode: Option<&str>,
) -> Result<()> {
    let manager = ctx.manager(Arc::new(SystemClock))?;
    let package = PackageId::from(package);
    let name = ctx.config.catalog().display_name(&package);

    let stored = manager.set_limit(&package, minutes, passcode)?;
    println!("✓ Daily limit for {}: {}", name, format_limit(stored));

    if !manager.restricted_apps()?.contains(&package) {
        println!(
            "Note: {} is not restricted yet; run `nazr activate {}`",
            name, package
        );
    }

    Ok(())
}

pub fn change_passcode(
    ctx: &AppContext,
    current: Option<&str>,
    new_passcode: &str,
    confirm: &str,
) -> Result<()> {
    let manager = ctx.manager(Arc::new(SystemClock))?;
    manager.change_passcode(current, new_passcode, confirm)?;
    println!("✓ Passcode saved");
    Ok(())
}

pub fn unlock(ctx: &AppContext, passcode: Option<&str>) -> Result<()> {
    let manager = ctx.manager(Arc::new(SystemClock))?;

    let package = manager.unlock(passcode)?;
    println!(
        "✓ Dismissed the blocking screen for {}",
        ctx.config.catalog().display_name(&package)
    );

    Ok(())
}

pub fn unblock(
    ctx: &AppContext,
    package: &str,
    minutes: u32,
    passcode: Option<&str>,
) -> Result<()> {
    let manager = ctx.manager(Arc::new(SystemClock))?;
    let package = PackageId::from(package);

    manager.grant_temporary_unblock(&package, minutes, passcode)?;
    println!(
        "✓ {} is unblocked for {} minutes",
        ctx.config.catalog().display_name(&package),
        minutes
    );

    Ok(())
}
