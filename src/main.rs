use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;

use cli::{Args, Commands};
use commands::utils::init_logging;
use commands::AppContext;

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = Args::parse();

    // init must work even when the existing config is broken
    if let Commands::Init { force } = args.command {
        init_logging(args.verbose, "info");
        let path = commands::resolve_config_path(args.config)?;
        return commands::setup::init(&path, force);
    }

    let ctx = AppContext::load(args.config)?;
    init_logging(args.verbose, &ctx.config.logging.level);

    match args.command {
        Commands::Init { force } => commands::setup::init(&ctx.config_path, force),
        Commands::Apps { search } => commands::apps::list_apps(&ctx, search.as_deref()),
        Commands::Activate { package } => commands::apps::activate(&ctx, &package),
        Commands::Deactivate { package, passcode } => {
            commands::apps::deactivate(&ctx, &package, passcode.as_deref())
        }
        Commands::Limit {
            package,
            minutes,
            passcode,
        } => commands::apps::set_limit(&ctx, &package, &minutes, passcode.as_deref()),
        Commands::Passcode {
            new_passcode,
            confirm,
            current,
        } => commands::apps::change_passcode(&ctx, current.as_deref(), &new_passcode, &confirm),
        Commands::Unlock { passcode } => commands::apps::unlock(&ctx, passcode.as_deref()),
        Commands::Unblock {
            package,
            minutes,
            passcode,
        } => commands::apps::unblock(&ctx, &package, minutes, passcode.as_deref()),
        Commands::Usage { package } => commands::status::show_usage(&ctx, package.as_deref()),
        Commands::Status => commands::status::show_status(&ctx),
        Commands::Run {
            observer,
            no_notify,
        } => commands::run::run_monitor(&ctx, observer, !no_notify),
    }
}
