use chrono::Duration;

use nazr::limits::UNSET_LIMIT;

/// Initialize logging
///
/// `RUST_LOG` wins; otherwise `debug` with `--verbose`, else the configured level.
pub fn init_logging(verbose: bool, configured_level: &str) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let level = if verbose { "debug" } else { configured_level };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .init();
}

/// Format duration for display
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.num_seconds();
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m", secs / 60)
    } else if secs < 86400 {
        format!("{}h", secs / 3600)
    } else {
        format!("{}d", secs / 86400)
    }
}

/// Format a stored limit, `-` when unset
pub fn format_limit(minutes: i64) -> String {
    if minutes == UNSET_LIMIT {
        "-".to_string()
    } else {
        format!("{}m", minutes)
    }
}
