use anyhow::{Context, Result};
use std::path::Path;

use nazr::config::EXAMPLE_CONFIG;
use nazr::platform::common::atomic_write;

/// Write the example configuration to the config path
pub fn init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "Configuration already exists at {} (use --force to overwrite)",
            path.display()
        );
    }

    atomic_write(path, EXAMPLE_CONFIG.as_bytes())
        .with_context(|| format!("Failed to write config file: {}", path.display()))?;

    println!("✓ Configuration written to: {}", path.display());
    println!();
    println!("Next steps:");
    println!("  1. Restrict an app:    nazr activate <PACKAGE>");
    println!("  2. Give it a limit:    nazr limit <PACKAGE> <MINUTES>");
    println!("  3. Set a passcode:     nazr passcode --new <PASSCODE> --confirm <PASSCODE>");
    println!("  4. Start monitoring:   nazr run --observer desktop");

    Ok(())
}
