//! The `examtrend init` command.

use std::path::Path;

use anyhow::Result;

use examtrend_core::config::SAMPLE_CONFIG;

pub fn execute() -> Result<()> {
    let path = Path::new("examtrend.toml");
    if path.exists() {
        println!("examtrend.toml already exists, skipping.");
        return Ok(());
    }
    std::fs::write(path, SAMPLE_CONFIG)?;
    println!("Created examtrend.toml");

    println!("\nNext steps:");
    println!("  1. Check the [columns] names match your spreadsheets");
    println!("  2. Run: examtrend validate scores/");
    println!("  3. Run: examtrend progress scores/ --output reports/");

    Ok(())
}
