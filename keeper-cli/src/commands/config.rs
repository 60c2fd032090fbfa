//! Print the effective configuration.

use anyhow::{Context, Result};

use crate::config::Config;

/// Run the config command.
pub fn run(config: &Config) -> Result<()> {
    let rendered = config.to_toml().context("Failed to render configuration")?;
    print!("{}", rendered);
    Ok(())
}
