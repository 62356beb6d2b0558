pub mod members;
pub mod qr;
pub mod serve;
pub mod sweep;

use anyhow::{Context, Result};
use tollgate::{Bot, Config, ConfigBuilder};

/// Load and validate configuration from the environment.
pub fn load_config() -> Result<Config> {
    ConfigBuilder::new()
        .from_env()
        .build()
        .context("invalid configuration")
}

/// Build the bot without serving it, for the one-shot commands.
pub fn load_bot() -> Result<Bot> {
    Bot::from_config(load_config()?).context("failed to start tollgate")
}
