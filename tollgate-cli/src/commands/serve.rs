use anyhow::Result;
use tollgate::Bot;

use super::load_config;

pub async fn run() -> Result<()> {
    let config = load_config()?;
    tollgate::init_tracing_with_config(&config);
    tracing::info!(
        guild_id = %config.discord.guild_id,
        db_file = %config.storage.db_file.display(),
        "Starting tollgate"
    );

    let bot = Bot::from_config(config)?;
    bot.serve().await?;
    Ok(())
}
