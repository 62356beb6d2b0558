use anyhow::Result;
use colored::Colorize;
use tollgate::time::{format_instant, now_millis};

use super::load_bot;
use crate::cli::MembersArgs;
use crate::print_warning;

pub async fn run(args: MembersArgs) -> Result<()> {
    let bot = load_bot()?;
    let now = now_millis();

    let members: Vec<_> = bot
        .engine()
        .members()
        .await
        .into_iter()
        .filter(|(_, record)| !args.active || record.is_entitled(now))
        .collect();

    if members.is_empty() {
        print_warning("No members stored");
        return Ok(());
    }

    println!(
        "{:<20} {:<18} {:<5} {}",
        "USER".bold(),
        "STAGE".bold(),
        "PLAN".bold(),
        "EXPIRES".bold()
    );
    for (user_id, record) in members {
        let plan = record.stage.plan().map(|p| p.code()).unwrap_or("-");
        let expires = if record.expire_at == 0 {
            "never activated".dimmed().to_string()
        } else if record.is_entitled(now) {
            format_instant(record.expire_at).green().to_string()
        } else {
            format_instant(record.expire_at).red().to_string()
        };
        println!(
            "{:<20} {:<18} {:<5} {}",
            user_id,
            record.stage.name(),
            plan,
            expires
        );
    }
    Ok(())
}
