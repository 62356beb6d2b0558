use anyhow::Result;

use super::load_bot;
use crate::{print_info, print_success};

pub async fn run() -> Result<()> {
    tollgate::init_tracing();

    let bot = load_bot()?;
    let report = bot.engine().sweep().await?;

    if report.candidates == 0 {
        print_info("No subscriptions past their grace period");
    } else {
        print_success(&format!(
            "Expired {} of {} subscriptions past their grace period",
            report.removed, report.candidates
        ));
    }
    Ok(())
}
