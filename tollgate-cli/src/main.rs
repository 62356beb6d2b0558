//! Tollgate CLI - run and inspect the subscription bot.
//!
//! Usage:
//!   tollgate serve
//!   tollgate sweep
//!   tollgate members --active
//!   tollgate qr --plan 1m --user 123456789012345678
//!
//! Configuration comes from `TOLLGATE_*` environment variables.

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use colored::Colorize;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve => commands::serve::run().await?,
        Commands::Sweep => commands::sweep::run().await?,
        Commands::Members(args) => commands::members::run(args).await?,
        Commands::Qr(args) => commands::qr::run(args)?,
    }

    Ok(())
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "→".blue(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "!".yellow().bold(), message);
}
