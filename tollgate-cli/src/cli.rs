//! CLI argument definitions using clap.

use clap::{Parser, Subcommand};
use tollgate::plans::Plan;

#[derive(Parser)]
#[command(name = "tollgate")]
#[command(version)]
#[command(about = "Paid Discord role subscriptions with manual bill approval", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve the relay endpoints and run the hourly expiry sweep
    Serve,

    /// Run one expiry sweep and exit
    Sweep,

    /// List every stored member with stage and expiry
    Members(MembersArgs),

    /// Print the VietQR payload a subscriber would receive
    Qr(QrArgs),
}

#[derive(Parser, Debug)]
pub struct MembersArgs {
    /// Only show members whose entitlement is still running
    #[arg(long, default_value = "false")]
    pub active: bool,
}

#[derive(Parser, Debug)]
pub struct QrArgs {
    /// Plan code (1m, 6m or 1y)
    #[arg(short, long, value_parser = parse_plan)]
    pub plan: Plan,

    /// Subscriber id the transfer note is derived from
    #[arg(short, long)]
    pub user: String,
}

fn parse_plan(code: &str) -> Result<Plan, String> {
    Plan::from_code(code).ok_or_else(|| {
        let codes: Vec<&str> = Plan::ALL.iter().map(|p| p.code()).collect();
        format!("unknown plan '{}', expected one of {}", code, codes.join(", "))
    })
}
