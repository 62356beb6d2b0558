//! Tollgate - paid role subscriptions for a Discord guild
//!
//! Tollgate sells time-limited guild roles for manual bank transfers. A
//! member picks a plan, gets payment instructions (with a VietQR payload for
//! Vietnamese banks), DMs a photo of the bill, and an operator approves or
//! rejects it. Approved members hold the plan's role until the expiry sweep
//! revokes it after a grace period.
//!
//! # Features
//!
//! - **Lifecycle**: explicit stage machine from plan choice to active
//! - **Entitlements**: role reconciliation that tolerates partial failures
//! - **Storage**: one JSON snapshot, rewritten atomically after each change
//! - **Sweeper**: hourly expiry sweep with a two day grace period
//! - **Relay**: axum endpoints for a gateway relay, with HMAC signatures
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use tollgate::{Bot, ConfigBuilder};
//!
//! #[tokio::main]
//! async fn main() -> tollgate::Result<()> {
//!     tollgate::init_tracing();
//!
//!     let config = ConfigBuilder::new().from_env().build()?;
//!     Bot::from_config(config)?.serve().await
//! }
//! ```

pub mod config;
mod core;
pub mod engine;
pub mod entitlements;
mod error;
pub mod health;
pub mod interaction;
pub mod lifecycle;
pub mod plans;
pub mod platform;
pub mod server;
pub mod store;
pub mod sweeper;
pub mod time;
pub mod utils;
pub mod vietqr;

// Re-exports for public API
pub use config::{Config, ConfigBuilder, LoggingConfig, ServerConfig};
pub use core::Bot;
pub use engine::{Engine, EngineSettings, Outcome, SweepReport};
pub use entitlements::{ReconcileReport, RoleSync};
pub use error::{Result, TollgateError};
pub use health::{ComponentHealth, HealthCheck, HealthChecker, HealthStatus};
pub use interaction::{Attachment, ButtonPress, Command, DirectMessage};
pub use lifecycle::{Effect, Event, Reply, Transition};
pub use plans::{PayCountry, Plan, PlanCatalog};
pub use platform::{AttachmentStore, Platform};
pub use store::{JsonFileSnapshot, MemberStore, SnapshotStore, Stage, SubscriptionRecord};
pub use sweeper::ExpirySweeper;

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing/logging with sensible defaults
///
/// # Environment Variables
///
/// - `RUST_LOG`: Set log level (e.g., "info", "debug", "tollgate=debug")
/// - `TOLLGATE_LOG_JSON`: Set to "true" for JSON formatted logs
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let json_logs = utils::get_env_with_prefix("LOG_JSON")
        .map(|v| v.parse::<bool>().unwrap_or(false))
        .unwrap_or(false);

    install(env_filter, json_logs);
}

/// Initialize tracing from the logging section of a [`Config`]
///
/// `RUST_LOG` still wins over the configured level when set.
pub fn init_tracing_with_config(config: &Config) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    install(env_filter, config.logging.json);
}

fn install(env_filter: EnvFilter, json: bool) {
    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}
