use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::signal;
use tokio::sync::Notify;

use crate::config::Config;
use crate::engine::{Engine, EngineSettings};
use crate::error::{Result, TollgateError};
use crate::health::{HealthChecker, MemberStoreCheck};
use crate::platform::{DiscordRestClient, DiscordRestClientConfig, LocalAttachmentStore};
use crate::server::{self, AppState, HmacSha256Verifier, NoVerification, RelayVerifier};
use crate::store::{JsonFileSnapshot, MemberStore};
use crate::sweeper::ExpirySweeper;

/// A configured bot: the engine plus the settings needed to serve it.
pub struct Bot {
    config: Config,
    engine: Arc<Engine>,
}

impl Bot {
    /// Wire the Discord client, attachment store and JSON snapshot from
    /// `config`, loading the member map once.
    pub fn from_config(mut config: Config) -> Result<Self> {
        let token = config
            .discord
            .token
            .take()
            .ok_or_else(|| TollgateError::config("TOKEN is not set"))?;
        let catalog = config.roles.catalog()?;

        let platform = DiscordRestClient::new(
            token,
            DiscordRestClientConfig::new(config.discord.guild_id.clone())
                .api_base(config.discord.api_base.clone()),
        )?;
        let attachments = LocalAttachmentStore::new(config.storage.upload_dir.clone())?;
        let store = MemberStore::load(JsonFileSnapshot::new(config.storage.db_file.clone()))?;

        let engine = Engine::new(
            store,
            Arc::new(platform),
            Arc::new(attachments),
            catalog,
            EngineSettings {
                admin_channel: config.discord.admin_channel_id.clone(),
                grace_ms: config.sweeper.grace_ms(),
                payments: config.payment.clone(),
            },
        );

        Ok(Self {
            config,
            engine: Arc::new(engine),
        })
    }

    #[must_use]
    pub fn engine(&self) -> Arc<Engine> {
        self.engine.clone()
    }

    /// Serve the relay surface and run the expiry sweeper until Ctrl+C,
    /// SIGTERM, or a fatal error.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound, or after shutting
    /// down because of a fatal error.
    pub async fn serve(mut self) -> Result<()> {
        let addr = self.config.server.addr().map_err(|e| {
            TollgateError::config(format!("Invalid server address: {}", e))
        })?;

        let verifier: Arc<dyn RelayVerifier> = match self.config.server.relay_secret.take() {
            Some(secret) => Arc::new(HmacSha256Verifier::new(secret)),
            None => {
                tracing::warn!("RELAY_SECRET not set, relay requests are accepted unsigned");
                Arc::new(NoVerification)
            }
        };

        let fatal = Arc::new(Notify::new());
        let health = HealthChecker::new()
            .with_check(Arc::new(MemberStoreCheck::new(self.engine.clone())));

        let app = server::router(AppState {
            engine: self.engine.clone(),
            verifier,
            health: Arc::new(health),
            fatal: fatal.clone(),
        });

        let sweeper = ExpirySweeper::spawn(
            self.engine.clone(),
            Duration::from_secs(self.config.sweeper.interval_seconds),
            fatal.clone(),
        );

        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!(addr = %addr, "tollgate listening");

        let failed = Arc::new(AtomicBool::new(false));
        let flag = failed.clone();
        let shutdown = async move {
            tokio::select! {
                _ = shutdown_signal() => {}
                _ = fatal.notified() => {
                    flag.store(true, Ordering::SeqCst);
                    tracing::error!("Stopping after fatal error");
                }
            }
        };

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;
        sweeper.shutdown().await;

        if failed.load(Ordering::SeqCst) {
            return Err(TollgateError::internal(
                "stopped after a fatal error, see logs",
            ));
        }
        tracing::info!("Shutdown complete");
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal, starting graceful shutdown");
        },
    }
}
