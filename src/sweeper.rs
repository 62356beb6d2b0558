//! Periodic expiry sweep.
//!
//! Runs the engine's sweep on a fixed interval until shut down. The first
//! sweep runs immediately so access that lapsed while the process was down
//! is revoked on startup.

use std::sync::Arc;

use tokio::sync::{mpsc, Notify};
use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::engine::Engine;

/// Background task driving [`Engine::sweep`].
pub struct ExpirySweeper {
    engine: Arc<Engine>,
    period: Duration,
    fatal: Arc<Notify>,
    shutdown_tx: mpsc::Sender<()>,
}

impl ExpirySweeper {
    /// Create a sweeper. `fatal` is notified if a sweep hits an
    /// unrecoverable error, after which the sweeper stops.
    pub fn new(
        engine: Arc<Engine>,
        period: Duration,
        fatal: Arc<Notify>,
    ) -> (Self, mpsc::Receiver<()>) {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        (
            Self {
                engine,
                period,
                fatal,
                shutdown_tx,
            },
            shutdown_rx,
        )
    }

    /// Spawn the sweeper on the runtime.
    pub fn spawn(engine: Arc<Engine>, period: Duration, fatal: Arc<Notify>) -> SweeperHandle {
        let (sweeper, shutdown_rx) = Self::new(engine, period, fatal);
        let shutdown_tx = sweeper.shutdown_tx.clone();
        let handle = tokio::spawn(async move {
            sweeper.start(shutdown_rx).await;
        });
        SweeperHandle {
            handle,
            shutdown_tx,
        }
    }

    /// Run until shutdown is requested or a sweep fails fatally.
    pub async fn start(self, mut shutdown_rx: mpsc::Receiver<()>) {
        tracing::info!(interval_secs = self.period.as_secs(), "Expiry sweeper started");

        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("Shutdown signal received, stopping sweeper");
                    break;
                }
                _ = ticker.tick() => {
                    match self.engine.sweep().await {
                        Ok(_) => {}
                        Err(e) if e.is_fatal() => {
                            tracing::error!(error = %e, "Fatal error during expiry sweep");
                            self.fatal.notify_one();
                            break;
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "Expiry sweep failed, retrying next tick");
                        }
                    }
                }
            }
        }

        tracing::info!("Expiry sweeper stopped");
    }
}

/// Handle to a spawned sweeper.
pub struct SweeperHandle {
    handle: tokio::task::JoinHandle<()>,
    shutdown_tx: mpsc::Sender<()>,
}

impl SweeperHandle {
    /// Stop the sweeper and wait for the current sweep to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        let _ = self.handle.await;
    }
}
