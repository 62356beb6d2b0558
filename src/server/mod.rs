//! Relay surface.
//!
//! A gateway relay holds the Discord websocket connection and forwards
//! normalized button presses and DMs here as JSON. The response body carries
//! the replies the relay should render.
//!
//! | Route                    | Body            |
//! |--------------------------|-----------------|
//! | `POST /relay/interaction`| `ButtonPress`   |
//! | `POST /relay/message`    | `DirectMessage` |
//! | `GET /health`            |                 |

pub mod verification;

pub use verification::{HmacSha256Verifier, NoVerification, RelayVerifier, SIGNATURE_HEADER};

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::{get, post},
};
use serde::de::DeserializeOwned;
use tokio::sync::Notify;

use crate::engine::{Engine, Outcome};
use crate::error::{Result, TollgateError};
use crate::health::{HealthChecker, HealthResponse};
use crate::interaction::{ButtonPress, DirectMessage};

/// Shared state for the relay handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub verifier: Arc<dyn RelayVerifier>,
    pub health: Arc<HealthChecker>,
    /// Notified when a handler hits a fatal error.
    pub fatal: Arc<Notify>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/relay/interaction", post(interaction))
        .route("/relay/message", post(message))
        .route("/health", get(health))
        .with_state(state)
}

async fn interaction(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Outcome>> {
    let press: ButtonPress = verified_json(&state, &headers, &body).await?;
    let outcome = state
        .engine
        .press(&press)
        .await
        .map_err(|e| escalate(&state, e))?;
    Ok(Json(outcome))
}

async fn message(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Outcome>> {
    let message: DirectMessage = verified_json(&state, &headers, &body).await?;
    let outcome = state
        .engine
        .direct_message(&message)
        .await
        .map_err(|e| escalate(&state, e))?;
    Ok(Json(outcome))
}

async fn health(State(state): State<AppState>) -> HealthResponse {
    state.health.check_health().await
}

async fn verified_json<T: DeserializeOwned>(
    state: &AppState,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<T> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());
    if !state.verifier.verify_signature(body, signature).await? {
        tracing::warn!("Rejected relay request with bad signature");
        return Err(TollgateError::unauthorized("invalid relay signature"));
    }
    Ok(serde_json::from_slice(body)?)
}

/// Ask the process to stop on a fatal error.
fn escalate(state: &AppState, error: TollgateError) -> TollgateError {
    if error.is_fatal() {
        tracing::error!(error = %error, "Fatal error, shutting down");
        state.fatal.notify_one();
    }
    error
}
