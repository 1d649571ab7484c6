//! WebSocket front for the slot floor.
//!
//! Every socket is one participant. Intents are forwarded to the floor
//! [`actor`], which owns the session registry and writes events back into a
//! bounded per-connection queue.

use std::sync::Arc;

use axum::extract::State as AxumState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use slotfloor_session::FloorConfig;
use tokio::task::JoinHandle;
use tracing::warn;

pub mod actor;
pub mod metrics;
pub mod ws;

pub use actor::{Actor, Command, Mailbox};
pub use metrics::Metrics;

/// Events queued per connection before further events to it are dropped.
pub const DEFAULT_OUTBOUND_BUFFER: usize = 256;

#[derive(Clone)]
pub struct AppState {
    pub mailbox: Mailbox,
    pub metrics: Arc<Metrics>,
    pub outbound_buffer: usize,
}

/// Start the floor actor. Must be called within a tokio runtime.
pub fn spawn_floor(config: FloorConfig, outbound_buffer: usize) -> (AppState, JoinHandle<()>) {
    let metrics = Arc::new(Metrics::new());
    let (actor, mailbox) = Actor::new(config, metrics.clone());
    let handle = tokio::spawn(actor.run());
    let state = AppState {
        mailbox,
        metrics,
        outbound_buffer: outbound_buffer.max(1),
    };
    (state, handle)
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn metrics_handler(AxumState(state): AxumState<AppState>) -> impl IntoResponse {
    match state.metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [(
                header::CONTENT_TYPE,
                "application/openmetrics-text; version=1.0.0; charset=utf-8",
            )],
            body,
        )
            .into_response(),
        Err(err) => {
            warn!(?err, "failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
