use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State as AxumState;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use slotfloor_session::{Intent, PlayerId, ServerEvent};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::AppState;

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    AxumState(state): AxumState<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let id = PlayerId::new(Uuid::new_v4().to_string());
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::channel::<ServerEvent>(state.outbound_buffer);
    state.mailbox.connect(id.clone(), tx);
    debug!(player = %id, "websocket connected");

    let write_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let payload = match serde_json::to_string(&event) {
                Ok(payload) => payload,
                Err(err) => {
                    warn!(?err, "failed to encode event");
                    continue;
                }
            };
            if sender.send(Message::Text(payload)).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(message)) = receiver.next().await {
        match message {
            Message::Text(text) => match serde_json::from_str::<Intent>(&text) {
                Ok(intent) => state.mailbox.intent(id.clone(), intent),
                Err(err) => {
                    warn!(player = %id, ?err, "invalid inbound message");
                }
            },
            Message::Close(_) => break,
            _ => {}
        }
    }

    state.mailbox.disconnect(id);
    write_task.abort();
}
