//! services/studio/src/web/ws_handler.rs
//!
//! The admin panel's live channel. Forwards sync notices from the workspace
//! and accepts explicit save requests.

use crate::sync::{PushOutcome, SyncNotice};
use crate::web::{
    protocol::{ClientMessage, ServerMessage},
    rest::map_workspace_error,
    state::AppState,
};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{
    stream::{SplitSink, StreamExt},
    SinkExt,
};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

/// The handler for upgrading HTTP requests to WebSocket connections.
pub async fn ws_handler(ws: WebSocketUpgrade, State(app_state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state))
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>) {
    info!("New WebSocket connection established");
    let (mut sender, mut receiver) = socket.split();
    let mut notices = app_state.workspace.subscribe();

    let hello = ServerMessage::Connected {
        origin: app_state.workspace.origin(),
    };
    if !send(&mut sender, &hello).await {
        return;
    }

    loop {
        tokio::select! {
            notice = notices.recv() => match notice {
                Ok(notice) => {
                    if !send(&mut sender, &ServerMessage::Sync { notice }).await {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    // The client re-reads state on `hydrated`.
                    warn!("WebSocket client lagged by {} notices", skipped);
                    let notice = SyncNotice::Hydrated;
                    if !send(&mut sender, &ServerMessage::Sync { notice }).await {
                        break;
                    }
                }
                Err(RecvError::Closed) => break,
            },
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    let reply = handle_client_message(&app_state, text.as_str()).await;
                    if !send(&mut sender, &reply).await {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("WebSocket receive error: {}", e);
                    break;
                }
            },
        }
    }
    info!("WebSocket connection closed");
}

async fn handle_client_message(app_state: &AppState, text: &str) -> ServerMessage {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(ClientMessage::Save { group }) => match app_state.workspace.save(group).await {
            Ok(outcome) => ServerMessage::Saved {
                group,
                rows: match outcome {
                    PushOutcome::Pushed(rows) => rows,
                    PushOutcome::NothingToPush | PushOutcome::LocalOnly => 0,
                },
            },
            Err(e) => ServerMessage::Error {
                message: map_workspace_error(e).1,
            },
        },
        Ok(ClientMessage::Ping) => ServerMessage::Pong,
        Err(e) => ServerMessage::Error {
            message: format!("Invalid message: {e}"),
        },
    }
}

/// Serializes and sends one message. Returns `false` once the socket is gone.
async fn send(sender: &mut SplitSink<WebSocket, Message>, message: &ServerMessage) -> bool {
    let json = match serde_json::to_string(message) {
        Ok(json) => json,
        Err(e) => {
            error!("Failed to serialize WebSocket message: {}", e);
            return true;
        }
    };
    sender.send(Message::Text(json.into())).await.is_ok()
}
