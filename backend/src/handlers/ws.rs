//! Realtime push over WebSocket
//!
//! Browsers cannot set headers on the upgrade request, so the access token
//! travels in the query string.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use serde::Deserialize;
use tokio::sync::broadcast::{self, error::RecvError};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::auth::authenticate;
use crate::services::notification::HubEvent;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub token: String,
}

pub async fn ws_handler(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    upgrade: WebSocketUpgrade,
) -> AppResult<Response> {
    let user = authenticate(&query.token, &state.config.jwt.secret)?;
    let events = state.hub.subscribe();

    Ok(upgrade.on_upgrade(move |socket| run_session(socket, user.user_id, events)))
}

async fn run_session(mut socket: WebSocket, user_id: Uuid, mut events: broadcast::Receiver<HubEvent>) {
    tracing::debug!(user_id = %user_id, "WebSocket session opened");

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    if !event.is_for(user_id) {
                        continue;
                    }
                    let text = match serde_json::to_string(&event) {
                        Ok(text) => text,
                        Err(e) => {
                            tracing::warn!("Failed to encode hub event: {}", e);
                            continue;
                        }
                    };
                    if socket.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(user_id = %user_id, skipped, "WebSocket client lagged; continuing from latest event");
                }
                Err(RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Text(text))) if text.trim() == "ping" => {
                    if socket.send(Message::Text("pong".to_string())).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            },
        }
    }

    tracing::debug!(user_id = %user_id, "WebSocket session closed");
}
