use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::SinkExt;
use futures::StreamExt;
use serde_json::json;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use crate::models::actor::Actor;
use crate::notify::{Audience, Subscription};
use crate::state::AppState;

pub async fn ws_handler(
    actor: Actor,
    State(state): State<Arc<AppState>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let subscription = state.notifier.subscribe(Audience::for_actor(&actor));
    ws.on_upgrade(move |socket| handle_socket(socket, subscription))
}

async fn handle_socket(socket: WebSocket, mut subscription: Subscription) {
    let (mut sender, mut receiver) = socket.split();
    let audience = subscription.audience();

    info!(%audience, "websocket client connected");

    let mut send_task = tokio::spawn(async move {
        loop {
            let frame = match subscription.recv().await {
                Ok(notification) => match serde_json::to_string(&notification) {
                    Ok(json) => json,
                    Err(err) => {
                        warn!(error = %err, "failed to serialize notification for ws");
                        continue;
                    }
                },
                // the client missed events and must re-fetch through the query surface
                Err(RecvError::Lagged(missed)) => {
                    warn!(%audience, missed, "websocket subscriber lagging; asking for resync");
                    json!({ "type": "resync", "missed": missed }).to_string()
                }
                Err(RecvError::Closed) => break,
            };

            if sender.send(Message::Text(frame)).await.is_err() {
                break;
            }
        }
        subscription.unsubscribe();
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(_msg)) = receiver.next().await {}
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    info!(%audience, "websocket client disconnected");
}
