use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures::{sink::SinkExt, stream::StreamExt};
use tokio::sync::broadcast::{self, error::RecvError};

use crate::{AppState, services::issue_service::LedgerEvent};

pub async fn ledger_feed(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let events = state.issues.subscribe();
    ws.on_upgrade(move |socket| stream_events(socket, events))
}

/// Forward ledger events to one client until either side goes away.
async fn stream_events(socket: WebSocket, mut events: broadcast::Receiver<LedgerEvent>) {
    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    let payload = match serde_json::to_string(&event) {
                        Ok(payload) => payload,
                        Err(e) => {
                            tracing::error!("Failed to encode ledger event: {}", e);
                            continue;
                        }
                    };
                    if sender.send(Message::Text(payload.into())).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Feed client lagged, skipped {} events", skipped);
                }
                Err(RecvError::Closed) => break,
            },
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    tracing::debug!("Feed client disconnected");
}
