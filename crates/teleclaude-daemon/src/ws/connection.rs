//! The multiplexed notification WebSocket (spec §6): no connect/auth
//! handshake, just subscribe/unsubscribe requests and, once subscribed,
//! unsolicited push frames on the `notifications` topic.

use std::collections::HashSet;
use std::sync::Arc;

use axum::extract::{ws::Message, ws::WebSocket, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use teleclaude_protocol::frames::{InboundFrame, ResFrame};
use teleclaude_protocol::topics::{SubscribeParams, UnsubscribeParams, METHOD_SUBSCRIBE, METHOD_UNSUBSCRIBE, NOTIFICATIONS};
use tracing::{info, warn};

use crate::app::AppState;

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_connection(socket, state))
}

/// Per-connection task. Subscriptions live only for this connection's
/// lifetime — there is no session resumption across reconnects.
async fn handle_connection(socket: WebSocket, state: Arc<AppState>) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    info!(conn_id = %conn_id, "new WS connection");

    let (mut tx, mut rx) = socket.split();
    let mut notifications_rx = state.ws_notifications.subscribe();
    let mut subscribed: HashSet<String> = HashSet::new();

    loop {
        tokio::select! {
            msg = rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(res) = process_message(&text, &mut subscribed) {
                            let json = serde_json::to_string(&res).unwrap_or_default();
                            if tx.send(Message::Text(json.into())).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = tx.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        warn!(conn_id, error = %e, "WS read error");
                        break;
                    }
                    _ => {}
                }
            }

            payload = notifications_rx.recv() => {
                if !subscribed.contains(NOTIFICATIONS) {
                    continue;
                }
                match payload {
                    Ok(payload) => {
                        let event = teleclaude_protocol::frames::EventFrame::new(NOTIFICATIONS, serde_json::from_str::<serde_json::Value>(&payload).unwrap_or_default());
                        let json = serde_json::to_string(&event).unwrap_or_default();
                        if tx.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        warn!(conn_id, skipped = n, "WS client lagged on notifications broadcast");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    info!(conn_id, "WS connection closed");
}

/// Handle one inbound text frame: the only valid requests are
/// `subscribe`/`unsubscribe` (spec §6 "topic subscriptions"). Anything else
/// gets a `METHOD_NOT_FOUND`-shaped error response.
fn process_message(text: &str, subscribed: &mut HashSet<String>) -> Option<ResFrame> {
    let frame: InboundFrame = match serde_json::from_str(text) {
        Ok(f) => f,
        Err(e) => {
            warn!(error = %e, "malformed WS frame, ignoring");
            return None;
        }
    };
    let req = frame.as_req()?;

    match req.method.as_str() {
        METHOD_SUBSCRIBE => match req.params.and_then(|p| serde_json::from_value::<SubscribeParams>(p).ok()) {
            Some(params) => {
                subscribed.insert(params.topic.clone());
                Some(ResFrame::ok(&req.id, serde_json::json!({"subscribed": params.topic})))
            }
            None => Some(ResFrame::err(&req.id, "invalid_input", "missing or malformed subscribe params")),
        },
        METHOD_UNSUBSCRIBE => match req.params.and_then(|p| serde_json::from_value::<UnsubscribeParams>(p).ok()) {
            Some(params) => {
                subscribed.remove(&params.topic);
                Some(ResFrame::ok(&req.id, serde_json::json!({"unsubscribed": params.topic})))
            }
            None => Some(ResFrame::err(&req.id, "invalid_input", "missing or malformed unsubscribe params")),
        },
        other => Some(ResFrame::err(&req.id, "not_found", &format!("unknown method '{other}'"))),
    }
}
