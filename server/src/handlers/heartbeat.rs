use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::Json;
use chrono::{SecondsFormat, Utc};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use studyboard_shared::{ClientMessage, ServerMessage};
use tracing::debug;

pub async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn ws_handler(ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(handle_socket)
}

pub fn reply_to(text: &str) -> Option<ServerMessage> {
    match serde_json::from_str::<ClientMessage>(text).ok()? {
        ClientMessage::Ping => Some(ServerMessage::Pong {
            time: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }),
    }
}

async fn handle_socket(socket: WebSocket) {
    let (mut socket_sender, mut socket_receiver) = socket.split();
    debug!("heartbeat socket connected");
    while let Some(Ok(message)) = socket_receiver.next().await {
        match message {
            Message::Text(text) => {
                let Some(reply) = reply_to(&text) else {
                    continue;
                };
                let Ok(payload) = serde_json::to_string(&reply) else {
                    continue;
                };
                if socket_sender.send(Message::Text(payload)).await.is_err() {
                    break;
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }
    debug!("heartbeat socket closed");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ping_gets_pong() {
        let reply = reply_to(r#"{"type":"ping"}"#).unwrap();
        let json = serde_json::to_value(reply).unwrap();
        assert_eq!(json["type"], "pong");
        assert!(json["time"].as_str().unwrap().ends_with('Z'));
    }

    #[test]
    fn other_messages_are_ignored() {
        assert!(reply_to(r#"{"type":"hello"}"#).is_none());
        assert!(reply_to("not json").is_none());
    }
}
