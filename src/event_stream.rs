//! WebSocket stream of registry events at `GET /events`
//!
//! Each registry event is sent as its JSON form (tagged by `type`). Control
//! messages share the same tagging:
//!
//! ```json
//! {"type": "connected", "protocol_version": "v2", "timestamp": "..."}
//! {"type": "evidence_submitted", "id": "...", ...}
//! {"type": "lagged", "skipped": 12, "timestamp": "..."}
//! ```

use futures_util::{SinkExt, StreamExt};
use hyper_tungstenite::tungstenite::Message;
use hyper_tungstenite::HyperWebsocket;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::services::EventBus;
use crate::version::PROTOCOL_VERSION;

/// Control messages sent alongside registry events
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamMessage {
    Connected {
        protocol_version: &'static str,
        timestamp: String,
    },
    Lagged {
        skipped: u64,
        timestamp: String,
    },
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Forward bus events to one WebSocket client until it disconnects
pub async fn serve_event_stream(websocket: HyperWebsocket, events: Arc<EventBus>) {
    let ws_stream = match websocket.await {
        Ok(stream) => stream,
        Err(e) => {
            warn!(error = %e, "WebSocket handshake failed");
            return;
        }
    };
    let (mut ws_write, mut ws_read) = ws_stream.split();
    let mut rx = events.subscribe();

    info!(subscribers = events.subscriber_count(), "Event stream client connected");

    let welcome = StreamMessage::Connected {
        protocol_version: PROTOCOL_VERSION,
        timestamp: now(),
    };
    if let Ok(json) = serde_json::to_string(&welcome) {
        if ws_write.send(Message::Text(json.into())).await.is_err() {
            return;
        }
    }

    loop {
        tokio::select! {
            event = rx.recv() => {
                match event {
                    Ok(evt) => {
                        if let Ok(json) = serde_json::to_string(&evt) {
                            if ws_write.send(Message::Text(json.into())).await.is_err() {
                                break;
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "Event stream client lagged");
                        let lag = StreamMessage::Lagged { skipped: n, timestamp: now() };
                        if let Ok(json) = serde_json::to_string(&lag) {
                            let _ = ws_write.send(Message::Text(json.into())).await;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            msg = ws_read.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(Message::Ping(data))) => {
                        let _ = ws_write.send(Message::Pong(data)).await;
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "Event stream receive error");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    debug!("Event stream client disconnected");
}
