//! WebSocket fan-out of queue events.
//!
//! Clients connect to `/ws`, optionally with `?topics=service.1,cashier.7`,
//! and receive every matching [`QueueEvent`] as a JSON text frame. Delivery
//! is at most once: a client that falls behind the broadcast channel skips
//! the events it missed and should re-read the queue.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use queuedesk_core::QueueEvent;

use crate::metrics::{WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL, WS_EVENTS_SENT, WS_LAGGED_EVENTS};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct SubscribeParams {
    /// Comma-separated topics. Empty means every topic.
    pub topics: Option<String>,
}

/// Which topics a connection receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicFilter {
    topics: HashSet<String>,
}

impl TopicFilter {
    pub fn parse(raw: Option<&str>) -> Self {
        let topics = raw
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();
        Self { topics }
    }

    pub fn matches(&self, event: &QueueEvent) -> bool {
        self.topics.is_empty() || self.topics.contains(&event.topic)
    }
}

/// WebSocket upgrade handler.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(params): Query<SubscribeParams>,
) -> impl IntoResponse {
    let filter = TopicFilter::parse(params.topics.as_deref());
    // Subscribe before the upgrade so nothing published in between is lost.
    let rx = state.publisher().subscribe();
    ws.on_upgrade(move |socket| handle_socket(socket, rx, filter))
}

async fn handle_socket(
    socket: WebSocket,
    mut rx: broadcast::Receiver<QueueEvent>,
    filter: TopicFilter,
) {
    let (mut sender, mut receiver) = socket.split();

    WS_CONNECTIONS_TOTAL.inc();
    WS_CONNECTIONS_ACTIVE.inc();
    info!(topics = ?filter.topics, "WebSocket client connected");

    let send_task = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if !filter.matches(&event) {
                        continue;
                    }
                    match serde_json::to_string(&event) {
                        Ok(json) => {
                            if sender.send(Message::Text(json.into())).await.is_err() {
                                debug!("WebSocket send failed, client disconnected");
                                break;
                            }
                            WS_EVENTS_SENT.with_label_values(&[event.event.as_str()]).inc();
                        }
                        Err(e) => {
                            error!("Failed to serialize queue event: {}", e);
                        }
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("WebSocket client lagged, skipped {} events", n);
                    WS_LAGGED_EVENTS.inc_by(n);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event channel closed");
                    break;
                }
            }
        }
    });

    // Clients only send close frames and pings.
    while let Some(result) = receiver.next().await {
        match result {
            Ok(Message::Close(_)) => {
                debug!("WebSocket client requested close");
                break;
            }
            Ok(Message::Text(text)) => {
                debug!("Ignoring client text message: {}", text);
            }
            Ok(_) => {}
            Err(e) => {
                warn!("WebSocket receive error: {}", e);
                break;
            }
        }
    }

    send_task.abort();
    WS_CONNECTIONS_ACTIVE.dec();
    info!("WebSocket client disconnected");
}
