//! `GET /ws` live feed.
//!
//! Each session first receives the latest full snapshot as
//! `{"event":"initialTokenList","data":[...]}`, then one
//! `{"event":"tokenUpdates","data":[...]}` frame per non-empty poll diff.
//! Client frames other than close are ignored.

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::AppState;
use crate::domain::quote::{QuoteRecord, UpdateRecord};
use crate::infrastructure::broadcast::SharedBroadcastHub;
use crate::infrastructure::metrics;

/// Server-to-client frame.
#[derive(Debug, Serialize)]
#[serde(tag = "event", content = "data")]
enum ServerEvent<'a> {
    #[serde(rename = "initialTokenList")]
    InitialTokenList(&'a [QuoteRecord]),
    #[serde(rename = "tokenUpdates")]
    TokenUpdates(&'a [UpdateRecord]),
}

pub(super) async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| serve_subscriber(socket, state.hub, state.shutdown))
}

async fn serve_subscriber(socket: WebSocket, hub: SharedBroadcastHub, shutdown: CancellationToken) {
    let id = Uuid::new_v4();
    let _registration = hub.register_subscriber();

    // Subscribe before reading the snapshot so no batch falls in between.
    let mut updates = hub.updates_rx();
    let snapshot = hub.snapshot();

    let (mut sink, mut stream) = socket.split();
    tracing::info!(subscriber = %id, tokens = snapshot.len(), "Subscriber connected");

    if send_event(&mut sink, &ServerEvent::InitialTokenList(&snapshot))
        .await
        .is_err()
    {
        tracing::debug!(subscriber = %id, "Subscriber left before initial list");
        return;
    }

    loop {
        tokio::select! {
            () = shutdown.cancelled() => {
                let _ = sink.send(Message::Close(None)).await;
                break;
            }
            batch = updates.recv() => match batch {
                Ok(batch) => {
                    if send_event(&mut sink, &ServerEvent::TokenUpdates(&batch)).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    metrics::record_messages_dropped(skipped);
                    tracing::warn!(subscriber = %id, skipped, "Subscriber lagging, skipped update batches");
                }
                Err(RecvError::Closed) => break,
            },
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    tracing::info!(subscriber = %id, "Subscriber disconnected");
}

async fn send_event(
    sink: &mut SplitSink<WebSocket, Message>,
    event: &ServerEvent<'_>,
) -> Result<(), axum::Error> {
    let text = serde_json::to_string(event).map_err(axum::Error::new)?;
    sink.send(Message::Text(text.into())).await
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn initial_list_frame_shape() {
        let quotes = vec![QuoteRecord {
            price: Some(dec!(1.5)),
            ..QuoteRecord::new("a")
        }];

        let json = serde_json::to_value(ServerEvent::InitialTokenList(&quotes)).unwrap();
        assert_eq!(json["event"], "initialTokenList");
        assert_eq!(json["data"][0]["token_address"], "a");
        assert_eq!(json["data"][0]["price_sol"], 1.5);
    }

    #[test]
    fn update_frame_shape() {
        let updates = vec![QuoteRecord::new("b").to_update()];

        let json = serde_json::to_value(ServerEvent::TokenUpdates(&updates)).unwrap();
        assert_eq!(json["event"], "tokenUpdates");
        assert_eq!(json["data"][0]["token_address"], "b");
    }
}
