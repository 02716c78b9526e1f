//! GET `/socket` — WebSocket relay.
//!
//! A `send-photo` frame from one client is rebroadcast as `receive-photo`
//! to every other connected client.

use crate::{
    models::relay::{RECEIVE_PHOTO, RelayEvent, SEND_PHOTO},
    services::relay_service::{ClientId, RelayHub},
};
use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tracing::{debug, info, warn};

pub async fn relay_socket(ws: WebSocketUpgrade, State(hub): State<RelayHub>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, hub))
}

async fn handle_socket(socket: WebSocket, hub: RelayHub) {
    let (id, mut outbound) = hub.register().await;
    info!(
        "relay client {} connected ({} online)",
        id,
        hub.client_count().await
    );

    let (mut sender, mut receiver) = socket.split();

    let mut send_task = tokio::spawn(async move {
        while let Some(frame) = outbound.recv().await {
            if sender.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });

    let recv_hub = hub.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = receiver.next().await {
            match message {
                Message::Text(text) => {
                    relay_frame(&recv_hub, id, text.as_str()).await;
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    hub.unregister(id).await;
    info!("relay client {} disconnected", id);
}

/// Handle one inbound text frame from `from`. Returns the number of clients
/// the frame was relayed to.
pub async fn relay_frame(hub: &RelayHub, from: ClientId, text: &str) -> usize {
    let event: RelayEvent = match serde_json::from_str(text) {
        Ok(event) => event,
        Err(err) => {
            debug!("ignoring malformed frame from {}: {}", from, err);
            return 0;
        }
    };

    if event.event != SEND_PHOTO {
        debug!("ignoring event `{}` from {}", event.event, from);
        return 0;
    }

    let outgoing = RelayEvent::new(RECEIVE_PHOTO, event.data);
    let frame = match serde_json::to_string(&outgoing) {
        Ok(frame) => frame,
        Err(err) => {
            warn!("failed to encode relay frame: {}", err);
            return 0;
        }
    };

    let delivered = hub.broadcast(from, &frame).await;
    debug!("photo from {} relayed to {} client(s)", from, delivered);
    delivered
}
