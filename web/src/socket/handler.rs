use crate::AppState;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use domain::event::Envelope;
use domain::relay;
use futures::{Sink, SinkExt, StreamExt};
use log::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::Receiver;

/// How long a closing socket gets to flush payloads already queued for it.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Upgrades to a WebSocket. The socket is given a fresh connection id and every
/// frame it sends becomes an event for the relay.
pub(crate) async fn socket_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| run_session(socket, app_state))
}

/// Connect, one message event per inbound frame, then disconnect.
async fn run_session(socket: WebSocket, app_state: AppState) {
    let hub = Arc::clone(&app_state.service_state.hub);
    let (connection_id, outbound_rx) = hub.register();
    let (ws_tx, mut ws_rx) = socket.split();

    let mut forwarder = tokio::spawn(forward(outbound_rx, ws_tx));

    handle_event(&app_state, Envelope::connect(connection_id.as_str())).await;

    while let Some(frame) = ws_rx.next().await {
        let text = match frame {
            Ok(Message::Text(text)) => text.as_str().to_string(),
            Ok(Message::Binary(data)) => match std::str::from_utf8(&data) {
                Ok(text) => text.to_string(),
                Err(_) => {
                    debug!("Ignoring non-UTF8 binary frame from {connection_id}");
                    continue;
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(Message::Ping(_)) => {
                refresh(&app_state, connection_id.as_str()).await;
                continue;
            }
            Ok(_) => continue,
            Err(err) => {
                debug!("Socket {connection_id} closed with error: {err}");
                break;
            }
        };

        handle_event(&app_state, Envelope::message(connection_id.as_str(), text)).await;
    }

    // Dropping the hub's sender lets the forwarder flush what is queued and stop
    hub.unregister(&connection_id);
    if tokio::time::timeout(DRAIN_TIMEOUT, &mut forwarder).await.is_err() {
        debug!("Socket {connection_id} did not drain in time, dropping queued payloads");
        forwarder.abort();
    }

    handle_event(&app_state, Envelope::disconnect(connection_id.as_str())).await;
}

/// Writes payloads pushed to this connection into the socket until the hub
/// drops its sender and the queue is empty, or the socket stops accepting.
async fn forward<S>(mut outbound_rx: Receiver<String>, mut sink: S)
where
    S: Sink<Message> + Unpin,
{
    while let Some(payload) = outbound_rx.recv().await {
        if sink.send(Message::Text(payload.into())).await.is_err() {
            break;
        }
    }
}

async fn refresh(app_state: &AppState, connection_id: &str) {
    if let Err(err) = app_state.registry.acquire().refresh(connection_id).await {
        warn!("Could not refresh expiry of connection {connection_id}: {err}");
    }
}

async fn handle_event(app_state: &AppState, envelope: Envelope) {
    if let Err(err) = relay::handle_envelope(
        &app_state.registry,
        app_state.transport.as_ref(),
        &app_state.settings,
        envelope,
    )
    .await
    {
        warn!("Failed to handle socket event: {err}");
    }
}
