// =============================================================================
// WebSocket Handler — push-based dashboard updates
// =============================================================================
//
// Clients connect to `/api/v1/ws` and receive:
//   1. An immediate DashboardSnapshot on connect.
//   2. A fresh snapshot whenever the state_version has changed, checked
//      every 500 ms.
//
// The feed is one-way: refreshes are requested over REST, so inbound text
// frames are ignored.
// =============================================================================

use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use tokio::time::{interval, Duration};
use tracing::{debug, info, warn};

use crate::app_state::AppState;

const PUSH_CHECK_PERIOD: Duration = Duration::from_millis(500);

/// Axum handler for the WebSocket upgrade request.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    info!("WebSocket connection accepted — upgrading");
    ws.on_upgrade(move |socket| handle_ws_connection(socket, state))
}

/// Manages a single WebSocket connection lifecycle.
///
/// Runs the push check and the receive loop concurrently via
/// `tokio::select!` until either side closes.
async fn handle_ws_connection(socket: WebSocket, state: Arc<AppState>) {
    state.ws_clients.fetch_add(1, Ordering::Relaxed);

    let (mut sender, mut receiver) = socket.split();
    let mut sequence: u64 = 0;

    let mut last_sent_version = match send_snapshot(&mut sender, &state, &mut sequence).await {
        Ok(version) => version,
        Err(e) => {
            warn!(error = %e, "Failed to send initial WebSocket snapshot");
            cleanup(&state);
            return;
        }
    };

    let mut push_interval = interval(PUSH_CHECK_PERIOD);

    loop {
        tokio::select! {
            _ = push_interval.tick() => {
                if state.current_state_version() != last_sent_version {
                    match send_snapshot(&mut sender, &state, &mut sequence).await {
                        Ok(version) => last_sent_version = version,
                        Err(e) => {
                            debug!(error = %e, "WebSocket send failed — disconnecting");
                            break;
                        }
                    }
                }
            }

            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        debug!(msg = %text, "ignoring inbound WebSocket text");
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = sender.send(Message::Pong(data)).await {
                            debug!(error = %e, "Failed to send Pong — disconnecting");
                            break;
                        }
                    }
                    Some(Ok(Message::Pong(_))) | Some(Ok(Message::Binary(_))) => {}
                    Some(Ok(Message::Close(_))) => {
                        info!("WebSocket Close frame received — disconnecting");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "WebSocket receive error — disconnecting");
                        break;
                    }
                    None => {
                        info!("WebSocket stream ended");
                        break;
                    }
                }
            }
        }
    }

    cleanup(&state);
}

/// Serialize and send the current snapshot, returning the version it carries.
async fn send_snapshot<S>(
    sender: &mut S,
    state: &Arc<AppState>,
    sequence: &mut u64,
) -> Result<u64, S::Error>
where
    S: futures_util::Sink<Message> + Unpin,
{
    *sequence += 1;

    let snapshot = state.build_snapshot();

    match serde_json::to_string(&snapshot) {
        Ok(json) => {
            sender.send(Message::Text(json)).await?;
            debug!(
                version = snapshot.state_version,
                seq = *sequence,
                "WebSocket snapshot sent"
            );
        }
        Err(e) => {
            // Not a network error; keep the connection.
            warn!(error = %e, "Failed to serialize snapshot");
        }
    }
    Ok(snapshot.state_version)
}

fn cleanup(state: &Arc<AppState>) {
    state.ws_clients.fetch_sub(1, Ordering::Relaxed);
    info!("WebSocket connection closed — cleanup complete");
}
