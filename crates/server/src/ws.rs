use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use tracing::{debug, info, warn};
use uuid::Uuid;

use tably_relay::{InboundFrame, OutboundFrame};

use crate::bootstrap::AppState;

pub fn router(state: AppState) -> Router {
    Router::new().route("/relay/{call_id}", get(ws_upgrade)).with_state(state)
}

async fn ws_upgrade(
    ws: WebSocketUpgrade,
    Path(call_id): Path<String>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, call_id))
}

/// One gateway connection, frames handled strictly in arrival order. The
/// loop never processes two frames of the same call concurrently, which is
/// what keeps transcript ordering deterministic.
async fn handle_socket(mut socket: WebSocket, state: AppState, call_id: String) {
    let connection_id = Uuid::new_v4();
    info!(%call_id, %connection_id, "gateway stream connected");

    // The gateway waits for a first frame before sending anything.
    if send_frame(&mut socket, &OutboundFrame::priming()).await.is_err() {
        state.relay.close_call(&call_id).await;
        return;
    }

    while let Some(received) = socket.recv().await {
        let message = match received {
            Ok(message) => message,
            Err(err) => {
                warn!(%call_id, error = %err, "gateway stream errored");
                break;
            }
        };

        match message {
            Message::Text(text) => {
                let frame: InboundFrame = match serde_json::from_str(&text) {
                    Ok(frame) => frame,
                    Err(err) => {
                        warn!(%call_id, error = %err, "dropping unparseable frame");
                        let reply = OutboundFrame::error("Malformed frame.", None);
                        if send_frame(&mut socket, &reply).await.is_err() {
                            break;
                        }
                        continue;
                    }
                };

                let response_id = frame.response_id;
                match state.relay.handle_frame(&call_id, frame).await {
                    Ok(Some(outbound)) => {
                        if send_frame(&mut socket, &outbound).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(err) => {
                        warn!(%call_id, error = %err, "exchange failed, closing stream");
                        let reply = OutboundFrame::error(err.to_string(), response_id);
                        let _ = send_frame(&mut socket, &reply).await;
                        break;
                    }
                }
            }
            Message::Close(_) => {
                debug!(%call_id, "gateway closed the stream");
                break;
            }
            // Pings are answered by the transport layer.
            Message::Ping(_) | Message::Pong(_) | Message::Binary(_) => {}
        }
    }

    state.relay.close_call(&call_id).await;
    info!(%call_id, %connection_id, "gateway stream closed");
}

async fn send_frame(socket: &mut WebSocket, frame: &OutboundFrame) -> Result<(), axum::Error> {
    match serde_json::to_string(frame) {
        Ok(text) => socket.send(Message::Text(text.into())).await,
        Err(err) => {
            warn!(error = %err, "failed to encode outbound frame");
            Err(axum::Error::new(err))
        }
    }
}
