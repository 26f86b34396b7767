//! WebSocket stream: fused updates and alerts in real time.
//!
//! Clients connect to `/ws/stream` and receive every core event as a
//! JSON text frame. Supported client commands:
//!
//! - `{"action": "list_devices"}` — reply with the active device list
//! - `{"action": "bind", "deviceId": "…"}` — associate the socket with
//!   a device; closing the socket then disconnects that device and
//!   broadcasts `device:left`

use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use tokio::sync::broadcast;

use crate::domain::{DeviceId, TelemetryEvent};

use super::dto::WsCommand;
use super::state::AppState;

/// Interval between keep-alive heartbeats.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// WebSocket upgrade handler.
pub async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Drive one established connection until either side closes.
async fn handle_socket(mut socket: WebSocket, state: AppState) {
    let mut events = state.subscribe();
    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    heartbeat.tick().await; // the first tick fires immediately

    let mut bound_device: Option<DeviceId> = None;
    tracing::debug!("WebSocket client connected");

    loop {
        tokio::select! {
            result = events.recv() => {
                match result {
                    Ok(event) => {
                        if send_json(&mut socket, &event).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(dropped)) => {
                        tracing::warn!(dropped, "WebSocket client lagged, events dropped");
                        let notice = TelemetryEvent::Error {
                            code: "EVENTS_DROPPED".to_string(),
                            message: format!("{dropped} events were dropped for a slow client"),
                        };
                        if send_json(&mut socket, &notice).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            _ = heartbeat.tick() => {
                let ping = TelemetryEvent::Heartbeat { timestamp: chrono::Utc::now() };
                if send_json(&mut socket, &ping).await.is_err() {
                    break;
                }
            }
            message = socket.recv() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        if handle_command(&text, &state, &mut socket, &mut bound_device)
                            .await
                            .is_err()
                        {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    // Binary frames are not part of the protocol; pings
                    // are answered by axum automatically.
                    Some(Ok(_)) => {}
                    Some(Err(error)) => {
                        tracing::debug!(%error, "WebSocket receive error");
                        break;
                    }
                }
            }
        }
    }

    if let Some(device_id) = bound_device {
        if state.dispatcher().disconnect(&device_id) {
            tracing::debug!(device_id = %device_id, "bound device disconnected with socket");
        }
    }
    tracing::debug!("WebSocket client disconnected");
}

async fn handle_command(
    text: &str,
    state: &AppState,
    socket: &mut WebSocket,
    bound_device: &mut Option<DeviceId>,
) -> std::result::Result<(), axum::Error> {
    match serde_json::from_str::<WsCommand>(text) {
        Ok(WsCommand::ListDevices) => {
            let devices = state.dispatcher().list_devices();
            let reply = serde_json::json!({
                "type": "device:list",
                "devices": devices,
                "total": devices.len(),
            });
            tracing::debug!(total = devices.len(), "device list requested");
            socket.send(Message::Text(reply.to_string())).await?;
        }
        Ok(WsCommand::Bind { device_id }) => {
            tracing::debug!(device_id = %device_id, "socket bound to device");
            *bound_device = Some(device_id);
        }
        Err(error) => {
            tracing::debug!(%error, "ignoring unparsable WebSocket command");
        }
    }
    Ok(())
}

async fn send_json(
    socket: &mut WebSocket,
    event: &TelemetryEvent,
) -> std::result::Result<(), axum::Error> {
    match serde_json::to_string(event) {
        Ok(json) => socket.send(Message::Text(json)).await,
        Err(error) => {
            tracing::warn!(%error, "failed to serialize event for WebSocket");
            Ok(())
        }
    }
}
