//! WebSocket Connection Handler
//!
//! One reader loop per connection plus a writer task draining the
//! connection's outbound queue.

use std::time::Duration;

use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::time::interval;

use super::messages::{GatewayReceive, GatewaySend, OpCode, SEND_PRIVATE_MESSAGE};
use super::session::{liveness_check_period, Sequence, SessionState};
use crate::application::dto::SendPrivateMessageRequest;
use crate::application::services::{ConnectionHandle, RelayGateway};
use crate::domain::Identity;
use crate::presentation::middleware::extract_token;
use crate::shared::error::AppError;
use crate::startup::AppState;

/// Grace period on top of the heartbeat interval
const HEARTBEAT_GRACE_MS: u64 = 10_000;

/// Query parameters of the upgrade request
#[derive(Debug, Deserialize)]
pub struct ConnectParams {
    pub access_token: Option<String>,
}

/// WebSocket upgrade handler
///
/// The identity is resolved before the upgrade is validated, so a missing or
/// bad token always gets a plain 401.
pub async fn ws_handler(
    Query(params): Query<ConnectParams>,
    headers: HeaderMap,
    State(state): State<AppState>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let identity = match authenticate(&params, &headers, &state).await {
        Ok(identity) => identity,
        Err(e) => {
            tracing::debug!(error = %e, "Connection rejected");
            return e.into_response();
        }
    };

    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return rejection.into_response(),
    };

    let ws_settings = &state.settings.websocket;
    ws.max_message_size(ws_settings.max_message_size)
        .max_frame_size(ws_settings.max_frame_size)
        .on_upgrade(move |socket| handle_socket(socket, state, identity))
}

async fn authenticate(
    params: &ConnectParams,
    headers: &HeaderMap,
    state: &AppState,
) -> Result<Identity, AppError> {
    let token = extract_token(params.access_token.as_deref(), headers)
        .ok_or_else(|| AppError::Unauthorized("Missing access token".into()))?;
    state.identity_provider.authenticate(&token).await
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState, identity: Identity) {
    let (handle, mut events) = ConnectionHandle::channel(
        identity.user_id.clone(),
        state.settings.relay.outbound_buffer,
    );
    let connection_id = handle.id;
    let mut session = SessionState::new(identity.clone(), connection_id);

    tracing::debug!(user_id = %identity.user_id, connection_id = %connection_id, "New WebSocket connection");

    // Split socket for concurrent read/write
    let (mut sender, mut receiver) = socket.split();

    let heartbeat_interval_ms = state.settings.websocket.heartbeat_interval_ms;
    if let Err(e) = send_frame(&mut sender, &GatewaySend::hello(heartbeat_interval_ms)).await {
        tracing::error!(connection_id = %connection_id, "Failed to send Hello: {}", e);
        return;
    }

    // Heartbeat acks bypass the event queue
    let (control_tx, mut control_rx) = mpsc::unbounded_channel::<GatewaySend>();

    let writer = tokio::spawn(async move {
        let mut sequence = Sequence::default();
        loop {
            let frame = tokio::select! {
                biased;
                Some(frame) = control_rx.recv() => frame,
                Some(event) = events.recv() => GatewaySend::dispatch(&event, sequence.next()),
                else => break,
            };
            if let Err(e) = send_frame(&mut sender, &frame).await {
                tracing::debug!(connection_id = %connection_id, error = %e, "Writer stopped");
                break;
            }
        }
    });

    session.open();
    state.gateway.on_open(&identity, handle.clone()).await;

    let timeout_ms = heartbeat_interval_ms + HEARTBEAT_GRACE_MS;
    let mut heartbeat_check = interval(liveness_check_period(Duration::from_millis(timeout_ms)));
    heartbeat_check.tick().await; // Skip first immediate tick

    // Main message loop
    loop {
        tokio::select! {
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Err(e) = handle_message(
                            text.as_str(),
                            &mut session,
                            &handle,
                            &control_tx,
                            &state.gateway,
                        ).await {
                            tracing::debug!(
                                connection_id = %connection_id,
                                error = %e,
                                "Error handling message"
                            );
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::debug!(connection_id = %connection_id, "Connection closed");
                        break;
                    }
                    Some(Err(e)) => {
                        tracing::debug!(connection_id = %connection_id, error = %e, "WebSocket error");
                        break;
                    }
                    // Pong is handled automatically by axum
                    Some(Ok(_)) => {}
                }
            }

            _ = heartbeat_check.tick() => {
                if !session.is_alive(timeout_ms) {
                    tracing::info!(
                        connection_id = %connection_id,
                        "Heartbeat timeout, closing connection"
                    );
                    break;
                }
            }
        }
    }

    // Cleanup
    session.close();
    state.gateway.on_close(&identity, connection_id).await;
    drop(handle);
    writer.abort();

    tracing::info!(
        user_id = %identity.user_id,
        connection_id = %connection_id,
        "User disconnected"
    );
}

/// Handle incoming WebSocket message
async fn handle_message(
    text: &str,
    session: &mut SessionState,
    handle: &ConnectionHandle,
    control_tx: &mpsc::UnboundedSender<GatewaySend>,
    gateway: &RelayGateway,
) -> Result<(), String> {
    let frame: GatewayReceive =
        serde_json::from_str(text).map_err(|e| format!("Invalid JSON: {}", e))?;

    match OpCode::from_u64(frame.op) {
        Some(OpCode::Heartbeat) => {
            session.heartbeat();
            let _ = control_tx.send(GatewaySend::heartbeat_ack());
            tracing::trace!(connection_id = %session.connection_id, "Heartbeat received");
        }

        Some(OpCode::Invoke) => {
            let target = frame.t.unwrap_or_default();
            if target != SEND_PRIVATE_MESSAGE {
                return Err(format!("Unknown invocation: {}", target));
            }

            // An unreadable payload is treated as empty so the caller still
            // gets its system message.
            let request = frame
                .d
                .and_then(|d| serde_json::from_value::<SendPrivateMessageRequest>(d).ok())
                .unwrap_or_default();

            let _ = gateway.invoke(&session.identity, handle, request).await;
        }

        _ => {
            tracing::debug!(
                connection_id = %session.connection_id,
                op = frame.op,
                "Unknown opcode"
            );
        }
    }

    Ok(())
}

async fn send_frame(
    sender: &mut SplitSink<WebSocket, Message>,
    frame: &GatewaySend,
) -> Result<(), axum::Error> {
    let text = serde_json::to_string(frame).map_err(axum::Error::new)?;
    sender.send(Message::Text(text.into())).await
}

