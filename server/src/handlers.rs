use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use sketchroom_shared::{ClientMessage, ServerMessage, User, DEFAULT_ROOM_ID};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::ProtocolError;
use crate::logic::{apply_client_message, dispatch};
use crate::registry::SharedRoom;
use crate::state::{AppState, Outbox, Session};

pub const MAX_FRAME_BYTES: usize = 64 * 1024;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectParams {
    pub user_id: Option<String>,
    pub room_id: Option<String>,
}

pub async fn health_handler() -> impl IntoResponse {
    StatusCode::NO_CONTENT
}

pub async fn ws_handler(
    Query(params): Query<ConnectParams>,
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, params))
}

async fn handle_socket(socket: WebSocket, state: AppState, params: ConnectParams) {
    let (mut socket_sender, mut socket_receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
    let connection_id = Uuid::new_v4();

    let user_id = params
        .user_id
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| connection_id.to_string());
    let room_id = params
        .room_id
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| DEFAULT_ROOM_ID.to_string());
    let color = state.colors.color_for(&user_id);
    let mut session = Session::new(connection_id, User::new(user_id, color), room_id);
    tracing::info!(conn = %connection_id, user = %session.user.id, "WS connected");

    let send_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            match serde_json::to_string(&message) {
                Ok(payload) => {
                    if socket_sender.send(Message::Text(payload)).await.is_err() {
                        break;
                    }
                }
                Err(error) => tracing::error!(%error, "failed to encode server message"),
            }
        }
    });

    let mut current = join_room(&state, &session, tx.clone()).await;

    while let Some(Ok(message)) = socket_receiver.next().await {
        let text = match message {
            Message::Text(text) => text,
            Message::Close(frame) => {
                if let Some(frame) = &frame {
                    tracing::debug!(
                        conn = %connection_id,
                        code = frame.code,
                        reason = %frame.reason,
                        "WS close frame"
                    );
                }
                break;
            }
            _ => continue,
        };
        let client_message = match decode_frame(&text) {
            Ok(client_message) => client_message,
            Err(error) => {
                tracing::warn!(conn = %connection_id, %error, "dropping frame");
                continue;
            }
        };
        tracing::debug!(
            conn = %connection_id,
            room = %session.room_id,
            event = client_message.event_name(),
            "WS message"
        );

        if let ClientMessage::JoinRoom { room_id } = client_message {
            let room_id = if room_id.is_empty() {
                DEFAULT_ROOM_ID.to_string()
            } else {
                room_id
            };
            if room_id == session.room_id {
                let mut slot = current.write().await;
                let snapshot = slot.room.snapshot().into_message();
                slot.send_to(connection_id, snapshot);
                continue;
            }
            leave_room(&state, &session, &current).await;
            tracing::info!(
                user = %session.user.id,
                from = %session.room_id,
                to = %room_id,
                "switching rooms"
            );
            session.room_id = room_id;
            current = join_room(&state, &session, tx.clone()).await;
            continue;
        }

        let mut slot = current.write().await;
        match apply_client_message(&mut slot.room, &session, client_message) {
            Ok(Some(outgoing)) => dispatch(&mut slot, &session, outgoing),
            Ok(None) => {}
            Err(error) => {
                tracing::warn!(conn = %connection_id, room = %session.room_id, %error, "rejected message");
            }
        }
    }

    leave_room(&state, &session, &current).await;
    send_task.abort();
    tracing::info!(conn = %connection_id, user = %session.user.id, "WS disconnected");
}

fn decode_frame(text: &str) -> Result<ClientMessage, ProtocolError> {
    if text.len() > MAX_FRAME_BYTES {
        return Err(ProtocolError::FrameTooLarge {
            size: text.len(),
            limit: MAX_FRAME_BYTES,
        });
    }
    Ok(serde_json::from_str(text)?)
}

/// Adds the session to its room, sends it the room snapshot and tells
/// everyone else it arrived.
async fn join_room(state: &AppState, session: &Session, outbox: Outbox) -> SharedRoom {
    let (room, mut slot) = state.rooms.enter(&session.room_id).await;
    slot.room.join(session.connection_id, session.user.clone());
    slot.add_peer(session.connection_id, outbox);

    let snapshot = slot.room.snapshot();
    tracing::info!(
        user = %session.user.id,
        room = %session.room_id,
        members = slot.room.members().len(),
        strokes = snapshot.strokes.len(),
        "joined room"
    );
    slot.send_to(session.connection_id, snapshot.into_message());
    slot.broadcast_except(
        session.connection_id,
        ServerMessage::UserJoined(session.user.clone()),
    );
    room
}

async fn leave_room(state: &AppState, session: &Session, room: &SharedRoom) {
    {
        let mut slot = room.write().await;
        slot.remove_peer(session.connection_id);
        if let Some(user) = slot.room.leave(session.connection_id) {
            slot.broadcast_all(ServerMessage::UserLeft { user_id: user.id });
        }
        tracing::info!(
            user = %session.user.id,
            room = %session.room_id,
            members = slot.room.members().len(),
            "left room"
        );
    }
    state.rooms.remove_if_empty(&session.room_id).await;
}
