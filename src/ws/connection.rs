//! WebSocket connection lifecycle management.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

use crate::room::manager::GameError;
use crate::room::registry::ConnHandle;
use crate::ws::protocol::{ClientMessage, ServerMessage};
use crate::AppState;

pub async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(state, socket))
}

async fn handle_socket(state: AppState, socket: WebSocket) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    // Forward queued server messages to the socket. Ends once every sender
    // is gone: the local one below plus whatever the registry still holds.
    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let text = serde_json::to_string(&msg).unwrap();
            if ws_tx.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    // One handle per socket; joins re-register it, so its id identifies this
    // connection in every room it entered.
    let handle = ConnHandle::new(tx.clone());
    let mut joined_rooms: Vec<String> = Vec::new();

    while let Some(Ok(msg)) = ws_rx.next().await {
        match msg {
            Message::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(msg) => dispatch(&state, &tx, &handle, &mut joined_rooms, msg).await,
                Err(err) => {
                    let _ = tx.send(ServerMessage::Error {
                        message: format!("Bad message: {err}"),
                    });
                }
            },
            Message::Close(_) => break,
            Message::Binary(_) => {}
            Message::Ping(_) => {}
            Message::Pong(_) => {}
        }
    }

    for room in &joined_rooms {
        state.rooms.disconnect(room, handle.id);
    }
    debug!(conn = %handle.id, "socket closed");
}

async fn dispatch(
    state: &AppState,
    tx: &UnboundedSender<ServerMessage>,
    handle: &ConnHandle,
    joined_rooms: &mut Vec<String>,
    msg: ClientMessage,
) {
    match msg {
        ClientMessage::Join { room, username } => {
            match state.rooms.join(&room, &username, handle.clone()).await {
                Ok(_) => {
                    if !joined_rooms.contains(&room) {
                        joined_rooms.push(room);
                    }
                }
                Err(err) => report(tx, err),
            }
        }
        ClientMessage::Move {
            room,
            board,
            winner,
            username,
            ..
        } => {
            // The claimed turn is dropped here; the room derives it.
            if let Err(err) = state.rooms.apply_move(&room, &username, &board, winner).await {
                report(tx, err);
            }
        }
        ClientMessage::PlayAgain { room, username } => {
            if let Err(err) = state.rooms.play_again(&room, &username).await {
                report(tx, err);
            }
        }
    }
}

/// Tell the client what it needs to know, and no more. Rule violations are
/// dropped quietly; only full rooms and store trouble get a reply.
fn report(tx: &UnboundedSender<ServerMessage>, err: GameError) {
    match err {
        GameError::RoomFull => {
            let _ = tx.send(ServerMessage::Full);
        }
        GameError::InvalidMove(reason) => debug!(reason, "move rejected"),
        GameError::UnknownRoom(room) => debug!(room, "message for unknown room ignored"),
        GameError::StoreTimeout | GameError::Store(_) => {
            warn!(error = %err, "room operation failed");
            let _ = tx.send(ServerMessage::Error {
                message: err.to_string(),
            });
        }
    }
}
