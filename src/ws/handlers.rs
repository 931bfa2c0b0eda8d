//! WebSocket message dispatch
//!
//! Each client message maps to one `AppState` operation. Whatever the
//! operation returns for the sender is handed back to the socket loop; room-wide
//! traffic is pushed by the state itself through the gateway.

use crate::error::GameResult;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::AppState;
use crate::types::ConnectionId;
use std::sync::Arc;

/// Turn an operation result into the reply for the sender, logging rejections
fn reply(conn: &ConnectionId, action: &str, result: GameResult<ServerMessage>) -> ServerMessage {
    match result {
        Ok(msg) => msg,
        Err(e) => {
            tracing::warn!("Rejected {} from {}: {}", action, conn, e);
            e.into()
        }
    }
}

/// Handle client messages and return optional response
pub async fn handle_message(
    msg: ClientMessage,
    conn: &ConnectionId,
    state: &Arc<AppState>,
) -> Option<ServerMessage> {
    match msg {
        ClientMessage::CreateRoom { player_name } => {
            let result = state
                .create_room(conn, player_name)
                .await
                .map(ServerMessage::RoomInfo);
            Some(reply(conn, "create-room", result))
        }

        ClientMessage::JoinRoom {
            room_password,
            player_name,
        } => {
            let result = state
                .join_room(conn, &room_password, player_name)
                .await
                .map(|room_id| ServerMessage::RoomJoined { room_id });
            Some(reply(conn, "join-room", result))
        }

        ClientMessage::IdentifyRoom {
            room_id,
            player_name,
        } => {
            let result = state
                .identify_room(conn, &room_id, player_name)
                .await
                .map(ServerMessage::RoomInfo);
            Some(reply(conn, "identify-room", result))
        }

        ClientMessage::GetRoomInfo { room_id } => {
            let result = state.room_info(&room_id).await.map(ServerMessage::RoomInfo);
            Some(reply(conn, "get-room-info", result))
        }

        ClientMessage::PlayerReady { room_id } => {
            match state.set_player_ready(conn, &room_id, true).await {
                Ok(ack) => ack,
                Err(e) => Some(reply(conn, "player-ready", Err(e))),
            }
        }

        ClientMessage::PlayerUnready { room_id } => {
            match state.set_player_ready(conn, &room_id, false).await {
                Ok(ack) => ack,
                Err(e) => Some(reply(conn, "player-unready", Err(e))),
            }
        }

        ClientMessage::VoteImpostor {
            room_id,
            voted_player_id,
        } => {
            let result = state
                .vote_impostor(conn, &room_id, &voted_player_id)
                .await;
            Some(reply(conn, "vote-impostor", result))
        }

        ClientMessage::CancelVote { room_id } => {
            let result = state.cancel_vote(conn, &room_id).await;
            Some(reply(conn, "cancel-vote", result))
        }
    }
}
