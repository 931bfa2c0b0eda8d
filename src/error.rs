//! Request-level failures surfaced to the client as `error{message}`.

use crate::protocol::ServerMessage;

/// Errors a client request can fail with.
///
/// Every variant is local to the request that produced it: handlers check
/// their guards before mutating any room state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    #[error("Room not found")]
    RoomNotFound,

    #[error("Player not found in room")]
    PlayerNotFound,

    #[error("Room is full")]
    RoomFull,

    #[error("Game already started")]
    GameAlreadyStarted,

    /// No sound cues are available, so no round could be played.
    #[error("Game is not ready yet")]
    GameNotReady,

    #[error("Invalid room password")]
    InvalidPassword,

    #[error("Voting is not active")]
    VotingNotActive,

    #[error("You have not voted")]
    NoVoteToCancel,

    /// Every generated room code collided with a live room.
    #[error("No free room codes, try again later")]
    NoFreeRoomCode,

    #[error("Invalid message format: {0}")]
    InvalidMessage(String),
}

pub type GameResult<T> = Result<T, GameError>;

impl From<GameError> for ServerMessage {
    fn from(err: GameError) -> Self {
        ServerMessage::Error {
            message: err.to_string(),
        }
    }
}
