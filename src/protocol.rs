//! Wire messages.
//!
//! Every frame is `{"event": "<name>", "data": {...}}` with camelCase fields.
//! Disconnects are implicit (socket close) and have no message.

use crate::types::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum ClientMessage {
    CreateRoom {
        #[serde(default)]
        player_name: Option<String>,
    },
    JoinRoom {
        room_password: String,
        #[serde(default)]
        player_name: Option<String>,
    },
    /// Sent by the room page on load to (re)attach this connection to a room
    IdentifyRoom {
        room_id: RoomId,
        #[serde(default)]
        player_name: Option<String>,
    },
    GetRoomInfo {
        room_id: RoomId,
    },
    PlayerReady {
        room_id: RoomId,
    },
    PlayerUnready {
        room_id: RoomId,
    },
    VoteImpostor {
        room_id: RoomId,
        voted_player_id: PlayerId,
    },
    CancelVote {
        room_id: RoomId,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum ServerMessage {
    /// Tells the creator to navigate to the room page
    RoomCreated {
        room_id: RoomId,
        password: String,
    },
    RoomJoined {
        room_id: RoomId,
    },
    RoomInfo(RoomInfo),
    Error {
        message: String,
    },
    ReadyStatusChanged {
        is_ready: bool,
    },
    GameStarting {
        /// Milliseconds
        prepare_time: u64,
        /// Seconds left
        countdown: u64,
    },
    CountdownUpdate {
        countdown: u64,
    },
    PlayCountdown {
        sound: String,
        prepare_time: u64,
    },
    /// Sent to each player individually: impostor and crewmates hear different cues
    PlayMusic {
        sound: Option<String>,
        role: PlayerRole,
        /// Milliseconds
        duration: u64,
    },
    PlayRoundEnd {
        sound: String,
    },
    VotingStarted {
        players: Vec<PlayerView>,
        voted_players: Vec<VotedPlayer>,
    },
    VotingUpdated {
        voted_players: Vec<VotedPlayer>,
        total_players: usize,
    },
    /// Confirms the sender's own vote; never broadcast
    PrivateVoteUpdate {
        voted_for: PlayerId,
    },
    VoteCancelled,
    VotingResults(VotingResults),
}

/// Snapshot of a room as shown in the lobby
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoomInfo {
    pub password: String,
    pub players: Vec<PlayerView>,
    pub ready_count: usize,
    pub voting: bool,
    pub votes: HashMap<PlayerId, u32>,
    pub max_players: usize,
}

impl From<&Room> for RoomInfo {
    fn from(room: &Room) -> Self {
        Self {
            password: room.password.clone(),
            players: room.roster(),
            ready_count: room.ready_count,
            voting: room.status == RoomStatus::Voting,
            votes: room.votes.counts(),
            max_players: room.max_players,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VotedPlayer {
    pub id: PlayerId,
    pub name: String,
}

/// One voter's ballot, revealed with the results
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Ballot {
    pub voter_name: String,
    pub voted_for: PlayerId,
    pub voted_for_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VotingResults {
    /// Player with the most votes (still set when the vote was tied)
    pub suspected_impostor: Option<Player>,
    /// `None` when the impostor left before the reveal
    pub actual_impostor: Option<Player>,
    /// Always set when a round was played, even if the impostor left
    pub actual_impostor_id: Option<PlayerId>,
    pub votes: HashMap<PlayerId, u32>,
    /// Keyed by voter id
    pub voting_results: HashMap<PlayerId, Ballot>,
    pub was_correct: bool,
    pub was_tie: bool,
}
