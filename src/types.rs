use crate::state::timers::RoomTimers;
use crate::state::vote::VoteBook;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque ID types for type safety
pub type RoomId = String;
/// A player is identified by the connection it joined from
pub type PlayerId = String;
pub type ConnectionId = PlayerId;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    Waiting,
    Preparing,
    Playing,
    Voting,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlayerRole {
    #[default]
    Crewmate,
    Impostor,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub is_ready: bool,
    pub role: PlayerRole,
    pub has_voted: bool,
    pub voted_for: Option<PlayerId>,
}

impl Player {
    pub fn new(id: PlayerId, name: String) -> Self {
        Self {
            id,
            name,
            is_ready: false,
            role: PlayerRole::Crewmate,
            has_voted: false,
            voted_for: None,
        }
    }
}

/// Roster entry visible to everyone in the room (no role, no vote target)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub id: PlayerId,
    pub name: String,
    pub is_ready: bool,
    pub has_voted: bool,
}

impl From<&Player> for PlayerView {
    fn from(p: &Player) -> Self {
        Self {
            id: p.id.clone(),
            name: p.name.clone(),
            is_ready: p.is_ready,
            has_voted: p.has_voted,
        }
    }
}

/// Cues drawn for one round
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoundSounds {
    pub impostor: Option<String>,
    pub crewmate: Option<String>,
    pub countdown: Option<String>,
    pub round_end: Option<String>,
}

/// An isolated game session.
///
/// Mutated only while its mutex is held; see `state::RoomHandle`.
#[derive(Debug)]
pub struct Room {
    pub id: RoomId,
    pub password: String,
    /// Join order is significant
    pub players: Vec<Player>,
    /// Always equals the number of players with `is_ready`
    pub ready_count: usize,
    pub status: RoomStatus,
    pub impostor_id: Option<PlayerId>,
    pub current_sounds: Option<RoundSounds>,
    pub votes: VoteBook,
    pub created_at: DateTime<Utc>,
    pub max_players: usize,
    /// Bumped on every phase change and on close; pending timers compare against it
    pub generation: u64,
    /// Set once the room has been removed from the store
    pub closed: bool,
    pub(crate) timers: RoomTimers,
}

impl Room {
    pub fn new(id: RoomId, password: String, max_players: usize) -> Self {
        Self {
            id,
            password,
            players: Vec::new(),
            ready_count: 0,
            status: RoomStatus::Waiting,
            impostor_id: None,
            current_sounds: None,
            votes: VoteBook::default(),
            created_at: Utc::now(),
            max_players,
            generation: 0,
            closed: false,
            timers: RoomTimers::default(),
        }
    }

    pub fn player(&self, id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn player_mut(&mut self, id: &str) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    pub fn has_player(&self, id: &str) -> bool {
        self.player(id).is_some()
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= self.max_players
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn player_ids(&self) -> Vec<PlayerId> {
        self.players.iter().map(|p| p.id.clone()).collect()
    }

    pub fn roster(&self) -> Vec<PlayerView> {
        self.players.iter().map(PlayerView::from).collect()
    }

    /// Move to a new phase, invalidating every timer armed for the old one
    pub(crate) fn set_status(&mut self, status: RoomStatus) {
        self.status = status;
        self.generation += 1;
        self.timers.cancel_phase();
    }
}
